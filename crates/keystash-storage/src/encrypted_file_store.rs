use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use keystash_core::storage::{EncryptedAtRest, KeyValueBackend, StoreError};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    file_store::{file_name_for, write_atomic},
    key_provider::{KeyMaterial, KeyProvider},
};

const BLOB_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// AES-GCM encrypted file-backed store. The data key comes from a
/// `KeyProvider` (OS keyring in production); each entry key is bound to
/// its ciphertext as associated data.
pub struct EncryptedFileStore<P: KeyProvider> {
    root: PathBuf,
    key_provider: P,
}

impl<P: KeyProvider> EncryptedFileStore<P> {
    pub fn new(root: impl Into<PathBuf>, key_provider: P) -> Self {
        Self {
            root: root.into(),
            key_provider,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(file_name_for(key))
    }

    async fn cipher(&self) -> Result<(Aes256Gcm, KeyMaterial), StoreError> {
        let material = self
            .key_provider
            .get_or_create()
            .await
            .map_err(|e| StoreError::backend(format!("key provider: {e}")))?;
        let cipher = Aes256Gcm::new_from_slice(&material.bytes)
            .map_err(|e| StoreError::backend(format!("cipher init failed: {e}")))?;
        Ok((cipher, material))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredBlob {
    v: u8,
    key_id: String,
    nonce: String,
    ciphertext: String,
}

#[async_trait]
impl<P: KeyProvider> KeyValueBackend for EncryptedFileStore<P> {
    #[instrument(skip_all, fields(key = %key))]
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let Some(blob) = read_blob(&self.path_for(key))? else {
            return Err(StoreError::not_found(key));
        };
        if blob.v != BLOB_VERSION {
            return Err(StoreError::backend(format!(
                "unsupported blob version {}",
                blob.v
            )));
        }

        let (cipher, _) = self.cipher().await?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(&blob.nonce)
            .map_err(|e| StoreError::backend(format!("nonce decode failed: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(StoreError::backend(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(&blob.ciphertext)
            .map_err(|e| StoreError::backend(format!("ciphertext decode failed: {e}")))?;

        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| StoreError::backend(format!("decrypt failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| StoreError::backend(format!("value is not valid UTF-8: {e}")))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let (cipher, material) = self.cipher().await?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: value.as_bytes(),
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| StoreError::backend(format!("encrypt failed: {e}")))?;

        let blob = StoredBlob {
            v: BLOB_VERSION,
            key_id: material.id,
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };
        let json = serde_json::to_vec(&blob).map_err(StoreError::backend)?;
        write_atomic(&self.path_for(key), &json)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::backend(err)),
        }
    }
}

impl<P: KeyProvider> EncryptedAtRest for EncryptedFileStore<P> {}

fn read_blob(path: &Path) -> Result<Option<StoredBlob>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::backend(err)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::backend(format!("corrupt blob: {e}")))
}
