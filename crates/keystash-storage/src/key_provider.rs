use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use keyring::credential::CredentialBuilder;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::credentials::open_entry;

/// Key material used for encryption at rest.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier recorded next to each ciphertext (never log key bytes).
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: [u8; 32],
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides access to encryption keys (OS keychain in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

/// OS keyring-backed provider. The key is generated on first use, stored in
/// the keychain, and cached for the lifetime of the provider.
pub struct KeyringProvider {
    service: String,
    account: String,
    builder: Option<Arc<CredentialBuilder>>,
    cached: OnceCell<KeyMaterial>,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            builder: None,
            cached: OnceCell::new(),
        }
    }

    /// Keep the data key in `builder`'s store instead of the platform keychain.
    pub fn with_credential_builder(mut self, builder: Arc<CredentialBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    async fn load_or_generate(&self) -> Result<KeyMaterial, KeyError> {
        let service = self.service.clone();
        let account = self.account.clone();
        let builder = self.builder.clone();
        // keyring calls block on the platform credential service.
        tokio::task::spawn_blocking(move || {
            let entry = open_entry(builder.as_deref(), &service, &account)
                .map_err(|e| KeyError::Keyring(e.to_string()))?;

            match entry.get_password() {
                Ok(secret) => decode_key(&account, &secret),
                Err(keyring::Error::NoEntry) => {
                    debug!(%service, %account, "no data key in keychain, generating one");
                    let material = generate_key(&account);
                    entry
                        .set_password(&encode_key(&material))
                        .map_err(|e| KeyError::Keyring(e.to_string()))?;
                    Ok(material)
                }
                Err(err) => Err(KeyError::Keyring(err.to_string())),
            }
        })
        .await
        .map_err(|e| KeyError::Keyring(format!("keychain task failed: {e}")))?
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    #[instrument(skip_all, fields(service = %self.service, account = %self.account))]
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        self.cached
            .get_or_try_init(|| self.load_or_generate())
            .await
            .cloned()
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

impl InMemoryKeyProvider {
    /// Provider that always hands out the given material.
    pub fn with_material(material: KeyMaterial) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(material))),
        }
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        Ok(guard.get_or_insert_with(|| generate_key("memory")).clone())
    }
}

fn generate_key(id: &str) -> KeyMaterial {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    KeyMaterial {
        id: id.to_string(),
        bytes,
    }
}

fn encode_key(material: &KeyMaterial) -> String {
    general_purpose::STANDARD.encode(material.bytes)
}

fn decode_key(id: &str, secret: &str) -> Result<KeyMaterial, KeyError> {
    let decoded = general_purpose::STANDARD
        .decode(secret.trim())
        .map_err(|e| KeyError::Decode(e.to_string()))?;

    let bytes: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
        KeyError::Decode(format!("expected 32 bytes, got {}", decoded.len()))
    })?;

    Ok(KeyMaterial {
        id: id.to_string(),
        bytes,
    })
}
