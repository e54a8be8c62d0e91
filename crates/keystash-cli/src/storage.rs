use std::path::PathBuf;

use async_trait::async_trait;
use color_eyre::Result;
use dirs::data_dir;
use keystash_core::storage::{AnyStorage, EncryptedAtRest, KeyValueBackend, StorageKind, StoreError};
use keystash_storage::{
    platform_keychain_persists, EncryptedFileStore, FileStore, KeychainStore, KeyringProvider,
};
use tracing::debug;

use crate::config::{Config, SecureBackendKind};

const DATA_KEY_ACCOUNT: &str = "data-key";

/// Storage handed to commands: either adapter over the configured facilities.
pub type AppStorage = AnyStorage<FileStore, SecureFacility>;

/// Facility behind the secure store, chosen from config.
pub enum SecureFacility {
    EncryptedFile(EncryptedFileStore<KeyringProvider>),
    Keychain(KeychainStore),
}

#[async_trait]
impl KeyValueBackend for SecureFacility {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        match self {
            SecureFacility::EncryptedFile(store) => store.get(key).await,
            SecureFacility::Keychain(store) => store.get(key).await,
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            SecureFacility::EncryptedFile(store) => store.put(key, value).await,
            SecureFacility::Keychain(store) => store.put(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            SecureFacility::EncryptedFile(store) => store.delete(key).await,
            SecureFacility::Keychain(store) => store.delete(key).await,
        }
    }
}

impl EncryptedAtRest for SecureFacility {}

/// Resolve the default data directory for Keystash.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("keystash"))
}

fn resolve_data_dir(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_data_dir(),
    }
}

/// Build the store selected by `--store` (or the configured default).
pub fn store_from_config(config: &Config, requested: Option<StorageKind>) -> Result<AppStorage> {
    let root = resolve_data_dir(config)?;
    let kind = requested.unwrap_or_else(|| config.default_store());

    let storage = match kind {
        StorageKind::Regular => {
            let root = root.join("regular");
            debug!(?root, "initializing regular store");
            AppStorage::regular(FileStore::new(root))
        }
        StorageKind::Secure => AppStorage::secure(secure_facility(config, root)?),
    };
    Ok(storage)
}

fn secure_facility(config: &Config, root: PathBuf) -> Result<SecureFacility> {
    // Both facilities keep secrets in the OS keychain; a build without one
    // would hand out a fresh data key per run and lose every entry.
    if !platform_keychain_persists() {
        color_eyre::eyre::bail!("the secure store needs an OS keychain, which this build lacks");
    }
    let service = config.service();
    let facility = match config.secure_backend() {
        SecureBackendKind::EncryptedFile => {
            let root = root.join("secure");
            debug!(?root, service, "initializing encrypted file store");
            SecureFacility::EncryptedFile(EncryptedFileStore::new(
                root,
                KeyringProvider::new(service, DATA_KEY_ACCOUNT),
            ))
        }
        SecureBackendKind::Keychain => {
            let service = format!("{service}.entries");
            debug!(%service, "initializing keychain store");
            SecureFacility::Keychain(KeychainStore::new(service))
        }
    };
    Ok(facility)
}

/// Store wiring used by tests: file-backed, with the data key held in memory.
#[cfg(test)]
pub type TestStorage =
    AnyStorage<FileStore, EncryptedFileStore<keystash_storage::InMemoryKeyProvider>>;

#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>, kind: StorageKind) -> TestStorage {
    let root = root.into();
    match kind {
        StorageKind::Regular => TestStorage::regular(FileStore::new(root.join("regular"))),
        StorageKind::Secure => TestStorage::secure(EncryptedFileStore::new(
            root.join("secure"),
            keystash_storage::InMemoryKeyProvider::default(),
        )),
    }
}
