use std::sync::Arc;

use async_trait::async_trait;
use keyring::credential::CredentialBuilder;
use keystash_core::storage::{EncryptedAtRest, KeyValueBackend, StoreError};
use tracing::instrument;

use crate::credentials::open_entry;

/// Secure store that keeps every entry as its own OS keychain credential
/// (Keychain on macOS, Credential Manager on Windows, Secret Service on
/// Linux). Encryption at rest is the platform's job.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
    builder: Option<Arc<CredentialBuilder>>,
}

impl KeychainStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            builder: None,
        }
    }

    /// Keep entries in `builder`'s store instead of the platform keychain.
    pub fn with_credential_builder(mut self, builder: Arc<CredentialBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> keyring::Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        let account = key.to_string();
        let builder = self.builder.clone();
        tokio::task::spawn_blocking(move || {
            let entry = open_entry(builder.as_deref(), &service, &account)
                .map_err(|e| map_keyring_error(&account, e))?;
            op(entry).map_err(|e| map_keyring_error(&account, e))
        })
        .await
        .map_err(|e| StoreError::backend(format!("keychain task failed: {e}")))?
    }
}

#[async_trait]
impl KeyValueBackend for KeychainStore {
    #[instrument(skip_all, fields(service = %self.service, key = %key))]
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.with_entry(key, |entry| entry.get_password()).await
    }

    #[instrument(skip_all, fields(service = %self.service, key = %key))]
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| entry.set_password(&value))
            .await
    }

    #[instrument(skip_all, fields(service = %self.service, key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.with_entry(key, |entry| entry.delete_credential()).await {
            Err(StoreError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }
}

impl EncryptedAtRest for KeychainStore {}

fn map_keyring_error(key: &str, err: keyring::Error) -> StoreError {
    match err {
        keyring::Error::NoEntry => StoreError::not_found(key),
        other => StoreError::backend(format!("keyring error: {other}")),
    }
}
