//! Key-value capability interface shared by every adapter.

mod any;
mod backend;
mod error;
mod regular;
mod secure;

use async_trait::async_trait;

pub use any::{AnyStorage, ParseStorageKindError, StorageKind};
pub use backend::{EncryptedAtRest, InMemoryBackend, KeyValueBackend, MaskedMemoryBackend};
pub use error::StoreError;
pub use regular::RegularStorage;
pub use secure::SecureStorage;

/// Three-operation contract implemented by both the regular and the secure
/// adapter, so calling code does not care which one it was handed.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key does not exist; that is not an error.
    async fn find(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Persist `value` under `key`, overwriting any existing entry.
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the entry for `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Map a facility miss onto the absent value. Every other failure passes
/// through untouched.
pub(crate) fn absent_on_miss<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Same normalization for operations that carry no value.
pub(crate) fn ignore_miss(result: Result<(), StoreError>) -> Result<(), StoreError> {
    absent_on_miss(result).map(|_| ())
}
