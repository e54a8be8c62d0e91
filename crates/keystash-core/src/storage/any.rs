use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EncryptedAtRest, KeyValueBackend, RegularStorage, SecureStorage, Storage, StoreError};

/// Which adapter an application wires in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Regular,
    Secure,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Regular => "regular",
            StorageKind::Secure => "secure",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown storage kind `{0}` (expected `regular` or `secure`)")]
pub struct ParseStorageKindError(String);

impl FromStr for StorageKind {
    type Err = ParseStorageKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(StorageKind::Regular),
            "secure" => Ok(StorageKind::Secure),
            _ => Err(ParseStorageKindError(s.to_string())),
        }
    }
}

/// Either adapter, chosen once when the application is composed.
#[derive(Debug, Clone)]
pub enum AnyStorage<R, S> {
    Regular(RegularStorage<R>),
    Secure(SecureStorage<S>),
}

impl<R: KeyValueBackend, S: EncryptedAtRest> AnyStorage<R, S> {
    pub fn regular(backend: R) -> Self {
        Self::Regular(RegularStorage::new(backend))
    }

    pub fn secure(backend: S) -> Self {
        Self::Secure(SecureStorage::new(backend))
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            AnyStorage::Regular(_) => StorageKind::Regular,
            AnyStorage::Secure(_) => StorageKind::Secure,
        }
    }
}

#[async_trait]
impl<R: KeyValueBackend, S: EncryptedAtRest> Storage for AnyStorage<R, S> {
    async fn find(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            AnyStorage::Regular(store) => store.find(key).await,
            AnyStorage::Secure(store) => store.find(key).await,
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            AnyStorage::Regular(store) => store.save(key, value).await,
            AnyStorage::Secure(store) => store.save(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self {
            AnyStorage::Regular(store) => store.remove(key).await,
            AnyStorage::Secure(store) => store.remove(key).await,
        }
    }
}
