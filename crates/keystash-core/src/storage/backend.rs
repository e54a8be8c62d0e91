use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::StoreError;

/// Contract for a backing facility: the thing that actually keeps the bytes.
///
/// A miss on [`get`](KeyValueBackend::get) is reported as
/// [`StoreError::NotFound`]; adapters normalize it to an absent value.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Retrieve the value for a key.
    async fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Persist a value under a key, overwriting any existing entry.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key and its value.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Marker for facilities that keep every value encrypted at rest.
/// Key material and enforcement are the facility's responsibility.
pub trait EncryptedAtRest: KeyValueBackend {}

#[async_trait]
impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Arc<B> {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

impl<B: EncryptedAtRest + ?Sized> EncryptedAtRest for Arc<B> {}

#[async_trait]
impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Box<B> {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

impl<B: EncryptedAtRest + ?Sized> EncryptedAtRest for Box<B> {}

/// Plain in-memory facility for tests and ephemeral sessions.
/// Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.inner
            .lock()
            .map_err(|err| StoreError::backend(format!("lock poisoned: {err}")))
    }
}

#[async_trait]
impl KeyValueBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// In-memory facility that masks values so plaintext never sits in the map.
/// This is not cryptographically secure; it only stands in for a real
/// encrypted facility in tests and smoke runs.
#[derive(Debug, Default, Clone)]
pub struct MaskedMemoryBackend {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MaskedMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.inner
            .lock()
            .map_err(|err| StoreError::backend(format!("lock poisoned: {err}")))
    }
}

#[async_trait]
impl KeyValueBackend for MaskedMemoryBackend {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let masked = self
            .lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))?;
        String::from_utf8(mask(&masked)).map_err(StoreError::backend)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), mask(value.as_bytes()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

impl EncryptedAtRest for MaskedMemoryBackend {}

const MASK_BYTE: u8 = 0xA5;

// XOR is its own inverse, so the same function masks and unmasks.
fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}
