use async_trait::async_trait;

use super::{absent_on_miss, ignore_miss, EncryptedAtRest, Storage, StoreError};

/// Secure store. Accepts only facilities that encrypt at rest and stays
/// silent on failure paths so nothing about secret keys reaches the logs.
#[derive(Debug, Clone, Default)]
pub struct SecureStorage<B> {
    backend: B,
}

impl<B: EncryptedAtRest> SecureStorage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: EncryptedAtRest> Storage for SecureStorage<B> {
    async fn find(&self, key: &str) -> Result<Option<String>, StoreError> {
        absent_on_miss(self.backend.get(key).await)
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.backend.put(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        ignore_miss(self.backend.delete(key).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        regular::tests::{CapturedLogs, FailingBackend},
        MaskedMemoryBackend,
    };

    #[tokio::test]
    async fn round_trip_and_overwrite() {
        let storage = SecureStorage::new(MaskedMemoryBackend::new());
        storage.save("session", "abc").await.expect("save");
        storage.save("session", "def").await.expect("overwrite");
        assert_eq!(
            storage.find("session").await.expect("find").as_deref(),
            Some("def")
        );
    }

    #[tokio::test]
    async fn missing_and_removed_keys_are_absent() {
        let storage = SecureStorage::new(MaskedMemoryBackend::new());
        assert_eq!(storage.find("non-existent-key").await.expect("find"), None);

        storage.save("userId", "12345").await.expect("save");
        storage.remove("userId").await.expect("remove");
        storage.remove("userId").await.expect("remove again");
        assert_eq!(storage.find("userId").await.expect("find"), None);
    }

    #[tokio::test]
    async fn failures_propagate_silently() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let storage = SecureStorage::new(FailingBackend {
            reason: "Storage error",
        });
        let expected = StoreError::backend("Storage error");
        assert_eq!(storage.find("test-key").await, Err(expected.clone()));
        assert_eq!(storage.save("test-key", "v").await, Err(expected.clone()));
        assert_eq!(storage.remove("test-key").await, Err(expected));
        assert!(logs.contents().is_empty());
    }
}
