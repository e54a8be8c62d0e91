use async_trait::async_trait;
use tracing::error;

use super::{absent_on_miss, ignore_miss, KeyValueBackend, Storage, StoreError};

/// General-purpose persistent store. Delegates every call to a plain
/// [`KeyValueBackend`] and logs lookup failures before returning them.
#[derive(Debug, Clone, Default)]
pub struct RegularStorage<B> {
    backend: B,
}

impl<B: KeyValueBackend> RegularStorage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: KeyValueBackend> Storage for RegularStorage<B> {
    async fn find(&self, key: &str) -> Result<Option<String>, StoreError> {
        absent_on_miss(self.backend.get(key).await).inspect_err(|err| {
            error!(key, error = %err, "error finding item in regular storage");
        })
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.backend.put(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        ignore_miss(self.backend.delete(key).await)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::storage::InMemoryBackend;

    /// Facility whose every call fails with the same reason.
    pub(crate) struct FailingBackend {
        pub(crate) reason: &'static str,
    }

    #[async_trait]
    impl KeyValueBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<String, StoreError> {
            Err(StoreError::backend(self.reason))
        }

        async fn put(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::backend(self.reason))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::backend(self.reason))
        }
    }

    impl crate::storage::EncryptedAtRest for FailingBackend {}

    /// Collects formatted log output so tests can assert on it.
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("lock")).into_owned()
        }

        pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn find_returns_saved_value() {
        let storage = RegularStorage::new(InMemoryBackend::new());
        storage.save("userId", "12345").await.expect("save");
        assert_eq!(
            storage.find("userId").await.expect("find").as_deref(),
            Some("12345")
        );
    }

    #[tokio::test]
    async fn find_missing_key_is_absent() {
        let storage = RegularStorage::new(InMemoryBackend::new());
        assert_eq!(storage.find("missing").await.expect("find"), None);
    }

    #[tokio::test]
    async fn save_overwrites_existing_value() {
        let storage = RegularStorage::new(InMemoryBackend::new());
        storage.save("theme", "light").await.expect("save");
        storage.save("theme", "dark").await.expect("save again");
        assert_eq!(
            storage.find("theme").await.expect("find").as_deref(),
            Some("dark")
        );
    }

    #[tokio::test]
    async fn remove_deletes_and_tolerates_missing_keys() {
        let storage = RegularStorage::new(InMemoryBackend::new());
        storage.save("userId", "12345").await.expect("save");
        storage.remove("userId").await.expect("remove");
        assert_eq!(storage.find("userId").await.expect("find"), None);

        storage.remove("never-saved").await.expect("remove missing");
        assert_eq!(storage.find("never-saved").await.expect("find"), None);
    }

    #[tokio::test]
    async fn find_failure_is_logged_and_propagated() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let storage = RegularStorage::new(FailingBackend { reason: "boom" });
        let err = storage.find("userId").await.expect_err("should fail");

        assert_eq!(err, StoreError::backend("boom"));
        assert!(err.to_string().contains("boom"));
        let output = logs.contents();
        assert!(output.contains("error finding item in regular storage"));
        assert!(output.contains("boom"));
    }

    #[tokio::test]
    async fn save_and_remove_failures_propagate_without_logging() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let storage = RegularStorage::new(FailingBackend { reason: "disk full" });
        let save_err = storage.save("k", "v").await.expect_err("save fails");
        let remove_err = storage.remove("k").await.expect_err("remove fails");

        assert_eq!(save_err, StoreError::backend("disk full"));
        assert_eq!(remove_err, StoreError::backend("disk full"));
        assert!(logs.contents().is_empty());
    }
}
