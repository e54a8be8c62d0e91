use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use keystash_core::storage::{KeyValueBackend, StoreError};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::instrument;

const ENTRY_EXTENSION: &str = "val";

/// Plain file-backed persistent store: one file per key under `root`.
/// Values are written as-is, so nothing sensitive belongs here.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(file_name_for(key))
    }
}

#[async_trait]
impl KeyValueBackend for FileStore {
    #[instrument(skip_all, fields(key = %key))]
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => String::from_utf8(bytes)
                .map_err(|e| StoreError::backend(format!("value is not valid UTF-8: {e}"))),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::not_found(key)),
            Err(err) => Err(StoreError::backend(err)),
        }
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        write_atomic(&self.path_for(key), value.as_bytes())
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

/// Keys are caller-chosen and may contain separators or exceed the
/// platform's name limit, so the file name is a fixed-length digest.
pub(crate) fn file_name_for(key: &str) -> String {
    format!("{:x}.{ENTRY_EXTENSION}", Sha256::digest(key.as_bytes()))
}

/// Write through a temp file in the same directory and rename over the
/// target, so readers see either the old or the new contents.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::backend("invalid storage path"))?;
    fs::create_dir_all(parent).map_err(StoreError::backend)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(StoreError::backend)?;
    tmp.write_all(contents).map_err(StoreError::backend)?;
    tmp.flush().map_err(StoreError::backend)?;
    tmp.persist(path).map_err(|e| StoreError::backend(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use keystash_core::storage::{RegularStorage, Storage};

    use super::*;

    #[tokio::test]
    async fn round_trip_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());
        store.put("prefs/theme", "dark").await.expect("put");

        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.get("prefs/theme").await.expect("get"), "dark");
    }

    #[tokio::test]
    async fn put_overwrites_and_delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("nested"));

        store.put("k", "v1").await.expect("put");
        store.put("k", "v2").await.expect("overwrite");
        assert_eq!(store.get("k").await.expect("get"), "v2");

        store.delete("k").await.expect("delete");
        store.delete("k").await.expect("delete again");
        let err = store.get("k").await.expect_err("should be missing");
        assert_eq!(err, StoreError::not_found("k"));
    }

    #[tokio::test]
    async fn keys_with_separators_stay_inside_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());
        store.put("../escape", "x").await.expect("put");

        let path = store.path_for("../escape");
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn long_keys_are_absent_until_saved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = RegularStorage::new(FileStore::new(dir.path()));
        let key = "k".repeat(4096);

        assert_eq!(storage.find(&key).await.expect("find"), None);
        storage.save(&key, "long").await.expect("save");
        assert_eq!(storage.find(&key).await.expect("find").as_deref(), Some("long"));
        storage.remove(&key).await.expect("remove");
        assert_eq!(storage.find(&key).await.expect("find"), None);
    }

    #[test]
    fn file_names_have_fixed_length() {
        let short = file_name_for("");
        let long = file_name_for(&"x".repeat(1000));
        assert_eq!(short.len(), long.len());
        assert_eq!(long.len(), 64 + 1 + ENTRY_EXTENSION.len());
        assert_ne!(file_name_for("a"), file_name_for("b"));
    }

    #[tokio::test]
    async fn empty_key_is_a_regular_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());
        store.put("", "blank").await.expect("put");
        assert_eq!(store.get("").await.expect("get"), "blank");
    }

    #[tokio::test]
    async fn non_utf8_contents_are_a_backend_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());
        fs::write(store.path_for("bin"), [0xff, 0xfe]).expect("write raw");

        let err = store.get("bin").await.expect_err("should fail");
        assert!(matches!(err, StoreError::Backend { .. }));
    }
}
