//! Access to the OS credential store shared by `KeyringProvider` and
//! `KeychainStore`.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use keyring::{
    credential::{Credential, CredentialApi, CredentialBuilder, CredentialBuilderApi, CredentialPersistence},
    Entry,
};

/// Open an entry through `builder`, or through the platform default store.
pub(crate) fn open_entry(
    builder: Option<&CredentialBuilder>,
    service: &str,
    account: &str,
) -> keyring::Result<Entry> {
    match builder {
        Some(builder) => Ok(Entry::new_with_credential(builder.build(
            None, service, account,
        )?)),
        None => Entry::new(service, account),
    }
}

/// Whether the platform default credential store outlives the process.
/// `false` on targets where `keyring` falls back to its per-entry mock, in
/// which case nothing written to the keychain can be read back.
pub fn platform_keychain_persists() -> bool {
    !matches!(
        keyring::default::default_credential_builder().persistence(),
        CredentialPersistence::EntryOnly | CredentialPersistence::ProcessOnly
    )
}

type Entries = HashMap<(String, String), Vec<u8>>;

/// Credential store held in process memory. Entries opened through the same
/// store (or its clones) see each other's secrets, like a real keychain.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder to hand to `KeyringProvider` or `KeychainStore`.
    pub fn builder(&self) -> Arc<CredentialBuilder> {
        Arc::new(self.clone())
    }

    fn lock(&self) -> keyring::Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|err| keyring::Error::PlatformFailure(format!("lock poisoned: {err}").into()))
    }
}

impl CredentialBuilderApi for MemoryCredentialStore {
    fn build(
        &self,
        _target: Option<&str>,
        service: &str,
        user: &str,
    ) -> keyring::Result<Box<Credential>> {
        Ok(Box::new(MemoryCredential {
            store: self.clone(),
            id: (service.to_string(), user.to_string()),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn persistence(&self) -> CredentialPersistence {
        CredentialPersistence::ProcessOnly
    }
}

#[derive(Debug)]
struct MemoryCredential {
    store: MemoryCredentialStore,
    id: (String, String),
}

impl CredentialApi for MemoryCredential {
    fn set_secret(&self, secret: &[u8]) -> keyring::Result<()> {
        self.store.lock()?.insert(self.id.clone(), secret.to_vec());
        Ok(())
    }

    fn get_secret(&self) -> keyring::Result<Vec<u8>> {
        self.store
            .lock()?
            .get(&self.id)
            .cloned()
            .ok_or(keyring::Error::NoEntry)
    }

    fn delete_credential(&self) -> keyring::Result<()> {
        self.store
            .lock()?
            .remove(&self.id)
            .map(|_| ())
            .ok_or(keyring::Error::NoEntry)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_from_one_store_share_secrets() {
        let store = MemoryCredentialStore::new();
        let builder = store.builder();

        let writer = open_entry(Some(builder.as_ref()), "svc", "acct").expect("entry");
        writer.set_password("hunter2").expect("set");

        let reader = open_entry(Some(builder.as_ref()), "svc", "acct").expect("entry");
        assert_eq!(reader.get_password().expect("get"), "hunter2");

        let other = open_entry(Some(builder.as_ref()), "svc", "other").expect("entry");
        assert!(matches!(other.get_password(), Err(keyring::Error::NoEntry)));
    }

    #[test]
    fn delete_of_missing_credential_reports_no_entry() {
        let store = MemoryCredentialStore::new();
        let entry = open_entry(Some(store.builder().as_ref()), "svc", "acct").expect("entry");
        assert!(matches!(entry.delete_credential(), Err(keyring::Error::NoEntry)));
    }

    #[cfg(any(
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "macos",
        target_os = "ios",
        target_os = "windows",
    ))]
    #[test]
    fn desktop_targets_get_a_persistent_keychain() {
        assert!(platform_keychain_persists());
    }
}
