//! Concrete backing facilities for the Keystash adapters.
//! `FileStore` is the general persistent facility; `EncryptedFileStore`
//! (AES-GCM, key in the OS keyring) and `KeychainStore` are encrypted at rest.

pub mod credentials;
pub mod encrypted_file_store;
pub mod file_store;
pub mod key_provider;
pub mod keychain_store;

pub use credentials::{platform_keychain_persists, MemoryCredentialStore};
pub use encrypted_file_store::EncryptedFileStore;
pub use file_store::FileStore;
pub use key_provider::{InMemoryKeyProvider, KeyError, KeyMaterial, KeyProvider, KeyringProvider};
pub use keychain_store::KeychainStore;
