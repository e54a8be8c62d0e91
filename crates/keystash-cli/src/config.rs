use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use keystash_core::storage::StorageKind;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE: &str = "keystash";

/// User-level configuration loaded from `~/.config/keystash/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the data directory holding both file-backed stores.
    pub data_dir: Option<PathBuf>,
    /// Store used when `--store` is not given.
    pub default_store: Option<StorageKind>,
    /// Secure store settings.
    pub secure: Option<SecureConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SecureConfig {
    pub backend: Option<SecureBackendKind>,
    /// Keychain service name for the data key and keychain entries.
    pub service: Option<String>,
}

/// Facility behind the secure store.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SecureBackendKind {
    /// AES-GCM files under the data directory, key in the OS keychain.
    #[default]
    EncryptedFile,
    /// One OS keychain credential per entry.
    Keychain,
}

impl Config {
    /// Read the user config, falling back to defaults when there is none.
    pub fn load() -> Result<Self> {
        Self::from_file(&config_path()?)
    }

    /// Parse `path`. A missing or blank file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(&text)?)
    }

    pub fn default_store(&self) -> StorageKind {
        self.default_store.unwrap_or_default()
    }

    pub fn secure_backend(&self) -> SecureBackendKind {
        self.secure
            .as_ref()
            .and_then(|s| s.backend)
            .unwrap_or_default()
    }

    pub fn service(&self) -> &str {
        self.secure
            .as_ref()
            .and_then(|s| s.service.as_deref())
            .unwrap_or(DEFAULT_SERVICE)
    }
}

/// `<config dir>/keystash/config.toml` for the current platform.
pub fn config_path() -> Result<PathBuf> {
    config_dir()
        .map(|dir| dir.join("keystash").join("config.toml"))
        .ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))
}

/// Write the config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    let path = config_path()?;
    write_to_path_if_missing(config, &path)?;
    Ok(path)
}

/// Returns `true` when the file was written, `false` when it already existed.
pub fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(true)
}
