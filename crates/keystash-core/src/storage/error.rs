use thiserror::Error;

/// Errors produced by backing facilities and surfaced by the adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The facility holds no entry for the key. Adapters turn this into an
    /// absent value, so callers of [`Storage`](super::Storage) never see it.
    #[error("entry not found for key: {key}")]
    NotFound { key: String },
    /// Underlying storage failure (I/O, permissions, keychain, crypto).
    #[error("storage failure: {reason}")]
    Backend { reason: String },
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn backend(reason: impl ToString) -> Self {
        Self::Backend {
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
