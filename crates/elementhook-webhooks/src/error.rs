//! Store and bulk errors.

use thiserror::Error;

use elementhook_cache::CacheError;
use elementhook_remote::RemoteError;

/// Webhook assignment store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Rejected before reaching the remote.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The remote answered but reported failure.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Cache(CacheError),
}

impl StoreError {
    /// The remote error behind this failure, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }

    /// Further remote calls are pointless.
    pub fn is_fatal(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_fatal)
    }
}

impl From<CacheError> for StoreError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Remote(remote) => Self::Remote(remote),
            other => Self::Cache(other),
        }
    }
}

/// Bulk run errors. Per-item failures are results, not errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BulkError {
    #[error("No webhooks selected")]
    NothingSelected,
}
