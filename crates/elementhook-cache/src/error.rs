//! Cache errors.

use thiserror::Error;

use elementhook_remote::RemoteError;

/// Cache error types.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The fetcher failed after retries.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A cached value does not have the requested shape.
    #[error("Failed to decode cached value for {key}: {message}")]
    Decode { key: String, message: String },

    /// Snapshot could not be written or read.
    #[error("Persistence error: {0}")]
    Persist(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// The underlying remote error, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}
