//! Remote platform errors.

use thiserror::Error;

/// Failure of a call to the remote data platform.
///
/// Callers branch on the variant: transient failures may be retried,
/// `NotFound` is data for reads, `PermissionDenied` needs re-authentication.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The platform cannot be reached at all.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Unavailable(_)
        )
    }

    /// The platform is unreachable; further calls will fail too.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Map an HTTP status code and error message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 422 => Self::Validation(message),
            401 | 403 => Self::PermissionDenied(message),
            404 | 406 => Self::NotFound(message),
            409 => Self::Conflict(message),
            408 | 504 => Self::Timeout(message),
            429 | 502 | 503 => Self::Unavailable(message),
            _ if status >= 500 => Self::Network(format!("HTTP {}: {}", status, message)),
            _ => Self::Decode(format!("unexpected HTTP {}: {}", status, message)),
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Unavailable(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
