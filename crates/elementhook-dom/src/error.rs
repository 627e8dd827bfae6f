//! DOM, scan and watcher errors.

use thiserror::Error;

/// Errors raised while reading a snapshot or classifying an element.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomError {
    /// A node references a parent or child outside the arena.
    #[error("Dangling node reference: {0}")]
    DanglingNode(usize),

    /// Selector could not be parsed.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// Classification of a single element failed.
    #[error("Classification failed: {0}")]
    Classification(String),
}

impl DomError {
    pub(crate) fn selector(selector: &str, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            message: message.into(),
        }
    }
}

/// Errors that abort a whole scan.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// The document could not be captured.
    #[error("Document unavailable: {0}")]
    DocumentUnavailable(String),

    /// The scanner was configured with an invalid selector.
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Mutation watcher errors.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// `start_monitoring` called while a session is active.
    #[error("Monitoring is already active")]
    AlreadyRunning,

    /// Mutation submitted while no session is active.
    #[error("Monitoring is not active")]
    NotRunning,

    /// Configuration could not be applied.
    #[error(transparent)]
    Dom(#[from] DomError),
}
