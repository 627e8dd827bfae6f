//! Document source protocol.
//!
//! The scanner never touches a live page; it asks a [`DocumentSource`] for
//! the current snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::ScanError;
use crate::snapshot::DomSnapshot;

/// Provides the current document snapshot.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Capture the document as it is now.
    async fn snapshot(&self) -> Result<Arc<DomSnapshot>, ScanError>;
}

/// A document source holding a snapshot pushed by the host.
#[derive(Debug, Default)]
pub struct StaticDocument {
    current: RwLock<Option<Arc<DomSnapshot>>>,
}

impl StaticDocument {
    /// Create a source with an initial snapshot.
    pub fn new(snapshot: DomSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    /// Create a source with no document attached.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub fn replace(&self, snapshot: DomSnapshot) {
        *self.current.write() = Some(Arc::new(snapshot));
    }

    /// Detach the document; subsequent snapshots fail.
    pub fn detach(&self) {
        *self.current.write() = None;
    }
}

#[async_trait]
impl DocumentSource for StaticDocument {
    async fn snapshot(&self) -> Result<Arc<DomSnapshot>, ScanError> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| ScanError::DocumentUnavailable("no document attached".to_string()))
    }
}
