//! Diagnostics hooks for scans and watcher sessions.
//!
//! Components take an `Arc<dyn Diagnostics>` at construction. The default
//! implementation forwards to `tracing`; [`RecordingDiagnostics`] keeps the
//! events in memory for inspection.

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Events reported by the scanner and watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    ScanStarted,
    ScanCompleted {
        elements_found: usize,
        duration_ms: u64,
    },
    ElementSkipped {
        dom_node: usize,
        reason: String,
    },
    StatusLookupFailed {
        element_id: String,
        reason: String,
    },
    ScanDiscarded {
        generation: u64,
    },
}

/// Receives diagnostic events.
pub trait Diagnostics: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// Logs events with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::ElementSkipped { dom_node, reason } => {
                warn!(dom_node, %reason, "Element skipped during scan");
            }
            DiagnosticEvent::StatusLookupFailed { element_id, reason } => {
                debug!(%element_id, %reason, "Webhook status lookup failed");
            }
            other => debug!(event = ?other, "Scan diagnostic"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Count events matching a predicate.
    pub fn count(&self, pred: impl Fn(&DiagnosticEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        self.events.lock().push(event);
    }
}
