//! # ElementHook DOM
//!
//! Element detection for the webhook binding workflow.
//!
//! ## Pipeline
//!
//! ```text
//! host page ──snapshot──▶ DocumentSource ──▶ ElementScanner ──▶ ScanResult
//!     │                                        ▲      │
//!     └──MutationRecord──▶ MutationWatcher ────┘      └──▶ Classify (ElementClassifier)
//!                          (debounce, cache)               WebhookStatusLookup
//! ```
//!
//! ## Key Components
//!
//! - [`DomSnapshot`] / [`ElementRef`]: read-only document model
//! - [`SelectorList`]: CSS selectors (via `scraper`) for candidates and exclusions
//! - [`ElementClassifier`]: element type, stable id, DOM path, content hash
//! - [`ElementScanner`]: filtered, capped, fault-isolated scan pass
//! - [`MutationWatcher`]: debounced re-scans driven by document mutations
//! - [`Diagnostics`]: injectable event hooks

pub mod classifier;
pub mod diagnostics;
pub mod document;
pub mod dom_types;
pub mod element;
pub mod error;
pub mod hash;
pub mod lookup;
pub mod scanner;
pub mod selector;
pub mod snapshot;
pub mod watcher;

// Re-exports
pub use classifier::{
    Classify, ElementClassifier, ElementDescriptor, content_hash, dom_path, extract_metadata,
    infer_feature_slug, make_id,
};
pub use diagnostics::{DiagnosticEvent, Diagnostics, RecordingDiagnostics, TracingDiagnostics};
pub use document::{DocumentSource, StaticDocument};
pub use dom_types::{BoundingBox, ComputedStyle};
pub use element::{DetectedElement, ElementMetadata, ElementType, ScanResult, WebhookStatus};
pub use error::{DomError, ScanError, WatcherError};
pub use lookup::{NoopLookup, WebhookStatusLookup};
pub use scanner::{ElementScanner, ScannerBuilder};
pub use selector::SelectorList;
pub use snapshot::{DomNode, DomSnapshot, ElementRef, NodeId};
pub use watcher::{
    MutationKind, MutationRecord, MutationSender, MutationWatcher, ScanCallback, WatcherState,
};
