//! # ElementHook Webhooks
//!
//! Webhook assignments bound to page elements, and lifecycle operations
//! over many of them at once.
//!
//! ```text
//!                 ┌──────────────────────────┐
//! ElementScanner ─┤ AssignmentStatusLookup   │
//!                 └────────────┬─────────────┘
//!                              ▼
//! BulkOperationEngine ─► WebhookAssignmentStore ─► QueryCache ─► RemoteBackend
//!         │
//!         └─► ExportDocument
//! ```
//!
//! ## Key Components
//!
//! - [`WebhookAssignmentStore`]: cached reads, replace-on-update writes
//! - [`AssignmentStatusLookup`]: webhook status of scanned elements
//! - [`BulkOperationEngine`]: sequential bulk enable, disable, delete, test,
//!   reset and export with progress and cancellation
//! - [`BulkOperationItem`]: selection rows with success rate and performance
//!   score

pub mod bulk;
pub mod error;
pub mod export;
pub mod item;
pub mod keys;
pub mod lookup;
pub mod store;

// Re-exports
pub use bulk::{
    BulkItemResult, BulkOperation, BulkOperationEngine, BulkProgress, BulkRun, BulkSummary,
    ItemStatus,
};
pub use error::{BulkError, StoreError};
pub use export::{ExportDocument, ExportedWebhook};
pub use item::{BulkOperationItem, SelectionFilter, SortDirection, SortKey, sort_items, sorted};
pub use lookup::{AssignmentStatusLookup, status_of};
pub use store::{ListSnapshot, WebhookAssignmentStore};
