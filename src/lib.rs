//! # ElementHook
//!
//! Bind webhooks to page elements and manage them in bulk.
//!
//! ```text
//! DocumentSource ──► ElementScanner ◄── MutationWatcher ◄── MutationRecord
//!                         │
//!                         ▼ status lookup
//!              WebhookAssignmentStore ◄── BulkOperationEngine
//!                         │
//!                         ▼
//!                    QueryCache ◄── RealtimeInvalidator ◄── change feed
//!                         │
//!                         ▼
//!                   RemoteBackend (REST or in-memory)
//! ```
//!
//! ## Key Components
//!
//! - [`ElementHook`]: one runtime per page session, owns every component
//! - [`init_logging`]: tracing subscriber with optional rolling log files
//!
//! The component crates are re-exported under their short names.

pub mod logging;
pub mod runtime;

// Re-exports
pub use elementhook_cache as cache;
pub use elementhook_config as config;
pub use elementhook_dom as dom;
pub use elementhook_remote as remote;
pub use elementhook_webhooks as webhooks;

pub use logging::init_logging;
pub use runtime::ElementHook;
