//! # ElementHook Remote
//!
//! Client side of the hosted data platform that stores webhook assignments.
//!
//! ```text
//!                    ┌──────────────────────┐
//!  store / bulk ───▶ │ dyn RemoteBackend    │ ──▶ RestBackend (reqwest, PostgREST)
//!                    │                      │ ──▶ MemoryBackend (offline, tests)
//!                    └──────────┬───────────┘
//!                               │ subscribe(org, table)
//!                               ▼
//!                     ChangeFeed ──▶ ChangeSubscription
//! ```
//!
//! ## Key Components
//!
//! - [`WebhookAssignment`] and query types ([`AssignmentFilters`], [`Pagination`])
//! - [`RemoteError`]: distinguishable failure taxonomy with retry classification
//! - [`RemoteBackend`]: the operations the core needs from the platform
//! - [`ChangeFeed`]: realtime row change events per organization and table

pub mod backend;
pub mod change;
pub mod error;
pub mod memory;
pub mod model;
pub mod rest;

// Re-exports
pub use backend::{RPC_RESET_STATS, RPC_TEST_WEBHOOK, RemoteBackend};
pub use change::{ChangeEvent, ChangeEventType, ChangeFeed, ChangeSubscription, FeedItem};
pub use error::RemoteError;
pub use memory::{MemoryBackend, Operation};
pub use model::{
    AssignmentFilters, AssignmentPatch, FunctionalKey, HealthStatus, HttpMethod, NewAssignment,
    PaginatedResult, Pagination, WebhookAssignment,
};
pub use rest::RestBackend;
