//! # ElementHook Cache
//!
//! Client-side query cache for webhook data.
//!
//! ```text
//! fetch(key, tier, fetcher)
//!    │
//!    ├─ fresh ──────────▶ cached value
//!    ├─ stale ──────────▶ cached value + one background refresh
//!    └─ miss/invalid ───▶ shared fetch ──retry/backoff──▶ RemoteBackend
//!
//! ChangeFeed ──▶ RealtimeInvalidator ──invalidate(prefix)──▶ QueryCache
//! QueryCache ◀──save/load (gzip JSON)──▶ CachePersister
//! ```
//!
//! ## Key Components
//!
//! - [`QueryKey`]: ordered segments with prefix invalidation
//! - [`CacheTier`]: static, semi-static, dynamic and realtime presets
//! - [`QueryCache`]: stale-while-revalidate store with deduplicated fetches
//! - [`CachePersister`]: snapshot to disk between sessions
//! - [`RealtimeInvalidator`]: invalidation driven by row change events

pub mod cache;
pub mod error;
pub mod key;
pub mod persist;
pub mod policy;
pub mod realtime;
pub mod refresh;
pub mod retry;

// Re-exports
pub use cache::{CacheStats, EntrySnapshot, QueryCache, Refetcher};
pub use error::CacheError;
pub use key::QueryKey;
pub use persist::CachePersister;
pub use policy::{CachePolicy, CacheTier, RetryPolicy};
pub use realtime::{InvalidationRules, RealtimeInvalidator};
pub use refresh::{refresh_loop, spawn_refresh_loop};
pub use retry::retry_with_backoff;
