//! Remote backend protocol.

use async_trait::async_trait;
use serde_json::Value;

use crate::change::ChangeSubscription;
use crate::error::RemoteError;
use crate::model::{
    AssignmentFilters, AssignmentPatch, FunctionalKey, NewAssignment, PaginatedResult, Pagination,
    WebhookAssignment,
};

/// RPC that runs a test execution of a webhook.
pub const RPC_TEST_WEBHOOK: &str = "test_element_webhook";

/// RPC that zeroes a webhook's execution statistics.
pub const RPC_RESET_STATS: &str = "reset_element_webhook_stats";

/// Operations the core needs from the remote data platform.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Fetch one assignment; `Ok(None)` when it does not exist.
    async fn fetch_assignment(&self, id: &str) -> Result<Option<WebhookAssignment>, RemoteError>;

    /// Search assignments, newest first.
    async fn search_assignments(
        &self,
        filters: &AssignmentFilters,
        pagination: Pagination,
    ) -> Result<PaginatedResult<WebhookAssignment>, RemoteError>;

    /// The active assignment bound to a functional key, if any.
    async fn find_active_binding(
        &self,
        key: &FunctionalKey,
    ) -> Result<Option<WebhookAssignment>, RemoteError>;

    /// Insert and return the stored record.
    async fn insert_assignment(&self, input: &NewAssignment)
    -> Result<WebhookAssignment, RemoteError>;

    /// Update and return the stored record. `NotFound` if missing.
    async fn update_assignment(
        &self,
        id: &str,
        patch: &AssignmentPatch,
    ) -> Result<WebhookAssignment, RemoteError>;

    /// Delete. `NotFound` if missing.
    async fn delete_assignment(&self, id: &str) -> Result<(), RemoteError>;

    /// Call a server-side function.
    async fn call_rpc(&self, function: &str, params: Value) -> Result<Value, RemoteError>;

    /// Subscribe to row changes for an organization and table.
    fn subscribe(&self, organization_id: &str, table: &str) -> ChangeSubscription;
}
