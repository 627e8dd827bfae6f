//! In-memory backend.
//!
//! Behaves like the hosted platform for the operations the core uses: server
//! side validation, the active-binding uniqueness constraint, derived health,
//! the webhook RPCs and change events. Failures and latency can be injected
//! per call, per operation or per record id.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::backend::{RPC_RESET_STATS, RPC_TEST_WEBHOOK, RemoteBackend};
use crate::change::{ChangeEvent, ChangeEventType, ChangeFeed, ChangeSubscription};
use crate::error::RemoteError;
use crate::model::{
    AssignmentFilters, AssignmentPatch, FunctionalKey, HealthStatus, NewAssignment,
    PaginatedResult, Pagination, WebhookAssignment,
};

/// Response time recorded by the simulated test execution.
const SIMULATED_RESPONSE_MS: f64 = 100.0;

/// Backend operations, for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Search,
    FindActive,
    Insert,
    Update,
    Delete,
    Rpc,
}

type RpcHandler = Arc<dyn Fn(Value) -> Result<Value, RemoteError> + Send + Sync>;

/// In-memory [`RemoteBackend`].
pub struct MemoryBackend {
    table: String,
    records: DashMap<String, WebhookAssignment>,
    feed: ChangeFeed,
    calls: DashMap<Operation, usize>,
    next_failures: Mutex<VecDeque<RemoteError>>,
    op_failures: DashMap<Operation, RemoteError>,
    id_failures: DashMap<String, RemoteError>,
    latency: Mutex<Duration>,
    rpc_handlers: DashMap<String, RpcHandler>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_table("element_webhooks")
    }

    /// Backend whose change events name `table`.
    pub fn with_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            records: DashMap::new(),
            feed: ChangeFeed::default(),
            calls: DashMap::new(),
            next_failures: Mutex::new(VecDeque::new()),
            op_failures: DashMap::new(),
            id_failures: DashMap::new(),
            latency: Mutex::new(Duration::ZERO),
            rpc_handlers: DashMap::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Store a record as-is, without events or validation.
    pub fn seed(&self, record: WebhookAssignment) {
        self.records.insert(record.id.clone(), record);
    }

    /// Direct read, bypassing counters and faults.
    pub fn record(&self, id: &str) -> Option<WebhookAssignment> {
        self.records.get(id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of calls made for an operation.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.get(&op).map(|c| *c).unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.calls.clear();
    }

    /// Fail the next call, whatever it is.
    pub fn fail_next(&self, error: RemoteError) {
        self.next_failures.lock().push_back(error);
    }

    /// Fail every call of an operation until cleared.
    pub fn fail_operation(&self, op: Operation, error: RemoteError) {
        self.op_failures.insert(op, error);
    }

    /// Fail every call targeting a record id until cleared.
    pub fn fail_id(&self, id: impl Into<String>, error: RemoteError) {
        self.id_failures.insert(id.into(), error);
    }

    pub fn clear_failures(&self) {
        self.next_failures.lock().clear();
        self.op_failures.clear();
        self.id_failures.clear();
    }

    /// Delay every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Register or replace an RPC.
    pub fn register_rpc<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Result<Value, RemoteError> + Send + Sync + 'static,
    {
        self.rpc_handlers.insert(name.into(), Arc::new(handler));
    }

    async fn enter(&self, op: Operation, target: Option<&str>) -> Result<(), RemoteError> {
        *self.calls.entry(op).or_insert(0) += 1;

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(err) = self.next_failures.lock().pop_front() {
            debug!(?op, error = %err, "Injected failure");
            return Err(err);
        }
        if let Some(err) = self.op_failures.get(&op) {
            return Err(err.clone());
        }
        if let Some(err) = target.and_then(|id| self.id_failures.get(id)) {
            return Err(err.clone());
        }
        Ok(())
    }

    fn emit(
        &self,
        event_type: ChangeEventType,
        organization_id: &str,
        new: Option<&WebhookAssignment>,
        old: Option<&WebhookAssignment>,
    ) {
        let to_value = |r: &WebhookAssignment| serde_json::to_value(r).ok();
        self.feed.publish(ChangeEvent {
            event_type,
            table: self.table.clone(),
            organization_id: organization_id.to_string(),
            new: new.and_then(to_value),
            old: old.and_then(to_value),
        });
    }

    fn active_binding(&self, key: &FunctionalKey, except: Option<&str>) -> Option<WebhookAssignment> {
        self.records
            .iter()
            .find(|r| r.is_active && &r.functional_key() == key && Some(r.id.as_str()) != except)
            .map(|r| r.clone())
    }

    fn builtin_rpc(&self, function: &str, params: &Value) -> Option<Result<Value, RemoteError>> {
        let id = match params.get("webhook_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None if function == RPC_TEST_WEBHOOK || function == RPC_RESET_STATS => {
                return Some(Err(RemoteError::Validation(
                    "webhook_id is required".to_string(),
                )));
            }
            None => return None,
        };

        let result = match function {
            RPC_TEST_WEBHOOK => self.modify(&id, |r| {
                let total = r.total_executions as f64;
                r.average_response_time =
                    (r.average_response_time * total + SIMULATED_RESPONSE_MS) / (total + 1.0);
                r.total_executions += 1;
                r.successful_executions += 1;
                r.last_triggered_at = Some(Utc::now());
            })
            .map(|_| {
                json!({
                    "success": true,
                    "status_code": 200,
                    "response_time_ms": SIMULATED_RESPONSE_MS,
                })
            }),
            RPC_RESET_STATS => self
                .modify(&id, |r| {
                    r.total_executions = 0;
                    r.successful_executions = 0;
                    r.failed_executions = 0;
                    r.average_response_time = 0.0;
                })
                .map(|_| json!({ "success": true })),
            _ => return None,
        };
        Some(result)
    }

    /// Mutate a record server-side, recompute derived fields and emit.
    fn modify(
        &self,
        id: &str,
        f: impl FnOnce(&mut WebhookAssignment),
    ) -> Result<WebhookAssignment, RemoteError> {
        let (old, new) = {
            let mut entry = self
                .records
                .get_mut(id)
                .ok_or_else(|| RemoteError::NotFound(format!("webhook {}", id)))?;
            let old = entry.clone();
            f(&mut entry);
            entry.health_status =
                HealthStatus::from_counts(entry.total_executions, entry.failed_executions);
            entry.updated_at = Utc::now();
            (old, entry.clone())
        };
        self.emit(
            ChangeEventType::Update,
            &new.organization_id,
            Some(&new),
            Some(&old),
        );
        Ok(new)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), RemoteError> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| RemoteError::Validation(format!("endpoint_url: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(RemoteError::Validation(format!(
            "endpoint_url: unsupported scheme '{}'",
            other
        ))),
    }
}

fn validate_new(input: &NewAssignment) -> Result<(), RemoteError> {
    for (field, value) in [
        ("organization_id", &input.organization_id),
        ("element_id", &input.element_id),
        ("name", &input.name),
    ] {
        if value.trim().is_empty() {
            return Err(RemoteError::Validation(format!("{} is required", field)));
        }
    }
    validate_endpoint(&input.endpoint_url)
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn fetch_assignment(&self, id: &str) -> Result<Option<WebhookAssignment>, RemoteError> {
        self.enter(Operation::Fetch, Some(id)).await?;
        Ok(self.record(id))
    }

    async fn search_assignments(
        &self,
        filters: &AssignmentFilters,
        pagination: Pagination,
    ) -> Result<PaginatedResult<WebhookAssignment>, RemoteError> {
        self.enter(Operation::Search, None).await?;

        let mut matching: Vec<WebhookAssignment> = self
            .records
            .iter()
            .filter(|r| filters.matches(r))
            .map(|r| r.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit())
            .collect();
        Ok(PaginatedResult::new(items, total, pagination))
    }

    async fn find_active_binding(
        &self,
        key: &FunctionalKey,
    ) -> Result<Option<WebhookAssignment>, RemoteError> {
        self.enter(Operation::FindActive, None).await?;
        Ok(self.active_binding(key, None))
    }

    async fn insert_assignment(
        &self,
        input: &NewAssignment,
    ) -> Result<WebhookAssignment, RemoteError> {
        self.enter(Operation::Insert, None).await?;
        validate_new(input)?;

        let key = input.functional_key();
        if input.is_active && self.active_binding(&key, None).is_some() {
            return Err(RemoteError::Conflict(format!(
                "active binding exists for element {}",
                key.element_id
            )));
        }

        let record =
            WebhookAssignment::from_new(Uuid::new_v4().to_string(), input.clone(), Utc::now());
        self.records.insert(record.id.clone(), record.clone());
        self.emit(
            ChangeEventType::Insert,
            &record.organization_id,
            Some(&record),
            None,
        );
        Ok(record)
    }

    async fn update_assignment(
        &self,
        id: &str,
        patch: &AssignmentPatch,
    ) -> Result<WebhookAssignment, RemoteError> {
        self.enter(Operation::Update, Some(id)).await?;
        if let Some(endpoint) = &patch.endpoint_url {
            validate_endpoint(endpoint)?;
        }

        if patch.is_active == Some(true) {
            let current = self
                .record(id)
                .ok_or_else(|| RemoteError::NotFound(format!("webhook {}", id)))?;
            if self
                .active_binding(&current.functional_key(), Some(id))
                .is_some()
            {
                return Err(RemoteError::Conflict(format!(
                    "another active binding exists for element {}",
                    current.element_id
                )));
            }
        }

        self.modify(id, |r| patch.apply_to(r))
    }

    async fn delete_assignment(&self, id: &str) -> Result<(), RemoteError> {
        self.enter(Operation::Delete, Some(id)).await?;
        let (_, old) = self
            .records
            .remove(id)
            .ok_or_else(|| RemoteError::NotFound(format!("webhook {}", id)))?;
        self.emit(ChangeEventType::Delete, &old.organization_id, None, Some(&old));
        Ok(())
    }

    async fn call_rpc(&self, function: &str, params: Value) -> Result<Value, RemoteError> {
        let target = params
            .get("webhook_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.enter(Operation::Rpc, target.as_deref()).await?;

        let handler = self.rpc_handlers.get(function).map(|h| Arc::clone(&h));
        if let Some(handler) = handler {
            return handler(params);
        }
        self.builtin_rpc(function, &params)
            .unwrap_or_else(|| Err(RemoteError::NotFound(format!("function {}", function))))
    }

    fn subscribe(&self, organization_id: &str, table: &str) -> ChangeSubscription {
        self.feed.subscribe(organization_id, table)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
