//! Bulk Operation Engine
//!
//! Applies one operation to a selection of webhook assignments, one item at
//! a time. Per-item failures become results; the run always reports exactly
//! one result per selected item, in selection order.
//!
//! ```text
//! selection ──► item 1 ──delay──► item 2 ──delay──► ... ──► summary
//!                 │                  │                        │
//!                 ▼                  ▼                        ▼
//!              progress           progress             invalidate lists
//! ```

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use elementhook_config::BulkConfig;
use elementhook_remote::{RPC_RESET_STATS, RPC_TEST_WEBHOOK};

use crate::error::{BulkError, StoreError};
use crate::export::ExportDocument;
use crate::item::BulkOperationItem;
use crate::keys;
use crate::store::WebhookAssignmentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkOperation {
    Enable,
    Disable,
    Delete,
    Test,
    ResetStatistics,
    Export,
}

impl BulkOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Delete => "delete",
            Self::Test => "test",
            Self::ResetStatistics => "reset-statistics",
            Self::Export => "export",
        }
    }

    /// Export is computed locally.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Export)
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Error,
    Skipped,
}

/// Outcome of one item in a bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub item_id: String,
    pub operation: BulkOperation,
    pub status: ItemStatus,
    /// Failure or skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// RPC response, for test and reset operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl BulkItemResult {
    fn success(item_id: &str, operation: BulkOperation, response: Option<Value>) -> Self {
        Self {
            item_id: item_id.to_string(),
            operation,
            status: ItemStatus::Success,
            error_message: None,
            response,
        }
    }

    fn error(item_id: &str, operation: BulkOperation, message: String) -> Self {
        Self {
            item_id: item_id.to_string(),
            operation,
            status: ItemStatus::Error,
            error_message: Some(message),
            response: None,
        }
    }

    fn skipped(item_id: &str, operation: BulkOperation, reason: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            operation,
            status: ItemStatus::Skipped,
            error_message: Some(reason.to_string()),
            response: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

impl BulkSummary {
    pub fn from_results(results: &[BulkItemResult]) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            success: count(ItemStatus::Success),
            error: count(ItemStatus::Error),
            skipped: count(ItemStatus::Skipped),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkProgress {
    pub completed: usize,
    pub total: usize,
    /// Id of the item processed last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

impl BulkProgress {
    pub fn is_done(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Outcome of one bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRun {
    pub operation: BulkOperation,
    pub results: Vec<BulkItemResult>,
    pub summary: BulkSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportDocument>,
    pub cancelled: bool,
}

/// Why the remaining items are skipped.
enum Halt {
    Cancelled,
    Fatal(String),
}

impl Halt {
    fn reason(&self) -> String {
        match self {
            Self::Cancelled => "Cancelled".to_string(),
            Self::Fatal(message) => format!("Skipped after fatal error: {}", message),
        }
    }
}

pub struct BulkOperationEngine {
    store: WebhookAssignmentStore,
    inter_item_delay: Duration,
    progress: watch::Sender<BulkProgress>,
}

impl BulkOperationEngine {
    pub fn new(store: WebhookAssignmentStore, config: &BulkConfig) -> Self {
        let (progress, _) = watch::channel(BulkProgress::default());
        Self {
            store,
            inter_item_delay: Duration::from_millis(config.inter_item_delay_ms),
            progress,
        }
    }

    /// Progress of the current or last run.
    pub fn progress(&self) -> watch::Receiver<BulkProgress> {
        self.progress.subscribe()
    }

    pub async fn execute(
        &self,
        selection: &[BulkOperationItem],
        operation: BulkOperation,
    ) -> Result<BulkRun, BulkError> {
        self.execute_with_cancel(selection, operation, &CancellationToken::new())
            .await
    }

    /// Run `operation` over `selection`. Cancelling the token skips every
    /// item not yet started; the item in flight completes.
    pub async fn execute_with_cancel(
        &self,
        selection: &[BulkOperationItem],
        operation: BulkOperation,
        cancel: &CancellationToken,
    ) -> Result<BulkRun, BulkError> {
        if selection.is_empty() {
            return Err(BulkError::NothingSelected);
        }

        let total = selection.len();
        self.progress.send_replace(BulkProgress {
            completed: 0,
            total,
            current: None,
        });

        if !operation.is_remote() {
            return Ok(self.export(selection));
        }

        info!(%operation, total, "Starting bulk operation");

        let mut results = Vec::with_capacity(total);
        let mut halt: Option<Halt> = None;

        for (index, item) in selection.iter().enumerate() {
            if halt.is_none() && index > 0 && !self.inter_item_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.inter_item_delay) => {}
                }
            }
            if halt.is_none() && cancel.is_cancelled() {
                warn!(%operation, completed = index, total, "Bulk operation cancelled");
                halt = Some(Halt::Cancelled);
            }

            let skip_reason = halt.as_ref().map(Halt::reason);
            let result = match skip_reason {
                Some(reason) => BulkItemResult::skipped(&item.id, operation, &reason),
                None => match self.run_item(item, operation).await {
                    Ok(response) => BulkItemResult::success(&item.id, operation, response),
                    Err(e) => {
                        warn!(%operation, id = %item.id, error = %e, "Bulk item failed");
                        if e.is_fatal() {
                            halt = Some(Halt::Fatal(e.to_string()));
                        }
                        BulkItemResult::error(&item.id, operation, e.to_string())
                    }
                },
            };
            results.push(result);

            self.progress.send_replace(BulkProgress {
                completed: index + 1,
                total,
                current: Some(item.id.clone()),
            });
        }

        let invalidated = self.store.invalidate_lists();
        let summary = BulkSummary::from_results(&results);
        info!(
            %operation,
            success = summary.success,
            error = summary.error,
            skipped = summary.skipped,
            invalidated,
            "Bulk operation finished"
        );

        Ok(BulkRun {
            operation,
            results,
            summary,
            export: None,
            cancelled: matches!(halt, Some(Halt::Cancelled)),
        })
    }

    fn export(&self, selection: &[BulkOperationItem]) -> BulkRun {
        let document = ExportDocument::from_items(selection, Utc::now());
        let results: Vec<BulkItemResult> = selection
            .iter()
            .map(|item| BulkItemResult::success(&item.id, BulkOperation::Export, None))
            .collect();

        self.progress.send_replace(BulkProgress {
            completed: selection.len(),
            total: selection.len(),
            current: selection.last().map(|i| i.id.clone()),
        });
        debug!(count = results.len(), "Exported webhook configuration");

        BulkRun {
            operation: BulkOperation::Export,
            summary: BulkSummary::from_results(&results),
            results,
            export: Some(document),
            cancelled: false,
        }
    }

    async fn run_item(
        &self,
        item: &BulkOperationItem,
        operation: BulkOperation,
    ) -> Result<Option<Value>, StoreError> {
        match operation {
            BulkOperation::Enable | BulkOperation::Disable => {
                self.store
                    .write_active(&item.id, operation == BulkOperation::Enable)
                    .await?;
                Ok(None)
            }
            BulkOperation::Delete => {
                self.store.delete_remote(&item.id).await?;
                Ok(None)
            }
            BulkOperation::Test => {
                let response = self.call(RPC_TEST_WEBHOOK, &item.id).await?;
                // The refreshed counters are picked up by the list invalidation.
                self.store.cache().invalidate(&keys::detail(&item.id));
                Ok(Some(response))
            }
            BulkOperation::ResetStatistics => {
                let response = self.call(RPC_RESET_STATS, &item.id).await?;
                if let Err(e) = self.store.refresh(&item.id).await {
                    warn!(id = %item.id, error = %e, "Could not refresh after stats reset");
                }
                Ok(Some(response))
            }
            BulkOperation::Export => Ok(None),
        }
    }

    /// Call a webhook RPC; a `success: false` body is a failure.
    async fn call(&self, function: &str, id: &str) -> Result<Value, StoreError> {
        let response = self
            .store
            .backend()
            .call_rpc(function, json!({ "webhook_id": id }))
            .await?;

        if response.get("success").and_then(Value::as_bool) == Some(false) {
            let message = response
                .get("error")
                .or_else(|| response.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Request failed")
                .to_string();
            return Err(StoreError::Rejected(message));
        }
        Ok(response)
    }
}

#[cfg(test)]
#[path = "bulk_tests.rs"]
mod tests;
