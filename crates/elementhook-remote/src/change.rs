//! Realtime change feed.
//!
//! The platform pushes row changes per organization and table. Backends own a
//! [`ChangeFeed`]; consumers hold a [`ChangeSubscription`] filtered to one
//! organization and table.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// Row change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeEventType {
    Insert,
    Update,
    Delete,
}

/// A row change pushed by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_type: ChangeEventType,
    pub table: String,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<serde_json::Value>,
}

impl ChangeEvent {
    /// Id of the changed row, from `new` or else `old`.
    pub fn record_id(&self) -> Option<&str> {
        self.new
            .as_ref()
            .and_then(|v| v.get("id"))
            .or_else(|| self.old.as_ref().and_then(|v| v.get("id")))
            .and_then(|v| v.as_str())
    }
}

/// Item delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Change(ChangeEvent),
    /// The subscriber fell behind and missed this many events.
    Lagged(u64),
}

/// Broadcast hub for change events.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; returns the number of live receivers.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, organization_id: &str, table: &str) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.tx.subscribe(),
            organization_id: organization_id.to_string(),
            table: table.to_string(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscription to one organization and table.
#[derive(Debug)]
pub struct ChangeSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    organization_id: String,
    table: String,
}

impl ChangeSubscription {
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Next matching item; `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<FeedItem> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if event.organization_id == self.organization_id && event.table == self.table {
                        return Some(FeedItem::Change(event));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, table = %self.table, "Change subscription lagged");
                    return Some(FeedItem::Lagged(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
