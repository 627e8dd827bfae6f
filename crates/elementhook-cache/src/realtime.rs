//! Realtime invalidation from the backend change feed.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use elementhook_remote::{ChangeEventType, ChangeSubscription, FeedItem};

use crate::cache::QueryCache;
use crate::key::QueryKey;

/// Which keys a row change affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRules {
    /// Prefix covering every list page of the table.
    pub list_prefix: QueryKey,
    /// Prefix of detail entries; the row id is appended.
    pub detail_prefix: QueryKey,
}

/// Invalidates cache entries as change events arrive.
pub struct RealtimeInvalidator {
    cache: QueryCache,
    rules: InvalidationRules,
}

impl RealtimeInvalidator {
    pub fn new(cache: QueryCache, rules: InvalidationRules) -> Self {
        Self { cache, rules }
    }

    /// Apply one feed item; returns the number of entries invalidated.
    ///
    /// Inserts only affect lists. Updates and deletes also hit the row's
    /// detail entry. A lagged subscriber may have missed anything, so every
    /// entry is invalidated.
    pub fn apply(&self, item: &FeedItem) -> usize {
        match item {
            FeedItem::Change(event) => {
                let mut count = self.cache.invalidate(&self.rules.list_prefix);
                if event.event_type != ChangeEventType::Insert {
                    if let Some(id) = event.record_id() {
                        count += self.cache.invalidate(&self.rules.detail_prefix.with(id));
                    }
                }
                debug!(
                    event_type = ?event.event_type,
                    record_id = event.record_id().unwrap_or("-"),
                    count,
                    "Applied change event"
                );
                count
            }
            FeedItem::Lagged(missed) => {
                info!("Change feed lagged by {} events, invalidating all", missed);
                self.cache.invalidate_all()
            }
        }
    }

    /// Consume the subscription until it closes or `cancel` fires.
    pub async fn run(self, mut subscription: ChangeSubscription, cancel: CancellationToken) {
        info!(
            "Realtime invalidation started for {}/{}",
            subscription.organization_id(),
            subscription.table()
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = subscription.recv() => match item {
                    Some(item) => {
                        self.apply(&item);
                    }
                    None => break,
                },
            }
        }
        info!("Realtime invalidation stopped for {}", subscription.table());
    }

    pub fn spawn(self, subscription: ChangeSubscription, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(subscription, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementhook_remote::{ChangeEvent, ChangeFeed};
    use serde_json::json;
    use std::time::Duration;

    fn rules() -> InvalidationRules {
        let root = QueryKey::new("element_webhooks");
        InvalidationRules {
            list_prefix: root.with("list"),
            detail_prefix: root.with("detail"),
        }
    }

    fn seeded() -> QueryCache {
        let cache = QueryCache::default();
        let r = rules();
        cache.set(&r.list_prefix.with("org-1").with("1"), &"page").unwrap();
        cache.set(&r.detail_prefix.with("wh-1"), &"one").unwrap();
        cache.set(&r.detail_prefix.with("wh-2"), &"two").unwrap();
        cache.set(&QueryKey::new("features"), &"other").unwrap();
        cache
    }

    fn event(event_type: ChangeEventType, id: &str) -> ChangeEvent {
        ChangeEvent {
            event_type,
            table: "element_webhooks".to_string(),
            organization_id: "org-1".to_string(),
            new: Some(json!({ "id": id })),
            old: None,
        }
    }

    #[test]
    fn test_insert_invalidates_lists_only() {
        let cache = seeded();
        let invalidator = RealtimeInvalidator::new(cache.clone(), rules());
        let count = invalidator.apply(&FeedItem::Change(event(ChangeEventType::Insert, "wh-3")));
        assert_eq!(count, 1);
        assert!(cache.is_stale(&rules().list_prefix.with("org-1").with("1")));
        assert!(!cache.is_stale(&rules().detail_prefix.with("wh-1")));
    }

    #[test]
    fn test_update_invalidates_detail_and_lists() {
        let cache = seeded();
        let invalidator = RealtimeInvalidator::new(cache.clone(), rules());
        let count = invalidator.apply(&FeedItem::Change(event(ChangeEventType::Update, "wh-1")));
        assert_eq!(count, 2);
        assert!(cache.is_stale(&rules().detail_prefix.with("wh-1")));
        assert!(!cache.is_stale(&rules().detail_prefix.with("wh-2")));
        assert!(!cache.is_stale(&QueryKey::new("features")));
    }

    #[test]
    fn test_lagged_invalidates_everything() {
        let cache = seeded();
        let invalidator = RealtimeInvalidator::new(cache.clone(), rules());
        assert_eq!(invalidator.apply(&FeedItem::Lagged(12)), 4);
        assert_eq!(cache.stats().fresh, 0);
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let cache = seeded();
        let feed = ChangeFeed::new(16);
        let cancel = CancellationToken::new();
        let handle = RealtimeInvalidator::new(cache.clone(), rules())
            .spawn(feed.subscribe("org-1", "element_webhooks"), cancel.clone());

        let mut delete = event(ChangeEventType::Delete, "wh-2");
        delete.old = delete.new.take();
        feed.publish(delete);

        let detail = rules().detail_prefix.with("wh-2");
        for _ in 0..50 {
            if cache.is_stale(&detail) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.is_stale(&detail));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_ends_when_feed_closes() {
        let feed = ChangeFeed::new(4);
        let handle = RealtimeInvalidator::new(QueryCache::default(), rules())
            .spawn(feed.subscribe("org-1", "element_webhooks"), CancellationToken::new());
        drop(feed);
        handle.await.unwrap();
    }
}
