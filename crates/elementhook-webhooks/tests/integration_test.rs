//! Store, bulk engine and scanner working against one backend.

use std::sync::Arc;

use elementhook_cache::QueryCache;
use elementhook_config::{BulkConfig, ScannerConfig};
use elementhook_dom::{DomNode, DomSnapshot, ElementScanner, StaticDocument, WebhookStatus};
use elementhook_remote::{FunctionalKey, MemoryBackend, NewAssignment, RemoteError};
use elementhook_webhooks::{
    AssignmentStatusLookup, BulkOperation, BulkOperationEngine, BulkOperationItem, ItemStatus,
    WebhookAssignmentStore,
};

fn input(element_id: &str) -> NewAssignment {
    NewAssignment::new(
        FunctionalKey {
            organization_id: "org-1".to_string(),
            feature_slug: "checkout".to_string(),
            page_path: "/app/checkout".to_string(),
            element_id: element_id.to_string(),
        },
        format!("Hook {element_id}"),
        "https://hooks.example.com/in",
    )
}

fn checkout_page() -> DomSnapshot {
    let mut doc = DomSnapshot::for_page("/app/checkout");
    let body = doc.push(None, DomNode::element("body"));
    doc.push(
        Some(body),
        DomNode::element("button")
            .attr("id", "pay-btn")
            .text("Pay now")
            .bounds(0.0, 0.0, 120.0, 40.0),
    );
    doc.push(
        Some(body),
        DomNode::element("button")
            .attr("id", "cancel-btn")
            .text("Cancel")
            .bounds(0.0, 50.0, 120.0, 40.0),
    );
    doc
}

#[tokio::test]
async fn test_bulk_disable_with_one_network_failure() {
    let backend = Arc::new(MemoryBackend::new());
    let store = WebhookAssignmentStore::new(backend.clone(), QueryCache::default());

    let mut selection = Vec::new();
    for element in ["id_a", "id_b", "id_c"] {
        let record = store.create(input(element)).await.unwrap();
        selection.push(BulkOperationItem::from(&record));
    }
    backend.fail_id(
        selection[1].id.clone(),
        RemoteError::Network("connection reset by peer".to_string()),
    );

    let engine = BulkOperationEngine::new(store.clone(), &BulkConfig::default());
    let run = engine
        .execute(&selection, BulkOperation::Disable)
        .await
        .unwrap();

    assert_eq!(run.results.len(), 3);
    assert_eq!(run.summary.success, 2);
    assert_eq!(run.summary.error, 1);
    assert_eq!(run.results[1].item_id, selection[1].id);
    assert_eq!(run.results[1].status, ItemStatus::Error);

    assert!(!backend.record(&selection[0].id).unwrap().is_active);
    assert!(backend.record(&selection[1].id).unwrap().is_active);
    assert!(!backend.record(&selection[2].id).unwrap().is_active);

    // The failed toggle left the cached detail untouched.
    let cached = store.get(&selection[1].id).await.unwrap().unwrap();
    assert!(cached.is_active);
}

#[tokio::test]
async fn test_scan_reflects_bulk_disable() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = QueryCache::default();
    let store = WebhookAssignmentStore::new(backend.clone(), cache.clone());
    let record = store.create(input("id_pay-btn")).await.unwrap();

    let lookup = Arc::new(AssignmentStatusLookup::new(
        backend.clone(),
        cache,
        "org-1",
        "/app/checkout",
    ));
    let scanner = ElementScanner::builder(
        ScannerConfig::default(),
        Arc::new(StaticDocument::new(checkout_page())),
    )
    .lookup(lookup)
    .build()
    .unwrap();

    let result = scanner.scan().await.unwrap();
    assert_eq!(result.elements_found, 2);
    assert_eq!(result.elements_with_webhooks, 1);
    let pay = result.elements.iter().find(|e| e.id == "id_pay-btn").unwrap();
    assert_eq!(pay.webhook_status, WebhookStatus::Unknown);

    let engine = BulkOperationEngine::new(store, &BulkConfig { inter_item_delay_ms: 0 });
    engine
        .execute(&[BulkOperationItem::from(&record)], BulkOperation::Disable)
        .await
        .unwrap();

    let result = scanner.scan_fresh().await.unwrap();
    assert_eq!(result.elements_with_webhooks, 0);
}
