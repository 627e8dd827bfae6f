use super::*;
use std::time::Duration;

use elementhook_remote::{
    FunctionalKey, HealthStatus, MemoryBackend, Operation, RPC_TEST_WEBHOOK,
};
use serde_json::json;

fn key(element_id: &str) -> FunctionalKey {
    FunctionalKey {
        organization_id: "org-1".to_string(),
        feature_slug: "checkout".to_string(),
        page_path: "/app/checkout".to_string(),
        element_id: element_id.to_string(),
    }
}

fn input(element_id: &str) -> NewAssignment {
    NewAssignment::new(
        key(element_id),
        format!("Hook {element_id}"),
        "https://hooks.example.com/in",
    )
}

fn setup() -> (Arc<MemoryBackend>, WebhookAssignmentStore) {
    let backend = Arc::new(MemoryBackend::new());
    let store = WebhookAssignmentStore::new(backend.clone(), QueryCache::default());
    (backend, store)
}

#[tokio::test]
async fn test_get_empty_id_short_circuits() {
    let (backend, store) = setup();
    assert_eq!(store.get("").await.unwrap(), None);
    assert_eq!(store.get("  ").await.unwrap(), None);
    assert_eq!(backend.calls(Operation::Fetch), 0);
}

#[tokio::test]
async fn test_get_missing_is_none_and_cached() {
    let (backend, store) = setup();
    assert_eq!(store.get("wh-x").await.unwrap(), None);
    assert_eq!(store.get("wh-x").await.unwrap(), None);
    assert_eq!(backend.calls(Operation::Fetch), 1);
}

#[tokio::test]
async fn test_get_not_found_error_is_none() {
    let (backend, store) = setup();
    backend.fail_next(RemoteError::NotFound("406".to_string()));
    assert_eq!(store.get("wh-x").await.unwrap(), None);
}

#[tokio::test]
async fn test_get_permission_denied_propagates() {
    let (backend, store) = setup();
    backend.fail_next(RemoteError::PermissionDenied("jwt expired".to_string()));
    let err = store.get("wh-x").await.unwrap_err();
    assert!(matches!(err.remote(), Some(RemoteError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_create_seeds_detail() {
    let (backend, store) = setup();
    let created = store.create(input("id_pay")).await.unwrap();

    let fetched = store.get(&created.id).await.unwrap();
    assert_eq!(fetched, Some(created));
    assert_eq!(backend.calls(Operation::Fetch), 0);
}

#[tokio::test]
async fn test_create_rejects_second_active_binding() {
    let (backend, store) = setup();
    store.create(input("id_pay")).await.unwrap();

    let err = store.create(input("id_pay")).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(backend.calls(Operation::Insert), 1);

    // A disabled duplicate is fine.
    let mut inactive = input("id_pay");
    inactive.is_active = false;
    store.create(inactive).await.unwrap();
    assert_eq!(backend.len(), 2);
}

#[tokio::test]
async fn test_create_validates_locally() {
    let (backend, store) = setup();
    let mut bad = input("id_pay");
    bad.name = String::new();
    assert!(matches!(
        store.create(bad).await,
        Err(StoreError::Validation(_))
    ));
    assert_eq!(backend.calls(Operation::FindActive), 0);
    assert_eq!(backend.calls(Operation::Insert), 0);
}

#[tokio::test]
async fn test_create_and_delete_invalidate_lists() {
    let (backend, store) = setup();
    let filters = AssignmentFilters::for_organization("org-1");
    store.create(input("id_a")).await.unwrap();

    let before = store.search(&filters, Pagination::default()).await.unwrap();
    assert_eq!(before.total_count, 1);
    store.search(&filters, Pagination::default()).await.unwrap();
    assert_eq!(backend.calls(Operation::Search), 1);

    let created = store.create(input("id_b")).await.unwrap();
    let after_create = store.search(&filters, Pagination::default()).await.unwrap();
    assert_eq!(after_create.total_count, 2);
    assert_eq!(backend.calls(Operation::Search), 2);

    store.delete(&created.id).await.unwrap();
    let after_delete = store.search(&filters, Pagination::default()).await.unwrap();
    assert_eq!(after_delete.total_count, 1);
    assert_eq!(backend.calls(Operation::Search), 3);
    assert!(!store.cache().contains(&keys::detail(&created.id)));
}

#[tokio::test]
async fn test_update_replaces_with_server_record() {
    let (backend, store) = setup();
    let created = store.create(input("id_pay")).await.unwrap();

    // Server-side counters the client never saw.
    let mut server = backend.record(&created.id).unwrap();
    server.total_executions = 10;
    server.failed_executions = 9;
    backend.seed(server);

    let patch = AssignmentPatch {
        name: Some("Renamed".to_string()),
        ..Default::default()
    };
    let updated = store.update(&created.id, &patch).await.unwrap();
    assert_eq!(updated.health_status, HealthStatus::Critical);

    let cached = store.get(&created.id).await.unwrap().unwrap();
    assert_eq!(cached, updated);
    assert_eq!(cached.name, "Renamed");
    assert_eq!(cached.total_executions, 10);
    assert_eq!(backend.calls(Operation::Fetch), 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_active_is_optimistic() {
    let (backend, store) = setup();
    let created = store.create(input("id_pay")).await.unwrap();
    backend.set_latency(Duration::from_millis(100));

    let toggling = {
        let store = store.clone();
        let id = created.id.clone();
        tokio::spawn(async move { store.set_active(&id, false).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let optimistic: WebhookAssignment = store.cache().get(&keys::detail(&created.id)).unwrap();
    assert!(!optimistic.is_active);

    let record = toggling.await.unwrap().unwrap();
    assert!(!record.is_active);
    assert!(record.updated_at >= created.updated_at);
}

#[tokio::test]
async fn test_set_active_rolls_back_on_failure() {
    let (backend, store) = setup();
    let created = store.create(input("id_pay")).await.unwrap();
    backend.fail_id(created.id.clone(), RemoteError::PermissionDenied("rls".to_string()));

    assert!(store.set_active(&created.id, false).await.is_err());

    let cached: WebhookAssignment = store.cache().get(&keys::detail(&created.id)).unwrap();
    assert!(cached.is_active);
    assert_eq!(cached, created);
}

#[tokio::test]
async fn test_search_snapshot_placeholder() {
    let (_backend, store) = setup();
    for i in 0..3 {
        store.create(input(&format!("id_{i}"))).await.unwrap();
    }
    let filters = AssignmentFilters::for_organization("org-1");
    assert!(store.search_snapshot(&filters, Pagination::new(1, 2)).is_none());

    let first = store.search(&filters, Pagination::new(1, 2)).await.unwrap();

    let same = store.search_snapshot(&filters, Pagination::new(1, 2)).unwrap();
    assert!(!same.is_placeholder);
    assert_eq!(same.page, first);

    let next = store.search_snapshot(&filters, Pagination::new(2, 2)).unwrap();
    assert!(next.is_placeholder);
    assert_eq!(next.page.current_page, 1);

    let other = AssignmentFilters::for_organization("org-2");
    assert!(store.search_snapshot(&other, Pagination::new(1, 2)).is_none());
}

#[tokio::test]
async fn test_refresh_reads_server_state() {
    let (backend, store) = setup();
    let created = store.create(input("id_pay")).await.unwrap();
    backend
        .call_rpc(RPC_TEST_WEBHOOK, json!({ "webhook_id": created.id }))
        .await
        .unwrap();

    assert_eq!(store.get(&created.id).await.unwrap().unwrap().total_executions, 0);
    let refreshed = store.refresh(&created.id).await.unwrap().unwrap();
    assert_eq!(refreshed.total_executions, 1);
}
