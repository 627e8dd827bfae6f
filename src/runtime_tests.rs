use super::*;

use elementhook_dom::{DomNode, DomSnapshot, StaticDocument, WebhookStatus};
use elementhook_remote::{FunctionalKey, MemoryBackend, NewAssignment, Operation};

fn checkout_document() -> Arc<StaticDocument> {
    let mut doc = DomSnapshot::for_page("/app/checkout");
    let body = doc.push(None, DomNode::element("body"));
    doc.push(
        Some(body),
        DomNode::element("button")
            .attr("id", "pay-btn")
            .text("Pay")
            .bounds(0.0, 0.0, 100.0, 40.0),
    );
    Arc::new(StaticDocument::new(doc))
}

fn pay_button() -> NewAssignment {
    NewAssignment::new(
        FunctionalKey {
            organization_id: "org-1".to_string(),
            feature_slug: "checkout".to_string(),
            page_path: "/app/checkout".to_string(),
            element_id: "id_pay-btn".to_string(),
        },
        "Payment started",
        "https://hooks.example.com/pay",
    )
}

async fn start(config: Config, backend: &Arc<MemoryBackend>) -> ElementHook {
    ElementHook::with_backend(config, backend.clone(), checkout_document(), "org-1")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_wiring_follows_document_page() {
    let backend = Arc::new(MemoryBackend::new());
    let hook = start(Config::default(), &backend).await;

    assert_eq!(hook.organization_id(), "org-1");
    assert_eq!(hook.page_path(), "/app/checkout");
    hook.navigate("/app/billing");
    assert_eq!(hook.page_path(), "/app/billing");

    hook.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scan_sees_store_writes() {
    let backend = Arc::new(MemoryBackend::new());
    let hook = start(Config::default(), &backend).await;

    let result = hook.scanner().scan().await.unwrap();
    assert_eq!(result.elements_found, 1);
    assert_eq!(result.elements[0].webhook_status, WebhookStatus::None);

    hook.store().create(pay_button()).await.unwrap();

    let result = hook.scanner().scan_fresh().await.unwrap();
    assert_eq!(result.elements[0].webhook_status, WebhookStatus::Unknown);

    hook.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_remote_changes_invalidate_lookups() {
    let backend = Arc::new(MemoryBackend::new());
    let hook = start(Config::default(), &backend).await;

    let result = hook.scanner().scan().await.unwrap();
    assert_eq!(result.elements_with_webhooks, 0);

    // Another session creates the binding.
    backend.insert_assignment(&pay_button()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = hook.scanner().scan_fresh().await.unwrap();
    assert_eq!(result.elements_with_webhooks, 1);
    assert_eq!(backend.calls(Operation::FindActive), 2);

    hook.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cache_persists_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.cache.persist = true;
    config.cache.persist_path = dir.path().join("cache.json.gz");

    let backend = Arc::new(MemoryBackend::new());
    let created = backend.insert_assignment(&pay_button()).await.unwrap();

    let hook = start(config.clone(), &backend).await;
    hook.store().get(&created.id).await.unwrap();
    hook.shutdown().await.unwrap();
    assert!(dir.path().join("cache.json.gz").exists());

    backend.reset_calls();
    let hook = start(config, &backend).await;
    let restored = hook.store().get(&created.id).await.unwrap();
    assert_eq!(restored, Some(created));
    assert_eq!(backend.calls(Operation::Fetch), 0);
    hook.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let backend = Arc::new(MemoryBackend::new());
    let mut config = Config::default();
    config.scanner.selectors.clear();

    let result =
        ElementHook::with_backend(config, backend, checkout_document(), "org-1").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_connect_rejects_bad_base_url() {
    let mut config = Config::default();
    config.remote.base_url = "localhost".to_string();

    let result = ElementHook::connect(config, checkout_document(), "org-1").await;
    assert!(result.is_err());
}
