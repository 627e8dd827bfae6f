//! End-to-end scanning scenarios over fixture pages.

use std::sync::Arc;
use std::time::Duration;

use elementhook_config::{ScannerConfig, WatcherConfig};
use elementhook_dom::{
    ComputedStyle, DomNode, DomSnapshot, ElementClassifier, ElementScanner, ElementType,
    MutationRecord, MutationWatcher, StaticDocument, classifier::Classify,
};

// ============================================================================
// Fixtures
// ============================================================================

/// `<button id="submit-btn">Send</button>`, a hidden text input and a
/// zero-size link.
fn contact_page() -> DomSnapshot {
    let mut doc = DomSnapshot::for_page("/app/contact");
    let html = doc.push(None, DomNode::element("html"));
    let body = doc.push(Some(html), DomNode::element("body"));
    let form = doc.push(Some(body), DomNode::element("div").attr("class", "contact"));

    doc.push(
        Some(form),
        DomNode::element("button")
            .attr("id", "submit-btn")
            .text("Send")
            .bounds(10.0, 10.0, 80.0, 32.0),
    );
    doc.push(
        Some(form),
        DomNode::element("input")
            .attr("type", "text")
            .bounds(10.0, 50.0, 200.0, 24.0)
            .style(ComputedStyle {
                display: Some("none".to_string()),
                ..Default::default()
            }),
    );
    doc.push(Some(body), DomNode::element("a").attr("href", "/x"));
    doc
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_fixture_page_scan() {
    let scanner = ElementScanner::new(
        ScannerConfig::default(),
        Arc::new(StaticDocument::new(contact_page())),
    )
    .unwrap();

    let result = scanner.scan().await.unwrap();

    assert_eq!(result.elements_found, 2);
    assert_eq!(result.elements_with_webhooks, 0);
    let button = &result.elements[0];
    assert_eq!(button.id, "id_submit-btn");
    assert_eq!(button.element_type, ElementType::Button);
    assert_eq!(button.metadata.text_content, "Send");
    assert_eq!(result.elements[1].element_type, ElementType::Link);
    assert!(
        result
            .elements
            .iter()
            .all(|e| e.element_type != ElementType::Input)
    );
}

#[tokio::test]
async fn test_identifiers_stable_across_scans() {
    let document = Arc::new(StaticDocument::new(contact_page()));
    let scanner = ElementScanner::new(ScannerConfig::default(), document.clone()).unwrap();

    let first = scanner.scan().await.unwrap();
    // Same markup, fresh snapshot.
    document.replace(contact_page());
    let second = scanner.scan().await.unwrap();

    let ids = |r: &elementhook_dom::ScanResult| {
        r.elements
            .iter()
            .map(|e| (e.id.clone(), e.element_type, e.content_hash.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));

    let classifier = ElementClassifier::new();
    let doc = contact_page();
    for el in doc.descendants() {
        let a = classifier.describe(el, "/app/contact").unwrap();
        let b = classifier.describe(el, "/app/contact").unwrap();
        assert_eq!(a, b);
    }
}

#[tokio::test(start_paused = true)]
async fn test_watcher_rescans_once_per_burst() {
    let document = Arc::new(StaticDocument::new(contact_page()));
    let scanner = ElementScanner::new(ScannerConfig::default(), document.clone()).unwrap();
    let watcher = MutationWatcher::new(scanner, WatcherConfig::default()).unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let sender = watcher
        .start_monitoring(move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

    let initial = rx.recv().await.unwrap();
    assert_eq!(initial.elements_found, 2);

    // The link gets a layout box and a new button appears.
    let mut updated = contact_page();
    let body = updated.element(updated.roots[0]).unwrap().children()[0].id();
    updated.push(
        Some(body),
        DomNode::element("button")
            .attr("data-testid", "new-action")
            .bounds(0.0, 0.0, 40.0, 20.0),
    );
    document.replace(updated);

    for _ in 0..10 {
        sender.send(MutationRecord::child_list(1, 0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let rescanned = rx.recv().await.unwrap();
    assert_eq!(rescanned.elements_found, 3);
    assert!(watcher.cached_element("testid_new-action").is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(rx.try_recv().is_err());

    watcher.stop_monitoring();
}
