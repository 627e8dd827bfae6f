use super::*;
use crate::snapshot::{DomNode, DomSnapshot, NodeId};

fn single(node: DomNode) -> (DomSnapshot, NodeId) {
    let mut doc = DomSnapshot::new();
    let html = doc.push(None, DomNode::element("html"));
    let body = doc.push(Some(html), DomNode::element("body"));
    let id = doc.push(Some(body), node);
    (doc, id)
}

fn classify_node(node: DomNode) -> ElementType {
    let (doc, id) = single(node);
    classify(doc.element(id).unwrap())
}

#[test]
fn test_classify_interactive_tags() {
    assert_eq!(classify_node(DomNode::element("button")), ElementType::Button);
    assert_eq!(
        classify_node(DomNode::element("a").attr("href", "/x")),
        ElementType::Link
    );
    assert_eq!(classify_node(DomNode::element("form")), ElementType::Form);
    assert_eq!(classify_node(DomNode::element("select")), ElementType::Select);
    assert_eq!(classify_node(DomNode::element("textarea")), ElementType::Textarea);
}

#[test]
fn test_anchor_without_href_is_not_link() {
    assert_eq!(classify_node(DomNode::element("a")), ElementType::Unknown);
}

#[test]
fn test_classify_input_type_table() {
    let cases = [
        (None, ElementType::Input),
        (Some("text"), ElementType::Input),
        (Some("email"), ElementType::Input),
        (Some("password"), ElementType::Input),
        (Some("checkbox"), ElementType::Checkbox),
        (Some("radio"), ElementType::Radio),
        (Some("file"), ElementType::FileUpload),
        (Some("submit"), ElementType::Button),
        (Some("reset"), ElementType::Button),
        (Some("CHECKBOX"), ElementType::Checkbox),
    ];
    for (ty, expected) in cases {
        let mut node = DomNode::element("input");
        if let Some(ty) = ty {
            node = node.attr("type", ty);
        }
        assert_eq!(classify_node(node), expected, "type {:?}", ty);
    }
}

#[test]
fn test_classify_button_like() {
    assert_eq!(
        classify_node(DomNode::element("div").attr("role", "button")),
        ElementType::Button
    );
    assert_eq!(
        classify_node(DomNode::element("span").attr("onclick", "go()")),
        ElementType::Button
    );
    assert_eq!(
        classify_node(DomNode::element("div").attr("class", "card btn-primary")),
        ElementType::Button
    );
    assert_eq!(
        classify_node(DomNode::element("div").attr("class", "save-button")),
        ElementType::Button
    );
    assert_eq!(
        classify_node(DomNode::element("div").attr("class", "buttons-row")),
        ElementType::Unknown
    );
}

#[test]
fn test_classify_precedence() {
    // Tag beats role and data attributes.
    assert_eq!(
        classify_node(
            DomNode::element("a")
                .attr("href", "/x")
                .attr("role", "button")
                .attr("data-testid", "x")
        ),
        ElementType::Link
    );
    // Button-like beats test id.
    assert_eq!(
        classify_node(
            DomNode::element("div")
                .attr("role", "button")
                .attr("data-testid", "x")
        ),
        ElementType::Button
    );
}

#[test]
fn test_classify_custom_and_unknown() {
    assert_eq!(
        classify_node(DomNode::element("div").attr("data-testid", "card")),
        ElementType::Custom
    );
    assert_eq!(
        classify_node(DomNode::element("li").attr("data-element-id", "row-1")),
        ElementType::Custom
    );
    assert_eq!(classify_node(DomNode::element("div")), ElementType::Unknown);
}

#[test]
fn test_make_id_precedence() {
    let (doc, id) = single(
        DomNode::element("button")
            .attr("id", "submit-btn")
            .attr("data-testid", "submit"),
    );
    let el = doc.element(id).unwrap();
    assert_eq!(make_id(el, classify(el)), "id_submit-btn");

    let (doc, id) = single(DomNode::element("button").attr("data-testid", "submit"));
    let el = doc.element(id).unwrap();
    assert_eq!(make_id(el, classify(el)), "testid_submit");

    let (doc, id) = single(DomNode::element("button").text("Send"));
    let el = doc.element(id).unwrap();
    let made = make_id(el, classify(el));
    assert!(made.starts_with("hash_"));
    let expected = format!("hash_{}", hash_base36("button|button|Send"));
    assert_eq!(made, expected);
}

#[test]
fn test_make_id_deterministic() {
    let (doc, id) = single(DomNode::element("div").attr("class", "card").text("  Save   changes "));
    let el = doc.element(id).unwrap();
    let first = (classify(el), make_id(el, classify(el)));
    let second = (classify(el), make_id(el, classify(el)));
    assert_eq!(first, second);

    let (doc2, id2) = single(DomNode::element("div").attr("class", "card").text("  Save   changes "));
    let el2 = doc2.element(id2).unwrap();
    assert_eq!(make_id(el2, classify(el2)), first.1);
}

#[test]
fn test_make_id_changes_with_text() {
    let (doc, id) = single(DomNode::element("button").text("Save"));
    let (doc2, id2) = single(DomNode::element("button").text("Delete"));
    let a = doc.element(id).unwrap();
    let b = doc2.element(id2).unwrap();
    assert_ne!(make_id(a, classify(a)), make_id(b, classify(b)));
}

#[test]
fn test_dom_path_stops_at_id() {
    let mut doc = DomSnapshot::new();
    let body = doc.push(None, DomNode::element("body"));
    let main = doc.push(Some(body), DomNode::element("main").attr("id", "content"));
    let section = doc.push(
        Some(main),
        DomNode::element("section").attr("class", "panel css-1x2y3z settings"),
    );
    let button = doc.push(Some(section), DomNode::element("button"));

    let path = dom_path(doc.element(button).unwrap());
    assert_eq!(path, "main#content > section.panel.settings > button");
}

#[test]
fn test_dom_path_nth_child_on_collision() {
    let mut doc = DomSnapshot::new();
    let body = doc.push(None, DomNode::element("body"));
    let ul = doc.push(Some(body), DomNode::element("ul"));
    let _first = doc.push(Some(ul), DomNode::element("li"));
    let second = doc.push(Some(ul), DomNode::element("li"));
    let label = doc.push(Some(body), DomNode::element("span"));

    assert_eq!(dom_path(doc.element(second).unwrap()), "ul > li:nth-child(2)");
    assert_eq!(dom_path(doc.element(label).unwrap()), "span");
}

#[test]
fn test_dom_path_limits_classes() {
    let (doc, id) = single(DomNode::element("div").attr("class", "a b c d"));
    assert_eq!(dom_path(doc.element(id).unwrap()), "div.a.b");
}

#[test]
fn test_try_dom_path_dangling_parent() {
    let (mut doc, id) = single(DomNode::element("button"));
    doc.node_mut(id).unwrap().parent = Some(NodeId(999));
    let el = doc.element(id).unwrap();
    assert_eq!(try_dom_path(el), Err(DomError::DanglingNode(999)));
    assert_eq!(dom_path(el), "button");
    assert!(ElementClassifier::new().describe(el, "/").is_err());
}

#[test]
fn test_is_generated_class() {
    assert!(is_generated_class("Button__label"));
    assert!(is_generated_class("css-1q2w3e"));
    assert!(is_generated_class("sc-AxjAm"));
    assert!(is_generated_class("jsx-123"));
    assert!(is_generated_class("emotion-abc"));
    assert!(is_generated_class("svelte-xyz"));
    assert!(is_generated_class("button-a1b2c3"));
    assert!(!is_generated_class("btn-primary"));
    assert!(!is_generated_class("card"));
    assert!(!is_generated_class("col-12"));
}

#[test]
fn test_content_hash_tracks_content() {
    let (doc, id) = single(DomNode::element("a").attr("href", "/a").text("Docs"));
    let (doc2, id2) = single(DomNode::element("a").attr("href", "/b").text("Docs"));
    let a = content_hash(doc.element(id).unwrap());
    let b = content_hash(doc2.element(id2).unwrap());
    assert_ne!(a, b);
    assert_eq!(a, hash_base36("a|Docs|/a||"));
}

#[test]
fn test_extract_metadata() {
    let long = "x".repeat(150);
    let (doc, id) = single(
        DomNode::element("input")
            .attr("type", "email")
            .attr("name", "email")
            .attr("placeholder", "you@example.com")
            .attr("aria-label", "Email")
            .attr("data-track", "signup")
            .attr("class", "field")
            .text(long),
    );
    let meta = extract_metadata(doc.element(id).unwrap(), "/app/signup-flow/step-1");
    assert_eq!(meta.tag_name, "input");
    assert_eq!(meta.input_type.as_deref(), Some("email"));
    assert_eq!(meta.name.as_deref(), Some("email"));
    assert_eq!(meta.placeholder.as_deref(), Some("you@example.com"));
    assert_eq!(meta.aria_label.as_deref(), Some("Email"));
    assert_eq!(meta.class_name.as_deref(), Some("field"));
    assert_eq!(meta.text_content.chars().count(), TEXT_EXCERPT_LIMIT);
    assert_eq!(meta.feature_slug.as_deref(), Some("signup-flow"));
    assert_eq!(meta.custom_attributes.len(), 2);
    assert_eq!(meta.custom_attributes.get("data-track").map(String::as_str), Some("signup"));
}

#[test]
fn test_extract_metadata_multibyte_excerpt() {
    let text = "é".repeat(120);
    let (doc, id) = single(DomNode::element("button").text(text));
    let meta = extract_metadata(doc.element(id).unwrap(), "/");
    assert_eq!(meta.text_content.chars().count(), TEXT_EXCERPT_LIMIT);
    assert!(meta.feature_slug.is_none());
}

#[test]
fn test_infer_feature_slug() {
    assert_eq!(infer_feature_slug("/"), None);
    assert_eq!(infer_feature_slug(""), None);
    assert_eq!(infer_feature_slug("/webhooks"), Some("webhooks".to_string()));
    assert_eq!(
        infer_feature_slug("/app/webhook-settings/edit"),
        Some("webhook-settings".to_string())
    );
    assert_eq!(
        infer_feature_slug("/dashboard/admin/Billing?tab=1"),
        Some("billing".to_string())
    );
    assert_eq!(
        infer_feature_slug("/org/42/userManagement"),
        Some("user-management".to_string())
    );
    assert_eq!(infer_feature_slug("/app/"), None);
    assert_eq!(
        infer_feature_slug("/features/team_inbox#top"),
        Some("team-inbox".to_string())
    );
}

#[test]
fn test_describe_combines_parts() {
    let (doc, id) = single(DomNode::element("button").attr("id", "go").text("Go"));
    let el = doc.element(id).unwrap();
    let descriptor = ElementClassifier::new().describe(el, "/app/checkout").unwrap();
    assert_eq!(descriptor.id, "id_go");
    assert_eq!(descriptor.element_type, ElementType::Button);
    assert_eq!(descriptor.dom_path, "button#go");
    assert_eq!(descriptor.content_hash, content_hash(el));
    assert_eq!(descriptor.metadata.feature_slug.as_deref(), Some("checkout"));
}
