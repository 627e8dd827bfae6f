use std::collections::HashSet;

use super::*;
use crate::snapshot::DomNode;

fn fixture() -> (DomSnapshot, NodeId, NodeId, NodeId) {
    let mut doc = DomSnapshot::new();
    let body = doc.push(None, DomNode::element("body"));
    let nav = doc.push(
        Some(body),
        DomNode::element("nav").attr("class", "top-nav primary"),
    );
    let link = doc.push(
        Some(nav),
        DomNode::element("a")
            .attr("href", "/settings/webhooks")
            .attr("id", "settings-link"),
    );
    let panel = doc.push(
        Some(body),
        DomNode::element("div").attr("data-elementhook-ui", ""),
    );
    let inner = doc.push(
        Some(panel),
        DomNode::element("button")
            .attr("role", "button")
            .attr("data-testid", "overlay-close"),
    );
    (doc, link, inner, nav)
}

#[test]
fn test_parse_simple_selectors() {
    assert!(SelectorList::parse("button").is_ok());
    assert!(SelectorList::parse("a[href]").is_ok());
    assert!(SelectorList::parse("[role=\"button\"]").is_ok());
    assert!(SelectorList::parse("div.card > button#save").is_ok());
    assert!(SelectorList::parse("*").is_ok());
    assert!(SelectorList::parse("nav a, form input[type=checkbox]").is_ok());
}

#[test]
fn test_parse_rejects_invalid() {
    assert!(SelectorList::parse("").is_err());
    assert!(SelectorList::parse("   ").is_err());
    assert!(SelectorList::parse("button,").is_err());
    assert!(SelectorList::parse("a > ").is_err());
    assert!(SelectorList::parse("##save").is_err());
    assert!(SelectorList::parse("[=x]").is_err());
    assert!(SelectorList::parse("a:made-up-pseudo").is_err());
}

#[test]
fn test_invalid_selector_error_names_source() {
    let err = SelectorList::parse("##save").unwrap_err();
    match err {
        DomError::InvalidSelector { selector, .. } => assert_eq!(selector, "##save"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_pseudo_classes_and_case_flags() {
    let mut doc = DomSnapshot::new();
    let body = doc.push(None, DomNode::element("body"));
    let visible = doc.push(Some(body), DomNode::element("a").attr("href", "/docs"));
    let hidden = doc.push(
        Some(body),
        DomNode::element("a")
            .attr("href", "/skip")
            .attr("aria-hidden", "true"),
    );
    let submit = doc.push(Some(body), DomNode::element("input").attr("type", "SUBMIT"));

    let links = SelectorList::parse("a[href]:not([aria-hidden])").unwrap();
    assert_eq!(links.matching(&doc), HashSet::from([visible]));
    assert!(!links.matches(doc.element(hidden).unwrap()));

    let either = SelectorList::parse(":is(a, input)[type=\"submit\" i]").unwrap();
    assert_eq!(either.matching(&doc), HashSet::from([submit]));

    let first = SelectorList::parse("body > :first-child").unwrap();
    assert!(first.matches(doc.element(visible).unwrap()));
}

#[test]
fn test_select_returns_document_order() {
    let (doc, link, inner, _) = fixture();
    let list = SelectorList::parse("[data-testid], a").unwrap();
    let ids: Vec<NodeId> = list.select(&doc).iter().map(|el| el.id()).collect();
    assert_eq!(ids, vec![link, inner]);
}

#[test]
fn test_mirror_escapes_attribute_values() {
    let mut doc = DomSnapshot::new();
    let body = doc.push(None, DomNode::element("body"));
    let tricky = doc.push(
        Some(body),
        DomNode::element("button").attr("title", "say \"hi\" & <leave>"),
    );
    doc.push(Some(body), DomNode::element("button"));

    let list = SelectorList::parse("button[title='say \"hi\" & <leave>']").unwrap();
    assert_eq!(list.matching(&doc), HashSet::from([tricky]));
}

#[test]
fn test_within_checks_ancestors() {
    let (doc, link, inner, _) = fixture();
    let excluded = SelectorList::parse("[data-elementhook-ui]").unwrap().matching(&doc);
    assert!(within(&excluded, doc.element(inner).unwrap()));
    assert!(!within(&excluded, doc.element(link).unwrap()));
}

#[test]
fn test_type_and_attribute_match() {
    let (doc, link, inner, _) = fixture();
    let link = doc.element(link).unwrap();
    let inner = doc.element(inner).unwrap();

    let sel = SelectorList::parse("a[href]").unwrap();
    assert!(sel.matches(link));
    assert!(!sel.matches(inner));

    let sel = SelectorList::parse("[role=\"button\"]").unwrap();
    assert!(sel.matches(inner));
    assert!(!sel.matches(link));
}

#[test]
fn test_attribute_operators() {
    let (doc, link, _, nav) = fixture();
    let link = doc.element(link).unwrap();
    let nav = doc.element(nav).unwrap();

    assert!(SelectorList::parse("[href^='/settings']").unwrap().matches(link));
    assert!(SelectorList::parse("[href$=webhooks]").unwrap().matches(link));
    assert!(SelectorList::parse("[href*=\"ings/web\"]").unwrap().matches(link));
    assert!(!SelectorList::parse("[href^=\"/admin\"]").unwrap().matches(link));
    assert!(SelectorList::parse("[class~=primary]").unwrap().matches(nav));
    assert!(!SelectorList::parse("[class~=prim]").unwrap().matches(nav));
}

#[test]
fn test_id_and_class_match() {
    let (doc, link, _, nav) = fixture();
    assert!(
        SelectorList::parse("#settings-link")
            .unwrap()
            .matches(doc.element(link).unwrap())
    );
    assert!(
        SelectorList::parse("nav.primary.top-nav")
            .unwrap()
            .matches(doc.element(nav).unwrap())
    );
    assert!(
        !SelectorList::parse("nav.secondary")
            .unwrap()
            .matches(doc.element(nav).unwrap())
    );
}

#[test]
fn test_combinators() {
    let (doc, link, inner, _) = fixture();
    let link = doc.element(link).unwrap();
    let inner = doc.element(inner).unwrap();

    assert!(SelectorList::parse("body a").unwrap().matches(link));
    assert!(SelectorList::parse("nav > a").unwrap().matches(link));
    assert!(!SelectorList::parse("body > a").unwrap().matches(link));
    assert!(SelectorList::parse("body > nav > a").unwrap().matches(link));
    assert!(
        SelectorList::parse("[data-elementhook-ui] button")
            .unwrap()
            .matches(inner)
    );
}

#[test]
fn test_matches_self_or_ancestor() {
    let (doc, link, inner, _) = fixture();
    let ui = SelectorList::parse("[data-elementhook-ui]").unwrap();
    assert!(ui.matches_self_or_ancestor(doc.element(inner).unwrap()));
    assert!(!ui.matches_self_or_ancestor(doc.element(link).unwrap()));
}

#[test]
fn test_parse_all_merges_lists() {
    let (doc, link, inner, _) = fixture();
    let list = SelectorList::parse_all(&["a[href]", "[data-testid]"]).unwrap();
    assert!(list.matches(doc.element(link).unwrap()));
    assert!(list.matches(doc.element(inner).unwrap()));
    assert_eq!(list.to_string(), "a[href], [data-testid]");
}

#[test]
fn test_empty_list_never_matches() {
    let (doc, link, _, _) = fixture();
    let list = SelectorList::empty();
    assert!(list.is_empty());
    assert!(!list.matches(doc.element(link).unwrap()));
}

#[test]
fn test_from_str() {
    let list: SelectorList = "button, a[href]".parse().unwrap();
    assert!(!list.is_empty());
}
