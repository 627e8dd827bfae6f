//! Element classifier.
//!
//! Pure functions that turn a snapshot element into a typed descriptor with a
//! stable identifier. Identifier precedence is a contract: authored `id`
//! attributes first, then `data-testid`, then a hash of the DOM path, element
//! type and normalized text. Hash-based identifiers change when surrounding
//! markup reorders siblings or the text changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::{ElementMetadata, ElementType};
use crate::error::DomError;
use crate::hash::hash_base36;
use crate::snapshot::ElementRef;

/// Maximum length of the text excerpt in metadata.
pub const TEXT_EXCERPT_LIMIT: usize = 100;

/// Tags that terminate the DOM path walk without being emitted.
const ROOT_CONTAINERS: &[&str] = &["html", "body"];

/// Route prefixes skipped when inferring the feature slug.
const ROUTE_PREFIXES: &[&str] = &["app", "dashboard", "admin", "features"];

/// Prefixes used by CSS-in-JS libraries for generated class names.
const GENERATED_CLASS_PREFIXES: &[&str] = &["css-", "sc-", "jsx-", "emotion-", "svelte-"];

/// Everything the classifier derives from an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: String,
    pub element_type: ElementType,
    pub dom_path: String,
    pub content_hash: String,
    pub metadata: ElementMetadata,
}

/// Classification seam used by the scanner.
pub trait Classify: Send + Sync {
    /// Describe an element found on `page_path`.
    fn describe(&self, el: ElementRef<'_>, page_path: &str) -> Result<ElementDescriptor, DomError>;
}

/// Default heuristic classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementClassifier;

impl ElementClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Classify for ElementClassifier {
    fn describe(&self, el: ElementRef<'_>, page_path: &str) -> Result<ElementDescriptor, DomError> {
        let element_type = classify(el);
        let dom_path = try_dom_path(el)?;
        let id = id_for(el, element_type, &dom_path);
        Ok(ElementDescriptor {
            id,
            element_type,
            content_hash: content_hash(el),
            metadata: extract_metadata(el, page_path),
            dom_path,
        })
    }
}

/// Classify an element. First match wins.
pub fn classify(el: ElementRef<'_>) -> ElementType {
    match el.tag() {
        "button" => return ElementType::Button,
        "a" if el.has_attr("href") => return ElementType::Link,
        "form" => return ElementType::Form,
        "input" => return input_type(el.attr("type")),
        "select" => return ElementType::Select,
        "textarea" => return ElementType::Textarea,
        _ => {}
    }

    if el.attr("role") == Some("button") || el.has_attr("onclick") || has_button_class(el) {
        return ElementType::Button;
    }

    if el.has_attr("data-testid") || el.has_attr("data-element-id") {
        return ElementType::Custom;
    }

    ElementType::Unknown
}

/// Map an `<input type>` to an element type.
fn input_type(ty: Option<&str>) -> ElementType {
    let ty = ty.map(|t| t.trim().to_ascii_lowercase());
    match ty.as_deref() {
        None | Some("") => ElementType::Input,
        Some(
            "text" | "email" | "password" | "search" | "tel" | "url" | "number" | "date"
            | "datetime-local" | "month" | "week" | "time" | "color" | "range",
        ) => ElementType::Input,
        Some("checkbox") => ElementType::Checkbox,
        Some("radio") => ElementType::Radio,
        Some("file") => ElementType::FileUpload,
        Some("submit" | "button" | "reset" | "image") => ElementType::Button,
        // Unknown types render as text inputs in browsers.
        Some(_) => ElementType::Input,
    }
}

fn has_button_class(el: ElementRef<'_>) -> bool {
    el.classes().any(|c| {
        let c = c.to_ascii_lowercase();
        c == "btn"
            || c == "button"
            || c.starts_with("btn-")
            || c.ends_with("-btn")
            || c.ends_with("-button")
    })
}

/// Extract structured metadata.
pub fn extract_metadata(el: ElementRef<'_>, page_path: &str) -> ElementMetadata {
    let owned = |name: &str| el.attr(name).map(str::to_string);

    let custom_attributes: BTreeMap<String, String> = el
        .attributes()
        .iter()
        .filter(|(k, _)| k.starts_with("data-") || k.starts_with("aria-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    ElementMetadata {
        tag_name: el.tag().to_string(),
        class_name: owned("class").filter(|c| !c.trim().is_empty()),
        text_content: el.normalized_text().chars().take(TEXT_EXCERPT_LIMIT).collect(),
        href: owned("href"),
        role: owned("role"),
        aria_label: owned("aria-label"),
        input_type: owned("type"),
        name: owned("name"),
        placeholder: owned("placeholder"),
        feature_slug: infer_feature_slug(page_path),
        custom_attributes,
    }
}

/// Stable identifier for an element of the given type.
pub fn make_id(el: ElementRef<'_>, element_type: ElementType) -> String {
    id_for(el, element_type, &dom_path(el))
}

fn id_for(el: ElementRef<'_>, element_type: ElementType, dom_path: &str) -> String {
    if let Some(id) = el.attr("id").filter(|v| !v.trim().is_empty()) {
        return format!("id_{}", id);
    }
    if let Some(testid) = el.attr("data-testid").filter(|v| !v.trim().is_empty()) {
        return format!("testid_{}", testid);
    }
    let key = format!("{}|{}|{}", dom_path, element_type, el.normalized_text());
    format!("hash_{}", hash_base36(&key))
}

/// CSS-like path from the root container down to the element.
///
/// Dangling parent references end the walk early.
pub fn dom_path(el: ElementRef<'_>) -> String {
    build_path(el, |e| Ok(e.parent())).unwrap_or_default()
}

/// Like [`dom_path`] but fails on dangling parent references.
pub fn try_dom_path(el: ElementRef<'_>) -> Result<String, DomError> {
    build_path(el, |e| e.try_parent())
}

fn build_path<'a, F>(el: ElementRef<'a>, parent_of: F) -> Result<String, DomError>
where
    F: Fn(ElementRef<'a>) -> Result<Option<ElementRef<'a>>, DomError>,
{
    let limit = el.document().len();
    let mut segments = Vec::new();
    let mut current = Some(el);

    while let Some(node) = current {
        if ROOT_CONTAINERS.contains(&node.tag()) || segments.len() > limit {
            break;
        }
        if let Some(id) = node.attr("id").filter(|v| !v.trim().is_empty()) {
            segments.push(format!("{}#{}", node.tag(), id));
            break;
        }
        segments.push(path_segment(node));
        current = parent_of(node)?;
    }

    segments.reverse();
    Ok(segments.join(" > "))
}

fn path_segment(el: ElementRef<'_>) -> String {
    let mut segment = el.tag().to_string();
    for class in el.classes().filter(|c| !is_generated_class(c)).take(2) {
        segment.push('.');
        segment.push_str(class);
    }

    let siblings = el.siblings_with_self();
    let same_tag = siblings.iter().filter(|s| s.tag() == el.tag()).count();
    if same_tag > 1 {
        if let Some(pos) = siblings.iter().position(|s| s.id() == el.id()) {
            segment.push_str(&format!(":nth-child({})", pos + 1));
        }
    }
    segment
}

/// Whether a class token looks machine-generated.
pub fn is_generated_class(token: &str) -> bool {
    if token.contains("__") {
        return true;
    }
    if GENERATED_CLASS_PREFIXES.iter().any(|p| token.starts_with(p)) {
        return true;
    }
    token.split('-').skip(1).any(|part| {
        part.chars().count() >= 5
            && part.chars().all(|c| c.is_ascii_alphanumeric())
            && part.chars().any(|c| c.is_ascii_digit())
            && part.chars().any(|c| c.is_ascii_alphabetic())
    })
}

/// Hash over tag, text, href, type and class.
pub fn content_hash(el: ElementRef<'_>) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        el.tag(),
        el.normalized_text(),
        el.attr("href").unwrap_or_default(),
        el.attr("type").unwrap_or_default(),
        el.attr("class").unwrap_or_default(),
    );
    hash_base36(&key)
}

/// Infer the feature slug from a page route.
///
/// `/app/webhook-settings/edit` → `webhook-settings`; `/org/42/Billing` →
/// `billing`. The root route has no feature.
pub fn infer_feature_slug(page_path: &str) -> Option<String> {
    let path = page_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();

    while let Some(segment) = segments.peek() {
        let lower = segment.to_ascii_lowercase();
        if ROUTE_PREFIXES.contains(&lower.as_str()) {
            segments.next();
        } else if lower == "org" {
            segments.next();
            segments.next();
        } else {
            break;
        }
    }

    segments.next().map(kebab_case).filter(|s| !s.is_empty())
}

fn kebab_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_lower = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('-');
            }
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c.to_ascii_lowercase());
        } else {
            if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
            prev_lower = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
