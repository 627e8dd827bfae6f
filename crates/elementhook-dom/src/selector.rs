//! CSS selectors for candidate gathering and exclusions.
//!
//! Parsing and matching use [`scraper`], so the full selector grammar it
//! understands is available: combinators, attribute operators with case
//! flags, and structural pseudo-classes such as `:not(...)`, `:is(...)` and
//! `:nth-child(...)`.
//!
//! A snapshot is mirrored into a [`scraper::Html`] document for matching.
//! Each mirrored element carries its arena index in [`NODE_MARKER`], and
//! matches map back to [`NodeId`]s. Layout and style stay in the snapshot.
//! The mirror goes through an HTML tree builder, so markup the builder
//! restructures (content inside void elements, stray table parts) matches
//! the way a browser would have parsed it.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use scraper::{Html, Selector};

use crate::error::DomError;
use crate::snapshot::{DomSnapshot, ElementRef, NodeId};

/// Attribute carrying the arena index on mirrored elements.
pub const NODE_MARKER: &str = "data-elementhook-node";

/// A comma-separated selector list, possibly merged from several sources.
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Selector>,
}

impl SelectorList {
    /// Parse a selector list.
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DomError::selector(input, "empty selector"));
        }
        let selector =
            Selector::parse(trimmed).map_err(|e| DomError::selector(input, e.to_string()))?;
        Ok(Self {
            source: trimmed.to_string(),
            selectors: vec![selector],
        })
    }

    /// Parse and merge several selector lists into one.
    pub fn parse_all<S: AsRef<str>>(inputs: &[S]) -> Result<Self, DomError> {
        let mut selectors = Vec::new();
        let mut sources = Vec::new();
        for input in inputs {
            let list = Self::parse(input.as_ref())?;
            sources.push(list.source);
            selectors.extend(list.selectors);
        }
        Ok(Self {
            source: sources.join(", "),
            selectors,
        })
    }

    /// An empty list that never matches.
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            selectors: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Ids of every element in `doc` matched by any selector.
    pub fn matching(&self, doc: &DomSnapshot) -> HashSet<NodeId> {
        if self.selectors.is_empty() || doc.is_empty() {
            return HashSet::new();
        }
        let html = Html::parse_document(&mirror(doc));
        self.selectors
            .iter()
            .flat_map(|selector| html.select(selector))
            .filter_map(|el| el.value().attr(NODE_MARKER))
            .filter_map(|marker| marker.parse().ok())
            .map(NodeId)
            .collect()
    }

    /// Matched elements in document order.
    pub fn select<'a>(&self, doc: &'a DomSnapshot) -> Vec<ElementRef<'a>> {
        let matched = self.matching(doc);
        doc.descendants()
            .into_iter()
            .filter(|el| matched.contains(&el.id()))
            .collect()
    }

    /// Whether the element matches any selector in the list.
    ///
    /// Mirrors the whole document; use [`matching`](Self::matching) when
    /// testing many elements of one snapshot.
    pub fn matches(&self, el: ElementRef<'_>) -> bool {
        !self.is_empty() && self.matching(el.document()).contains(&el.id())
    }

    /// Whether the element or any ancestor matches.
    pub fn matches_self_or_ancestor(&self, el: ElementRef<'_>) -> bool {
        !self.is_empty() && within(&self.matching(el.document()), el)
    }
}

/// Whether `el` or one of its ancestors is in `matched`.
pub fn within(matched: &HashSet<NodeId>, el: ElementRef<'_>) -> bool {
    matched.contains(&el.id()) || el.ancestors().iter().any(|a| matched.contains(&a.id()))
}

impl FromStr for SelectorList {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Serialize the element tree as markup, without text.
fn mirror(doc: &DomSnapshot) -> String {
    let mut out = String::with_capacity(doc.len() * 48);
    let mut seen = vec![false; doc.len()];
    for root in &doc.roots {
        if let Some(el) = doc.element(*root) {
            write_element(el, &mut out, &mut seen);
        }
    }
    out
}

fn write_element(el: ElementRef<'_>, out: &mut String, seen: &mut [bool]) {
    // Host-supplied snapshots may contain cycles.
    if std::mem::replace(&mut seen[el.id().0], true) {
        return;
    }

    let tag = if is_valid_name(el.tag()) { el.tag() } else { "div" };
    out.push('<');
    out.push_str(tag);
    out.push(' ');
    out.push_str(NODE_MARKER);
    out.push_str("=\"");
    out.push_str(&el.id().0.to_string());
    out.push('"');
    for (name, value) in el.attributes() {
        if name == NODE_MARKER || !is_valid_name(name) {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');

    for child in el.children() {
        write_element(child, out, seen);
    }

    if !VOID_ELEMENTS.contains(&tag) {
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
