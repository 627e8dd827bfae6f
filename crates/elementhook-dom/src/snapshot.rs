//! DOM snapshot: a flattened, read-only copy of the live document.
//!
//! The host (a DevTools bridge, a WASM shim, a headless renderer) captures the
//! document into a node arena together with layout boxes and the computed
//! styles that matter for visibility. Every algorithm in this crate reads the
//! snapshot through [`ElementRef`] and never mutates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom_types::{BoundingBox, ComputedStyle};
use crate::error::DomError;

/// Index of a node inside a [`DomSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A single element node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    /// Tag name (lowercase).
    pub tag: String,
    /// Attributes, ordered by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Direct text of this element (not including children).
    #[serde(default)]
    pub text: String,
    /// Parent node, `None` for roots.
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Child elements in document order.
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// Layout box.
    #[serde(default)]
    pub bounding_box: BoundingBox,
    /// Computed style subset.
    #[serde(default)]
    pub style: ComputedStyle,
}

impl DomNode {
    /// Create a detached element node.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            bounding_box: BoundingBox::default(),
            style: ComputedStyle::default(),
        }
    }

    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the direct text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the layout box.
    pub fn bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = BoundingBox::new(x, y, width, height);
        self
    }

    /// Set the computed style.
    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }
}

/// A captured document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomSnapshot {
    /// Page URL, if known.
    #[serde(default)]
    pub url: Option<String>,
    /// Route of the page (path portion of the URL).
    #[serde(default)]
    pub page_path: Option<String>,
    /// All nodes, indexed by [`NodeId`].
    #[serde(default)]
    pub nodes: Vec<DomNode>,
    /// Top-level nodes in document order.
    #[serde(default)]
    pub roots: Vec<NodeId>,
    /// Every box comes from a full layout pass, so a 0x0 box means the
    /// element is collapsed. Otherwise 0x0 means the host did not measure it.
    #[serde(default)]
    pub measured: bool,
}

impl DomSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty snapshot for a page route.
    pub fn for_page(page_path: impl Into<String>) -> Self {
        Self {
            page_path: Some(page_path.into()),
            ..Self::default()
        }
    }

    /// Mark every bounding box as measured.
    pub fn measured(mut self) -> Self {
        self.measured = true;
        self
    }

    /// Append a node under `parent` (or as a root) and return its id.
    pub fn push(&mut self, parent: Option<NodeId>, mut node: DomNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        node.children.clear();
        self.nodes.push(node);
        match parent.and_then(|p| self.nodes.get_mut(p.0)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Raw node access.
    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.0)
    }

    /// Mutable node access, for building fixtures.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DomNode> {
        self.nodes.get_mut(id.0)
    }

    /// Element handle for a node.
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.nodes.get(id.0).map(|_| ElementRef { doc: self, id })
    }

    /// All elements in document (pre-order) order.
    pub fn descendants(&self) -> Vec<ElementRef<'_>> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        let mut seen = vec![false; self.nodes.len()];

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            // Guard against cycles in host-supplied snapshots.
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            out.push(ElementRef { doc: self, id });
            stack.extend(node.children.iter().rev().copied());
        }

        out
    }
}

/// Borrowed handle to an element inside a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a DomSnapshot,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    fn node(&self) -> &'a DomNode {
        // ElementRef is only constructed for ids that exist.
        &self.doc.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a DomSnapshot {
        self.doc
    }

    pub fn tag(&self) -> &'a str {
        &self.node().tag
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.node().attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.node().attributes.contains_key(name)
    }

    pub fn attributes(&self) -> &'a BTreeMap<String, String> {
        &self.node().attributes
    }

    /// Class tokens in declaration order.
    pub fn classes(self) -> impl Iterator<Item = &'a str> {
        self.attr("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.node().bounding_box
    }

    pub fn style(&self) -> &'a ComputedStyle {
        &self.node().style
    }

    /// Parent element, failing on references outside the arena.
    pub fn try_parent(&self) -> Result<Option<ElementRef<'a>>, DomError> {
        match self.node().parent {
            None => Ok(None),
            Some(pid) => self
                .doc
                .element(pid)
                .map(Some)
                .ok_or(DomError::DanglingNode(pid.0)),
        }
    }

    /// Parent element; dangling references read as no parent.
    pub fn parent(&self) -> Option<ElementRef<'a>> {
        self.try_parent().ok().flatten()
    }

    /// Ancestors from the parent upwards.
    pub fn ancestors(&self) -> Vec<ElementRef<'a>> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(el) = current {
            if out.len() > self.doc.nodes.len() {
                break;
            }
            out.push(el);
            current = el.parent();
        }
        out
    }

    /// Child elements in document order.
    pub fn children(&self) -> Vec<ElementRef<'a>> {
        self.node()
            .children
            .iter()
            .filter_map(|c| self.doc.element(*c))
            .collect()
    }

    /// Sibling elements including self, in document order.
    pub fn siblings_with_self(&self) -> Vec<ElementRef<'a>> {
        match self.parent() {
            Some(parent) => parent.children(),
            None => self
                .doc
                .roots
                .iter()
                .filter_map(|r| self.doc.element(*r))
                .collect(),
        }
    }

    /// Concatenated text of this element and all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out, 0);
        out
    }

    fn collect_text(&self, out: &mut String, depth: usize) {
        if depth > self.doc.nodes.len() {
            return;
        }
        let node = self.node();
        if !node.text.is_empty() {
            if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                out.push(' ');
            }
            out.push_str(&node.text);
        }
        for child in self.children() {
            child.collect_text(out, depth + 1);
        }
    }

    /// Text content with whitespace runs collapsed and trimmed.
    pub fn normalized_text(&self) -> String {
        self.text_content()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether `other` is this element or one of its ancestors.
    pub fn is_within(&self, other: NodeId) -> bool {
        self.id == other || self.ancestors().iter().any(|a| a.id == other)
    }
}
