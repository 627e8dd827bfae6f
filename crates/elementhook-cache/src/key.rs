//! Query keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered key segments: entity kind first, then qualifiers.
///
/// Invalidation works on prefixes: `["element_webhooks", "list"]` covers every
/// list page regardless of filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(root: impl Into<String>) -> Self {
        Self(vec![root.into()])
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// A child key with one more segment.
    pub fn with(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        let root = QueryKey::new("element_webhooks");
        let lists = root.with("list");
        let page = lists.with("{\"organization_id\":\"org-1\"}").with("1");
        let detail = root.with("detail").with("wh-1");

        assert!(page.starts_with(&lists));
        assert!(page.starts_with(&root));
        assert!(!detail.starts_with(&lists));
        assert!(page.starts_with(&page));
        assert!(!lists.starts_with(&page));
    }

    #[test]
    fn test_segment_boundaries() {
        let a = QueryKey::from_segments(["webhooks", "list"]);
        let b = QueryKey::from_segments(["webhooks", "lists"]);
        assert!(!b.starts_with(&a));
    }

    #[test]
    fn test_display_and_serde() {
        let key = QueryKey::from_segments(["element_webhooks", "detail", "wh-1"]);
        assert_eq!(key.to_string(), "element_webhooks:detail:wh-1");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"["element_webhooks","detail","wh-1"]"#);
        let back: QueryKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
