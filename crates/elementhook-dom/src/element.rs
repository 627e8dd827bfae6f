//! Detected element types and scan results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dom_types::BoundingBox;

/// Closed classification of interactive elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Button,
    Link,
    Form,
    Input,
    Checkbox,
    Radio,
    Select,
    Textarea,
    FileUpload,
    Custom,
    Unknown,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Link => "link",
            Self::Form => "form",
            Self::Input => "input",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Select => "select",
            Self::Textarea => "textarea",
            Self::FileUpload => "file-upload",
            Self::Custom => "custom",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook binding status of a detected element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// No assignment bound to the element.
    #[default]
    None,
    Healthy,
    Warning,
    Critical,
    /// Bound, but health has not been determined.
    Unknown,
}

impl WebhookStatus {
    pub fn has_webhook(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Structured metadata extracted from an element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Normalized text, at most 100 characters.
    #[serde(default)]
    pub text_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    /// `type` attribute, for inputs and buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Feature inferred from the page route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_slug: Option<String>,
    /// `data-*` and `aria-*` attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_attributes: BTreeMap<String, String>,
}

/// A classified element, stable across scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedElement {
    pub id: String,
    pub element_type: ElementType,
    pub dom_path: String,
    pub content_hash: String,
    pub bounding_rect: BoundingBox,
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    pub webhook_status: WebhookStatus,
    pub metadata: ElementMetadata,
}

/// Outcome of one scan pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub timestamp: DateTime<Utc>,
    pub elements_found: usize,
    pub elements_with_webhooks: usize,
    pub scan_duration_ms: u64,
    pub elements: Vec<DetectedElement>,
}

impl ScanResult {
    /// Build a result, deriving the counts from `elements`.
    pub fn new(
        timestamp: DateTime<Utc>,
        scan_duration_ms: u64,
        elements: Vec<DetectedElement>,
    ) -> Self {
        let elements_with_webhooks = elements
            .iter()
            .filter(|e| e.webhook_status.has_webhook())
            .count();
        Self {
            timestamp,
            elements_found: elements.len(),
            elements_with_webhooks,
            scan_duration_ms,
            elements,
        }
    }

    /// Find an element by id.
    pub fn element(&self, id: &str) -> Option<&DetectedElement> {
        self.elements.iter().find(|e| e.id == id)
    }
}
