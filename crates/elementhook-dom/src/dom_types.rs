//! Shared DOM types: bounding box and computed style.

use serde::{Deserialize, Serialize};

/// Bounding box for an element, in CSS pixels relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if a point is inside this bounding box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Whether the element has no layout box at all.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 && self.height <= 0.0
    }

    /// Check if the box is at least `min_width` x `min_height`.
    pub fn meets_minimum(&self, min_width: f64, min_height: f64) -> bool {
        self.width >= min_width && self.height >= min_height
    }
}

/// Computed style properties relevant to visibility and stacking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComputedStyle {
    /// `display` value; `None` means the UA default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// `visibility` value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// `opacity` value (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Resolved `z-index`; `None` for `auto`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl ComputedStyle {
    /// `display: none`.
    pub fn is_display_none(&self) -> bool {
        self.display.as_deref() == Some("none")
    }

    /// `visibility: hidden` or `visibility: collapse`.
    pub fn is_visibility_hidden(&self) -> bool {
        matches!(self.visibility.as_deref(), Some("hidden") | Some("collapse"))
    }

    /// Fully transparent.
    pub fn is_transparent(&self) -> bool {
        self.opacity.is_some_and(|o| o <= 0.0)
    }
}
