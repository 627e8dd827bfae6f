//! Bulk selection items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use elementhook_remote::{HealthStatus, WebhookAssignment};

/// Milliseconds of average response time per point of response score.
const RESPONSE_SCORE_DIVISOR: f64 = 50.0;

/// An assignment as shown in the bulk operations list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperationItem {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub feature_slug: String,
    pub page_path: String,
    pub element_id: String,
    pub endpoint_url: String,
    pub is_active: bool,
    pub health_status: HealthStatus,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub average_response_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl BulkOperationItem {
    /// Percentage of successful executions; 0 when never executed.
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.successful_executions as f64 / self.total_executions as f64 * 100.0
    }

    /// 0-100: 70% success rate, 30% response score.
    pub fn performance_score(&self) -> f64 {
        let response_score =
            (100.0 - self.average_response_time / RESPONSE_SCORE_DIVISOR).max(0.0);
        (0.7 * self.success_rate() + 0.3 * response_score).clamp(0.0, 100.0)
    }
}

impl From<&WebhookAssignment> for BulkOperationItem {
    fn from(record: &WebhookAssignment) -> Self {
        Self {
            id: record.id.clone(),
            organization_id: record.organization_id.clone(),
            name: record.name.clone(),
            feature_slug: record.feature_slug.clone(),
            page_path: record.page_path.clone(),
            element_id: record.element_id.clone(),
            endpoint_url: record.endpoint_url.clone(),
            is_active: record.is_active,
            health_status: record.health_status,
            total_executions: record.total_executions,
            successful_executions: record.successful_executions,
            failed_executions: record.failed_executions,
            average_response_time: record.average_response_time,
            last_triggered_at: record.last_triggered_at,
        }
    }
}

/// Narrow the selectable list; `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl SelectionFilter {
    pub fn matches(&self, item: &BulkOperationItem) -> bool {
        self.health_status.is_none_or(|h| h == item.health_status)
            && self.is_active.is_none_or(|a| a == item.is_active)
            && self
                .feature_slug
                .as_deref()
                .is_none_or(|f| f == item.feature_slug)
            && self.matches_search(item)
    }

    fn matches_search(&self, item: &BulkOperationItem) -> bool {
        let Some(query) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let query = query.to_lowercase();
        [&item.name, &item.element_id, &item.endpoint_url, &item.feature_slug]
            .iter()
            .any(|field| field.to_lowercase().contains(&query))
    }

    pub fn apply(&self, items: &[BulkOperationItem]) -> Vec<BulkOperationItem> {
        items.iter().filter(|i| self.matches(i)).cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    SuccessRate,
    PerformanceScore,
    Executions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Stable sort; ties keep their current order.
pub fn sort_items(items: &mut [BulkOperationItem], key: SortKey, direction: SortDirection) {
    items.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::SuccessRate => a.success_rate().total_cmp(&b.success_rate()),
            SortKey::PerformanceScore => a.performance_score().total_cmp(&b.performance_score()),
            SortKey::Executions => a.total_executions.cmp(&b.total_executions),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

pub fn sorted(
    mut items: Vec<BulkOperationItem>,
    key: SortKey,
    direction: SortDirection,
) -> Vec<BulkOperationItem> {
    sort_items(&mut items, key, direction);
    items
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
