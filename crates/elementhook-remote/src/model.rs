//! Webhook assignment records and query types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observed health of a webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Derive health from execution counters.
    ///
    /// No executions is `Unknown`; above 50% failures is `Critical`, above 10%
    /// is `Warning`.
    pub fn from_counts(total: u64, failed: u64) -> Self {
        if total == 0 {
            return Self::Unknown;
        }
        let failure_rate = failed as f64 / total as f64;
        if failure_rate > 0.5 {
            Self::Critical
        } else if failure_rate > 0.1 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method used when the webhook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

/// (organization, feature, page, element): at most one active binding each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionalKey {
    pub organization_id: String,
    pub feature_slug: String,
    pub page_path: String,
    pub element_id: String,
}

/// A persisted binding between a page element and a webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAssignment {
    pub id: String,
    pub organization_id: String,
    pub feature_slug: String,
    pub page_path: String,
    pub element_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub endpoint_url: String,
    #[serde(default)]
    pub http_method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_template: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub health_status: HealthStatus,
    #[serde(default)]
    pub total_executions: u64,
    #[serde(default)]
    pub successful_executions: u64,
    #[serde(default)]
    pub failed_executions: u64,
    /// Milliseconds.
    #[serde(default)]
    pub average_response_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookAssignment {
    /// Materialize a new record with zeroed runtime counters.
    pub fn from_new(id: impl Into<String>, input: NewAssignment, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            organization_id: input.organization_id,
            feature_slug: input.feature_slug,
            page_path: input.page_path,
            element_id: input.element_id,
            name: input.name,
            description: input.description,
            endpoint_url: input.endpoint_url,
            http_method: input.http_method,
            payload_template: input.payload_template,
            headers: input.headers,
            timeout_seconds: input.timeout_seconds,
            retry_count: input.retry_count,
            rate_limit_per_minute: input.rate_limit_per_minute,
            is_active: input.is_active,
            health_status: HealthStatus::Unknown,
            total_executions: 0,
            successful_executions: 0,
            failed_executions: 0,
            average_response_time: 0.0,
            last_triggered_at: None,
            updated_by: input.created_by.clone(),
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn functional_key(&self) -> FunctionalKey {
        FunctionalKey {
            organization_id: self.organization_id.clone(),
            feature_slug: self.feature_slug.clone(),
            page_path: self.page_path.clone(),
            element_id: self.element_id.clone(),
        }
    }
}

fn default_timeout_seconds() -> u32 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_rate_limit() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

/// Fields for creating an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub organization_id: String,
    pub feature_slug: String,
    pub page_path: String,
    pub element_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub endpoint_url: String,
    #[serde(default)]
    pub http_method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_template: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl NewAssignment {
    /// Minimal active assignment posting to `endpoint_url`.
    pub fn new(key: FunctionalKey, name: impl Into<String>, endpoint_url: impl Into<String>) -> Self {
        Self {
            organization_id: key.organization_id,
            feature_slug: key.feature_slug,
            page_path: key.page_path,
            element_id: key.element_id,
            name: name.into(),
            description: None,
            endpoint_url: endpoint_url.into(),
            http_method: HttpMethod::default(),
            payload_template: None,
            headers: BTreeMap::new(),
            timeout_seconds: default_timeout_seconds(),
            retry_count: default_retry_count(),
            rate_limit_per_minute: default_rate_limit(),
            is_active: true,
            created_by: None,
        }
    }

    pub fn functional_key(&self) -> FunctionalKey {
        FunctionalKey {
            organization_id: self.organization_id.clone(),
            feature_slug: self.feature_slug.clone(),
            page_path: self.page_path.clone(),
            element_id: self.element_id.clone(),
        }
    }
}

/// Partial update. Absent fields are left unchanged by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_template: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl AssignmentPatch {
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply onto a record, as the server would before recomputing derived
    /// fields.
    pub fn apply_to(&self, record: &mut WebhookAssignment) {
        if let Some(v) = &self.name {
            record.name = v.clone();
        }
        if let Some(v) = &self.description {
            record.description = Some(v.clone());
        }
        if let Some(v) = &self.endpoint_url {
            record.endpoint_url = v.clone();
        }
        if let Some(v) = self.http_method {
            record.http_method = v;
        }
        if let Some(v) = &self.payload_template {
            record.payload_template = Some(v.clone());
        }
        if let Some(v) = &self.headers {
            record.headers = v.clone();
        }
        if let Some(v) = self.timeout_seconds {
            record.timeout_seconds = v;
        }
        if let Some(v) = self.retry_count {
            record.retry_count = v;
        }
        if let Some(v) = self.rate_limit_per_minute {
            record.rate_limit_per_minute = v;
        }
        if let Some(v) = self.is_active {
            record.is_active = v;
        }
        if let Some(v) = &self.updated_by {
            record.updated_by = Some(v.clone());
        }
    }
}

/// Search filters; `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<HealthStatus>,
    /// Case-insensitive match on name, description, endpoint and element id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl AssignmentFilters {
    pub fn for_organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &WebhookAssignment) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().is_none_or(|f| f == value)
        }

        eq(&self.organization_id, &record.organization_id)
            && eq(&self.feature_slug, &record.feature_slug)
            && eq(&self.page_path, &record.page_path)
            && eq(&self.element_id, &record.element_id)
            && self.is_active.is_none_or(|a| a == record.is_active)
            && self.health_status.is_none_or(|h| h == record.health_status)
            && self.matches_search(record)
    }

    fn matches_search(&self, record: &WebhookAssignment) -> bool {
        let Some(query) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let query = query.to_lowercase();
        [
            Some(record.name.as_str()),
            record.description.as_deref(),
            Some(record.endpoint_url.as_str()),
            Some(record.element_id.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&query))
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size as usize
    }

    pub fn limit(&self) -> usize {
        self.page_size.max(1) as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub current_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, pagination: Pagination) -> Self {
        let page_size = u64::from(pagination.page_size.max(1));
        let total_pages = total_count.div_ceil(page_size) as u32;
        let current_page = pagination.page.max(1);
        Self {
            items,
            total_count,
            has_next_page: current_page < total_pages,
            has_previous_page: current_page > 1,
            current_page,
            total_pages,
        }
    }

    pub fn empty(pagination: Pagination) -> Self {
        Self::new(Vec::new(), 0, pagination)
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
