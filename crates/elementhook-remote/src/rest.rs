//! REST backend for the hosted data platform.
//!
//! Talks to the platform's PostgREST-style endpoints:
//!
//! ```text
//! GET    {base}/rest/v1/{table}?organization_id=eq.org-1&order=created_at.desc
//! POST   {base}/rest/v1/{table}             (Prefer: return=representation)
//! PATCH  {base}/rest/v1/{table}?id=eq.{id}
//! DELETE {base}/rest/v1/{table}?id=eq.{id}
//! POST   {base}/rest/v1/rpc/{function}
//! ```
//!
//! Realtime push is not part of the REST surface. The host forwards change
//! events into [`RestBackend::feed`] and subscribers receive them from there.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use elementhook_config::RemoteConfig;

use crate::backend::RemoteBackend;
use crate::change::{ChangeFeed, ChangeSubscription};
use crate::error::RemoteError;
use crate::model::{
    AssignmentFilters, AssignmentPatch, FunctionalKey, NewAssignment, PaginatedResult, Pagination,
    WebhookAssignment,
};

const REST_PREFIX: &str = "rest/v1";

/// [`RemoteBackend`] over HTTP.
pub struct RestBackend {
    client: reqwest::Client,
    base_url: Url,
    table: String,
    api_key: Option<String>,
    access_token: Option<String>,
    feed: ChangeFeed,
}

impl RestBackend {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| RemoteError::Validation(format!("base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Validation(format!(
                "base_url: {} cannot be a base",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url,
            table: config.assignments_table.clone(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            feed: ChangeFeed::default(),
        })
    }

    /// Feed that host-forwarded change events are published into.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Validation("base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(REST_PREFIX.split('/'))
            .extend(segments);
        Ok(url)
    }

    fn table_url(&self) -> Result<Url, RemoteError> {
        self.endpoint(&[&self.table])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key);
        }
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            warn!(status, message = %message, "Remote request failed");
            return Err(RemoteError::from_status(status, message));
        }

        Ok(response)
    }

    async fn rows(&self, builder: RequestBuilder) -> Result<Vec<WebhookAssignment>, RemoteError> {
        let response = self.send(builder).await?;
        decode(response).await
    }
}

/// Message from a PostgREST error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Total from a `Content-Range: 0-19/57` header.
fn content_range_total(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("content-range")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|total| total.parse().ok())
}

/// Characters with meaning inside a PostgREST `or=(...)` clause.
fn sanitize_search(query: &str) -> String {
    query
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"' | '\\'))
        .collect()
}

fn eq(url: &mut Url, column: &str, value: &str) {
    url.query_pairs_mut()
        .append_pair(column, &format!("eq.{}", value));
}

fn apply_filters(url: &mut Url, filters: &AssignmentFilters) {
    for (column, value) in [
        ("organization_id", &filters.organization_id),
        ("feature_slug", &filters.feature_slug),
        ("page_path", &filters.page_path),
        ("element_id", &filters.element_id),
    ] {
        if let Some(value) = value {
            eq(url, column, value);
        }
    }
    if let Some(active) = filters.is_active {
        eq(url, "is_active", &active.to_string());
    }
    if let Some(health) = filters.health_status {
        eq(url, "health_status", health.as_str());
    }

    let query = filters
        .search
        .as_deref()
        .map(sanitize_search)
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    if let Some(q) = query {
        let clause = ["name", "description", "endpoint_url", "element_id"]
            .iter()
            .map(|column| format!("{}.ilike.*{}*", column, q))
            .collect::<Vec<_>>()
            .join(",");
        url.query_pairs_mut()
            .append_pair("or", &format!("({})", clause));
    }
}

fn apply_key(url: &mut Url, key: &FunctionalKey) {
    eq(url, "organization_id", &key.organization_id);
    eq(url, "feature_slug", &key.feature_slug);
    eq(url, "page_path", &key.page_path);
    eq(url, "element_id", &key.element_id);
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn fetch_assignment(&self, id: &str) -> Result<Option<WebhookAssignment>, RemoteError> {
        let mut url = self.table_url()?;
        eq(&mut url, "id", id);
        url.query_pairs_mut().append_pair("limit", "1");

        let rows = self.rows(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn search_assignments(
        &self,
        filters: &AssignmentFilters,
        pagination: Pagination,
    ) -> Result<PaginatedResult<WebhookAssignment>, RemoteError> {
        let mut url = self.table_url()?;
        apply_filters(&mut url, filters);
        url.query_pairs_mut()
            .append_pair("order", "created_at.desc,id.asc")
            .append_pair("offset", &pagination.offset().to_string())
            .append_pair("limit", &pagination.limit().to_string());

        let response = self
            .send(
                self.request(Method::GET, url)
                    .header("Prefer", "count=exact"),
            )
            .await?;
        let total = content_range_total(&response);
        let items: Vec<WebhookAssignment> = decode(response).await?;
        let total = total.unwrap_or((pagination.offset() + items.len()) as u64);

        debug!(total, returned = items.len(), "Searched assignments");
        Ok(PaginatedResult::new(items, total, pagination))
    }

    async fn find_active_binding(
        &self,
        key: &FunctionalKey,
    ) -> Result<Option<WebhookAssignment>, RemoteError> {
        let mut url = self.table_url()?;
        apply_key(&mut url, key);
        eq(&mut url, "is_active", "true");
        url.query_pairs_mut().append_pair("limit", "1");

        let rows = self.rows(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_assignment(
        &self,
        input: &NewAssignment,
    ) -> Result<WebhookAssignment, RemoteError> {
        let url = self.table_url()?;
        let rows = self
            .rows(
                self.request(Method::POST, url)
                    .header("Prefer", "return=representation")
                    .json(input),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::Decode("insert returned no rows".to_string()))
    }

    async fn update_assignment(
        &self,
        id: &str,
        patch: &AssignmentPatch,
    ) -> Result<WebhookAssignment, RemoteError> {
        if patch.is_empty() {
            return self
                .fetch_assignment(id)
                .await?
                .ok_or_else(|| RemoteError::NotFound(format!("webhook {}", id)));
        }

        let mut url = self.table_url()?;
        eq(&mut url, "id", id);
        let rows = self
            .rows(
                self.request(Method::PATCH, url)
                    .header("Prefer", "return=representation")
                    .json(patch),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(format!("webhook {}", id)))
    }

    async fn delete_assignment(&self, id: &str) -> Result<(), RemoteError> {
        let mut url = self.table_url()?;
        eq(&mut url, "id", id);
        let rows = self
            .rows(
                self.request(Method::DELETE, url)
                    .header("Prefer", "return=representation"),
            )
            .await?;
        if rows.is_empty() {
            return Err(RemoteError::NotFound(format!("webhook {}", id)));
        }
        Ok(())
    }

    async fn call_rpc(&self, function: &str, params: Value) -> Result<Value, RemoteError> {
        let url = self.endpoint(&["rpc", function])?;
        let response = self
            .send(self.request(Method::POST, url).json(&params))
            .await?;

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn subscribe(&self, organization_id: &str, table: &str) -> ChangeSubscription {
        self.feed.subscribe(organization_id, table)
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
