//! Webhook assignment store.
//!
//! Reads go through the query cache; writes go to the remote and then
//! replace the cached detail with the record the server returned. Every write
//! invalidates the list queries.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use elementhook_cache::{CacheTier, QueryCache};
use elementhook_remote::{
    AssignmentFilters, AssignmentPatch, NewAssignment, PaginatedResult, Pagination, RemoteBackend,
    RemoteError, WebhookAssignment,
};

use crate::error::StoreError;
use crate::keys;

/// A list page read from the cache without fetching.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub page: PaginatedResult<WebhookAssignment>,
    /// The page belongs to another pagination of the same filters and is
    /// shown while the requested page loads.
    pub is_placeholder: bool,
}

/// Cached access to webhook assignments.
#[derive(Clone)]
pub struct WebhookAssignmentStore {
    backend: Arc<dyn RemoteBackend>,
    cache: QueryCache,
}

impl WebhookAssignmentStore {
    pub fn new(backend: Arc<dyn RemoteBackend>, cache: QueryCache) -> Self {
        Self { backend, cache }
    }

    pub fn backend(&self) -> &Arc<dyn RemoteBackend> {
        &self.backend
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// One assignment; `None` if it does not exist. An empty id never
    /// reaches the remote.
    pub async fn get(&self, id: &str) -> Result<Option<WebhookAssignment>, StoreError> {
        if id.trim().is_empty() {
            return Ok(None);
        }

        let backend = Arc::clone(&self.backend);
        let owned = id.to_string();
        let record = self
            .cache
            .fetch(&keys::detail(id), CacheTier::Dynamic, move || {
                let backend = Arc::clone(&backend);
                let id = owned.clone();
                async move {
                    match backend.fetch_assignment(&id).await {
                        Err(RemoteError::NotFound(_)) => Ok(None),
                        other => other,
                    }
                }
            })
            .await?;
        Ok(record)
    }

    pub async fn search(
        &self,
        filters: &AssignmentFilters,
        pagination: Pagination,
    ) -> Result<PaginatedResult<WebhookAssignment>, StoreError> {
        let backend = Arc::clone(&self.backend);
        let query = filters.clone();
        let page = self
            .cache
            .fetch(
                &keys::search_page(filters, pagination),
                CacheTier::Dynamic,
                move || {
                    let backend = Arc::clone(&backend);
                    let query = query.clone();
                    async move { backend.search_assignments(&query, pagination).await }
                },
            )
            .await?;
        Ok(page)
    }

    /// The cached page for this query, else the latest page cached for the
    /// same filters flagged as placeholder.
    pub fn search_snapshot(
        &self,
        filters: &AssignmentFilters,
        pagination: Pagination,
    ) -> Option<ListSnapshot> {
        if let Some(page) = self.cache.get(&keys::search_page(filters, pagination)) {
            return Some(ListSnapshot {
                page,
                is_placeholder: false,
            });
        }

        let (_, value) = self.cache.latest_under(&keys::search_prefix(filters))?;
        serde_json::from_value(value).ok().map(|page| ListSnapshot {
            page,
            is_placeholder: true,
        })
    }

    /// Create an assignment. A second active binding for the same element
    /// is rejected.
    pub async fn create(&self, input: NewAssignment) -> Result<WebhookAssignment, StoreError> {
        validate_new(&input)?;

        if input.is_active {
            let key = input.functional_key();
            if let Some(existing) = self.backend.find_active_binding(&key).await? {
                return Err(StoreError::Validation(format!(
                    "element {} on {} already has an active webhook ({})",
                    key.element_id, key.page_path, existing.name
                )));
            }
        }

        let record = self.backend.insert_assignment(&input).await?;
        self.cache.set(&keys::detail(&record.id), &record)?;
        self.invalidate_lists();

        info!(id = %record.id, element_id = %record.element_id, "Created webhook assignment");
        Ok(record)
    }

    /// Update an assignment. The cached detail becomes the server's record.
    pub async fn update(
        &self,
        id: &str,
        patch: &AssignmentPatch,
    ) -> Result<WebhookAssignment, StoreError> {
        let record = self.backend.update_assignment(id, patch).await?;
        self.cache.set(&keys::detail(id), &record)?;
        self.invalidate_lists();

        debug!(id, "Updated webhook assignment");
        Ok(record)
    }

    /// Enable or disable with an optimistic cache update.
    pub async fn set_active(&self, id: &str, active: bool) -> Result<WebhookAssignment, StoreError> {
        let record = self.write_active(id, active).await?;
        self.invalidate_lists();
        Ok(record)
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.delete_remote(id).await?;
        self.invalidate_lists();
        Ok(())
    }

    /// Mark every list query stale.
    pub fn invalidate_lists(&self) -> usize {
        self.cache.invalidate(&keys::lists())
    }

    /// Refetch one assignment from the remote.
    pub async fn refresh(&self, id: &str) -> Result<Option<WebhookAssignment>, StoreError> {
        self.cache.invalidate(&keys::detail(id));
        self.get(id).await
    }

    /// `set_active` without list invalidation.
    pub(crate) async fn write_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<WebhookAssignment, StoreError> {
        let key = keys::detail(id);
        let previous: Option<Value> = self.cache.get_value(&key);

        let cached: Option<WebhookAssignment> = self.cache.get::<Option<_>>(&key).flatten();
        if let Some(mut optimistic) = cached {
            optimistic.is_active = active;
            self.cache.set(&key, &optimistic)?;
        }

        match self
            .backend
            .update_assignment(id, &AssignmentPatch::active(active))
            .await
        {
            Ok(record) => {
                self.cache.set(&key, &record)?;
                Ok(record)
            }
            Err(e) => {
                warn!(id, error = %e, "Toggle failed, rolling back");
                if let Some(previous) = previous {
                    self.cache.set(&key, &previous)?;
                }
                Err(e.into())
            }
        }
    }

    /// `delete` without list invalidation.
    pub(crate) async fn delete_remote(&self, id: &str) -> Result<(), StoreError> {
        self.backend.delete_assignment(id).await?;
        self.cache.remove(&keys::detail(id));
        info!(id, "Deleted webhook assignment");
        Ok(())
    }
}

fn validate_new(input: &NewAssignment) -> Result<(), StoreError> {
    for (field, value) in [
        ("organization_id", &input.organization_id),
        ("element_id", &input.element_id),
        ("name", &input.name),
        ("endpoint_url", &input.endpoint_url),
    ] {
        if value.trim().is_empty() {
            return Err(StoreError::Validation(format!("{} is required", field)));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
