//! Webhook status of scanned elements.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use elementhook_cache::{CacheTier, QueryCache};
use elementhook_dom::{ElementDescriptor, WebhookStatus, WebhookStatusLookup};
use elementhook_remote::{FunctionalKey, HealthStatus, RemoteBackend, WebhookAssignment};

use crate::keys;

/// Resolves element status from the active binding on the current page.
pub struct AssignmentStatusLookup {
    backend: Arc<dyn RemoteBackend>,
    cache: QueryCache,
    organization_id: String,
    page_path: RwLock<String>,
}

impl AssignmentStatusLookup {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        cache: QueryCache,
        organization_id: impl Into<String>,
        page_path: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            cache,
            organization_id: organization_id.into(),
            page_path: RwLock::new(page_path.into()),
        }
    }

    /// Follow client-side navigation.
    pub fn set_page_path(&self, page_path: impl Into<String>) {
        *self.page_path.write() = page_path.into();
    }

    pub fn page_path(&self) -> String {
        self.page_path.read().clone()
    }

    fn functional_key(&self, element: &ElementDescriptor) -> FunctionalKey {
        FunctionalKey {
            organization_id: self.organization_id.clone(),
            feature_slug: element.metadata.feature_slug.clone().unwrap_or_default(),
            page_path: self.page_path(),
            element_id: element.id.clone(),
        }
    }
}

/// Element status for a binding.
pub fn status_of(binding: Option<&WebhookAssignment>) -> WebhookStatus {
    match binding {
        None => WebhookStatus::None,
        Some(record) if !record.is_active => WebhookStatus::None,
        Some(record) => match record.health_status {
            HealthStatus::Healthy => WebhookStatus::Healthy,
            HealthStatus::Warning => WebhookStatus::Warning,
            HealthStatus::Critical => WebhookStatus::Critical,
            HealthStatus::Unknown => WebhookStatus::Unknown,
        },
    }
}

#[async_trait]
impl WebhookStatusLookup for AssignmentStatusLookup {
    async fn status(&self, element: &ElementDescriptor) -> Result<WebhookStatus, String> {
        let key = self.functional_key(element);
        let backend = Arc::clone(&self.backend);
        let query = key.clone();
        let binding: Option<WebhookAssignment> = self
            .cache
            .fetch(&keys::binding(&key), CacheTier::Realtime, move || {
                let backend = Arc::clone(&backend);
                let query = query.clone();
                async move { backend.find_active_binding(&query).await }
            })
            .await
            .map_err(|e| e.to_string())?;
        Ok(status_of(binding.as_ref()))
    }
}
