//! Application wiring.
//!
//! [`ElementHook`] is built once per page session and owns every component.
//! Collaborators (document source, remote backend) are injected.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use elementhook_cache::{
    CachePersister, QueryCache, RealtimeInvalidator, RetryPolicy, spawn_refresh_loop,
};
use elementhook_config::{Config, ConfigValidator};
use elementhook_dom::{DocumentSource, ElementScanner, MutationWatcher};
use elementhook_remote::{RemoteBackend, RestBackend};
use elementhook_webhooks::{
    AssignmentStatusLookup, BulkOperationEngine, WebhookAssignmentStore, keys,
};

/// Page used for status lookups until the host navigates.
const DEFAULT_PAGE_PATH: &str = "/";

pub struct ElementHook {
    config: Config,
    organization_id: String,
    backend: Arc<dyn RemoteBackend>,
    cache: QueryCache,
    persister: Option<CachePersister>,
    store: WebhookAssignmentStore,
    lookup: Arc<AssignmentStatusLookup>,
    scanner: ElementScanner,
    watcher: MutationWatcher,
    bulk: BulkOperationEngine,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ElementHook {
    /// Connect to the configured REST platform.
    pub async fn connect(
        config: Config,
        document: Arc<dyn DocumentSource>,
        organization_id: impl Into<String>,
    ) -> Result<Self> {
        let backend = RestBackend::new(&config.remote)
            .with_context(|| format!("Invalid remote base URL: {}", config.remote.base_url))?;
        Self::with_backend(config, Arc::new(backend), document, organization_id).await
    }

    /// Wire every component around `backend` and start the background
    /// invalidation and refresh tasks.
    pub async fn with_backend(
        config: Config,
        backend: Arc<dyn RemoteBackend>,
        document: Arc<dyn DocumentSource>,
        organization_id: impl Into<String>,
    ) -> Result<Self> {
        let organization_id = organization_id.into();

        let warnings = ConfigValidator::validate(&config)
            .into_result()
            .context("Invalid configuration")?;
        for warning in &warnings {
            warn!(path = %warning.path, "{}", warning.message);
        }

        let cache = QueryCache::new(RetryPolicy::from(&config.cache));
        let persister = config
            .cache
            .persist
            .then(|| CachePersister::from_config(&config.cache));
        if let Some(persister) = &persister {
            match persister.load(&cache).await {
                Ok(restored) => info!(restored, "Restored query cache"),
                Err(e) => warn!(error = %e, "Ignoring unreadable cache snapshot"),
            }
        }

        let page_path = match document.snapshot().await {
            Ok(snapshot) => snapshot
                .page_path
                .clone()
                .unwrap_or_else(|| DEFAULT_PAGE_PATH.to_string()),
            Err(_) => DEFAULT_PAGE_PATH.to_string(),
        };

        let store = WebhookAssignmentStore::new(Arc::clone(&backend), cache.clone());
        let lookup = Arc::new(AssignmentStatusLookup::new(
            Arc::clone(&backend),
            cache.clone(),
            organization_id.clone(),
            page_path,
        ));
        let scanner = ElementScanner::builder(config.scanner.clone(), document)
            .lookup(lookup.clone())
            .build()
            .context("Failed to build element scanner")?;
        let watcher = MutationWatcher::new(scanner.clone(), config.watcher.clone())
            .context("Failed to build mutation watcher")?;
        let bulk = BulkOperationEngine::new(store.clone(), &config.bulk);

        let hook = Self {
            config,
            organization_id,
            backend,
            cache,
            persister,
            store,
            lookup,
            scanner,
            watcher,
            bulk,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        };
        hook.start_background();

        info!(organization_id = %hook.organization_id, "ElementHook started");
        Ok(hook)
    }

    fn start_background(&self) {
        let subscription = self
            .backend
            .subscribe(&self.organization_id, &self.config.remote.assignments_table);
        let invalidator = RealtimeInvalidator::new(self.cache.clone(), keys::invalidation_rules());

        let period = Duration::from_secs(self.config.cache.realtime_refresh_interval_secs.max(1));
        let mut tasks = self.tasks.lock();
        tasks.push(invalidator.spawn(subscription, self.cancel.child_token()));
        tasks.push(spawn_refresh_loop(
            self.cache.clone(),
            period,
            self.cancel.child_token(),
        ));
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn backend(&self) -> &Arc<dyn RemoteBackend> {
        &self.backend
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn store(&self) -> &WebhookAssignmentStore {
        &self.store
    }

    pub fn scanner(&self) -> &ElementScanner {
        &self.scanner
    }

    pub fn watcher(&self) -> &MutationWatcher {
        &self.watcher
    }

    pub fn bulk(&self) -> &BulkOperationEngine {
        &self.bulk
    }

    /// Client-side navigation: status lookups follow the new page.
    pub fn navigate(&self, page_path: impl Into<String>) {
        let page_path = page_path.into();
        info!(page_path = %page_path, "Page changed");
        self.lookup.set_page_path(page_path);
    }

    pub fn page_path(&self) -> String {
        self.lookup.page_path()
    }

    /// Stop monitoring and background tasks, then persist the cache.
    pub async fn shutdown(self) -> Result<()> {
        self.watcher.stop_monitoring();
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        if let Some(persister) = &self.persister {
            let saved = persister
                .save(&self.cache)
                .await
                .with_context(|| format!("Failed to persist cache to {}", persister.path().display()))?;
            info!(saved, "Persisted query cache");
        }

        info!("ElementHook stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
