//! Element scanner.
//!
//! One scan pass: capture the document, gather candidates from the configured
//! selectors, drop hidden, disabled and undersized elements, classify each
//! survivor in isolation and resolve webhook statuses concurrently.
//!
//! Concurrent [`ElementScanner::scan`] calls share one in-flight pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use parking_lot::{Mutex, RwLock};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use elementhook_config::ScannerConfig;

use crate::classifier::{Classify, ElementClassifier, ElementDescriptor};
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::document::DocumentSource;
use crate::dom_types::BoundingBox;
use crate::element::{DetectedElement, ScanResult, WebhookStatus};
use crate::error::{DomError, ScanError};
use crate::lookup::{NoopLookup, WebhookStatusLookup};
use crate::selector::{self, SelectorList};
use crate::snapshot::{DomSnapshot, ElementRef};

type SharedScan = Shared<BoxFuture<'static, Result<ScanResult, ScanError>>>;

/// Builder for [`ElementScanner`].
pub struct ScannerBuilder {
    config: ScannerConfig,
    document: Arc<dyn DocumentSource>,
    classifier: Arc<dyn Classify>,
    lookup: Arc<dyn WebhookStatusLookup>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ScannerBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn Classify>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn lookup(mut self, lookup: Arc<dyn WebhookStatusLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Parse the selectors and build the scanner.
    pub fn build(self) -> Result<ElementScanner, DomError> {
        let selectors = SelectorList::parse_all(&self.config.selectors)?;
        let exclusions = if self.config.exclude_selectors.is_empty() {
            SelectorList::empty()
        } else {
            SelectorList::parse_all(&self.config.exclude_selectors)?
        };

        Ok(ElementScanner {
            inner: Arc::new(ScannerInner {
                config: self.config,
                selectors,
                exclusions,
                document: self.document,
                classifier: self.classifier,
                lookup: self.lookup,
                diagnostics: self.diagnostics,
                in_flight: Mutex::new(None),
                last_snapshot: RwLock::new(None),
            }),
        })
    }
}

/// Full-document element scanner.
#[derive(Clone)]
pub struct ElementScanner {
    inner: Arc<ScannerInner>,
}

struct ScannerInner {
    config: ScannerConfig,
    selectors: SelectorList,
    exclusions: SelectorList,
    document: Arc<dyn DocumentSource>,
    classifier: Arc<dyn Classify>,
    lookup: Arc<dyn WebhookStatusLookup>,
    diagnostics: Arc<dyn Diagnostics>,
    in_flight: Mutex<Option<SharedScan>>,
    last_snapshot: RwLock<Option<Arc<DomSnapshot>>>,
}

/// A candidate that survived filtering and classification.
struct Prepared {
    descriptor: ElementDescriptor,
    bounding_rect: BoundingBox,
    is_visible: bool,
    z_index: Option<i32>,
}

impl ElementScanner {
    /// Start building a scanner with the default classifier, no status
    /// lookup and tracing diagnostics.
    pub fn builder(config: ScannerConfig, document: Arc<dyn DocumentSource>) -> ScannerBuilder {
        ScannerBuilder {
            config,
            document,
            classifier: Arc::new(ElementClassifier::new()),
            lookup: Arc::new(NoopLookup),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Scanner with default collaborators.
    pub fn new(
        config: ScannerConfig,
        document: Arc<dyn DocumentSource>,
    ) -> Result<Self, DomError> {
        Self::builder(config, document).build()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.inner.config
    }

    /// The snapshot used by the most recent scan.
    pub fn last_snapshot(&self) -> Option<Arc<DomSnapshot>> {
        self.inner.last_snapshot.read().clone()
    }

    /// Scan the document, joining a scan that is already running.
    pub async fn scan(&self) -> Result<ScanResult, ScanError> {
        let fut = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining in-flight scan");
                    running.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let result = inner.run().await;
                        *inner.in_flight.lock() = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    /// Scan the document without joining an in-flight scan.
    ///
    /// Used after mutations, where a scan that captured its snapshot before
    /// the mutation would return outdated elements.
    pub async fn scan_fresh(&self) -> Result<ScanResult, ScanError> {
        self.inner.run().await
    }
}

impl ScannerInner {
    async fn run(&self) -> Result<ScanResult, ScanError> {
        let started = Instant::now();
        let timestamp = Utc::now();
        self.diagnostics.record(DiagnosticEvent::ScanStarted);

        let doc = self.document.snapshot().await?;
        *self.last_snapshot.write() = Some(Arc::clone(&doc));

        let prepared = self.prepare(&doc);
        let elements = self.resolve_statuses(prepared).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = ScanResult::new(timestamp, duration_ms, elements);

        self.diagnostics.record(DiagnosticEvent::ScanCompleted {
            elements_found: result.elements_found,
            duration_ms,
        });
        info!(
            elements_found = result.elements_found,
            elements_with_webhooks = result.elements_with_webhooks,
            duration_ms,
            "Scan completed"
        );
        Ok(result)
    }

    /// Gather, filter and classify candidates.
    fn prepare(&self, doc: &DomSnapshot) -> Vec<Prepared> {
        let page_path = doc
            .page_path
            .as_deref()
            .unwrap_or(self.config.page_path.as_str());

        let excluded = self.exclusions.matching(doc);
        let candidates: Vec<ElementRef<'_>> = self
            .selectors
            .select(doc)
            .into_iter()
            .filter(|el| !selector::within(&excluded, *el))
            .collect();
        let total = candidates.len();

        let mut prepared = Vec::new();
        let mut accepted = 0usize;
        for el in candidates {
            let hidden = is_hidden(el);
            if hidden && !self.config.include_hidden {
                continue;
            }
            if is_disabled(el) && !self.config.include_disabled {
                continue;
            }
            if !self.meets_size(el.bounding_box(), doc.measured) {
                continue;
            }
            if accepted >= self.config.max_elements {
                debug!(
                    max_elements = self.config.max_elements,
                    "Scan cap reached, remaining candidates omitted"
                );
                break;
            }
            accepted += 1;

            match self.classifier.describe(el, page_path) {
                Ok(descriptor) => prepared.push(Prepared {
                    descriptor,
                    bounding_rect: el.bounding_box(),
                    is_visible: !hidden,
                    z_index: el.style().z_index,
                }),
                Err(e) => {
                    warn!(node = el.id().0, error = %e, "Failed to classify element");
                    self.diagnostics.record(DiagnosticEvent::ElementSkipped {
                        dom_node: el.id().0,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            candidates = total,
            accepted,
            classified = prepared.len(),
            "Candidate filtering finished"
        );
        prepared
    }

    /// Unmeasured (0x0) boxes pass unless the snapshot is fully measured.
    fn meets_size(&self, bbox: BoundingBox, measured: bool) -> bool {
        if !measured && bbox.is_empty() {
            return true;
        }
        bbox.meets_minimum(self.config.min_width, self.config.min_height)
    }

    async fn resolve_statuses(&self, prepared: Vec<Prepared>) -> Vec<DetectedElement> {
        let limit = Duration::from_millis(self.config.status_lookup_timeout_ms);

        let statuses = join_all(prepared.iter().map(|p| async move {
            match timeout(limit, self.lookup.status(&p.descriptor)).await {
                Ok(Ok(status)) => status,
                Ok(Err(reason)) => {
                    self.lookup_failed(&p.descriptor.id, reason);
                    WebhookStatus::None
                }
                Err(_) => {
                    self.lookup_failed(&p.descriptor.id, "timed out".to_string());
                    WebhookStatus::None
                }
            }
        }))
        .await;

        prepared
            .into_iter()
            .zip(statuses)
            .map(|(p, webhook_status)| DetectedElement {
                id: p.descriptor.id,
                element_type: p.descriptor.element_type,
                dom_path: p.descriptor.dom_path,
                content_hash: p.descriptor.content_hash,
                bounding_rect: p.bounding_rect,
                is_visible: p.is_visible,
                z_index: p.z_index,
                webhook_status,
                metadata: p.descriptor.metadata,
            })
            .collect()
    }

    fn lookup_failed(&self, element_id: &str, reason: String) {
        self.diagnostics.record(DiagnosticEvent::StatusLookupFailed {
            element_id: element_id.to_string(),
            reason,
        });
    }
}

/// Hidden by its own style or attributes, or by an ancestor's.
pub fn is_hidden(el: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors())
        .any(|node| {
            let style = node.style();
            node.has_attr("hidden")
                || style.is_display_none()
                || style.is_visibility_hidden()
                || style.is_transparent()
        })
}

/// Disabled via `disabled` or `aria-disabled="true"`.
pub fn is_disabled(el: ElementRef<'_>) -> bool {
    el.has_attr("disabled") || el.attr("aria-disabled") == Some("true")
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
