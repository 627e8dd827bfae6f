//! Mutation watcher.
//!
//! Owns a monitoring session: receives [`MutationRecord`]s from the host,
//! filters them, debounces bursts and triggers re-scans through the
//! [`ElementScanner`]. Results go to the callback given to
//! [`MutationWatcher::start_monitoring`].
//!
//! ```text
//! Idle --start--> Observing --mutation--> DebouncePending --quiet--> Scanning
//!                    ^                         |  ^                     |
//!                    |                         +--+ (re-arm)            |
//!                    +----------------------------------------------------+
//! ```
//!
//! `stop_monitoring` returns to `Idle` from any state. Scans already running
//! finish, but their results are dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use elementhook_config::WatcherConfig;

use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::element::{DetectedElement, ScanResult, WebhookStatus};
use crate::error::WatcherError;
use crate::scanner::ElementScanner;
use crate::selector::SelectorList;
use crate::snapshot::NodeId;

/// Kind of document mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationKind {
    ChildList { added: usize, removed: usize },
    Attributes { name: String },
    CharacterData,
}

/// A document mutation reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(flatten)]
    pub kind: MutationKind,
    /// Mutated node in the latest snapshot, if the host can map it.
    #[serde(default)]
    pub target: Option<NodeId>,
    /// Set by hosts that know the target belongs to the tool's own UI.
    #[serde(default)]
    pub inside_tool_ui: bool,
}

impl MutationRecord {
    pub fn child_list(added: usize, removed: usize) -> Self {
        Self {
            kind: MutationKind::ChildList { added, removed },
            target: None,
            inside_tool_ui: false,
        }
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Attributes { name: name.into() },
            target: None,
            inside_tool_ui: false,
        }
    }

    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn in_tool_ui(mut self) -> Self {
        self.inside_tool_ui = true;
        self
    }
}

/// Watcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Idle,
    Observing,
    DebouncePending,
    Scanning,
}

/// Receives delivered scan results.
pub type ScanCallback = Arc<dyn Fn(ScanResult) + Send + Sync>;

/// Sending half handed to the host for reporting mutations.
#[derive(Debug, Clone)]
pub struct MutationSender {
    tx: mpsc::Sender<MutationRecord>,
}

impl MutationSender {
    /// Report a mutation, waiting for channel capacity.
    pub async fn send(&self, record: MutationRecord) -> Result<(), WatcherError> {
        self.tx
            .send(record)
            .await
            .map_err(|_| WatcherError::NotRunning)
    }

    /// Report a mutation without waiting; a full channel drops the record.
    pub fn try_send(&self, record: MutationRecord) -> Result<(), WatcherError> {
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Mutation channel full, record dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(WatcherError::NotRunning),
        }
    }
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// State shared between the watcher and its background tasks.
struct Shared {
    state: RwLock<WatcherState>,
    cache: RwLock<HashMap<String, DetectedElement>>,
    generation: AtomicU64,
    /// Held while a result is checked and delivered.
    delivery: Mutex<()>,
}

/// Observes mutations and keeps scan results current.
pub struct MutationWatcher {
    scanner: ElementScanner,
    config: WatcherConfig,
    tracked: HashSet<String>,
    tool_ui: SelectorList,
    diagnostics: Arc<dyn Diagnostics>,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl MutationWatcher {
    pub fn new(scanner: ElementScanner, config: WatcherConfig) -> Result<Self, WatcherError> {
        let tool_ui = if config.tool_ui_selector.trim().is_empty() {
            SelectorList::empty()
        } else {
            SelectorList::parse(&config.tool_ui_selector)?
        };
        let tracked = config
            .tracked_attributes
            .iter()
            .map(|a| a.to_ascii_lowercase())
            .collect();

        Ok(Self {
            scanner,
            config,
            tracked,
            tool_ui,
            diagnostics: Arc::new(TracingDiagnostics),
            shared: Arc::new(Shared {
                state: RwLock::new(WatcherState::Idle),
                cache: RwLock::new(HashMap::new()),
                generation: AtomicU64::new(0),
                delivery: Mutex::new(()),
            }),
            session: Mutex::new(None),
        })
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn state(&self) -> WatcherState {
        *self.shared.state.read()
    }

    pub fn is_monitoring(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Start a session: fire the initial scan and begin observing.
    ///
    /// The callback runs on a background task. It must not call
    /// [`stop_monitoring`](Self::stop_monitoring).
    pub fn start_monitoring<F>(&self, on_result: F) -> Result<MutationSender, WatcherError>
    where
        F: Fn(ScanResult) + Send + Sync + 'static,
    {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(WatcherError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            scanner: self.scanner.clone(),
            shared: Arc::clone(&self.shared),
            diagnostics: Arc::clone(&self.diagnostics),
            callback: Arc::new(on_result),
            cancel: cancel.clone(),
            filter: MutationFilter {
                tracked: self.tracked.clone(),
                tool_ui: self.tool_ui.clone(),
                scanner: self.scanner.clone(),
            },
            debounce: Duration::from_millis(self.config.debounce_ms),
        };

        *self.shared.state.write() = WatcherState::Observing;
        let task = tokio::spawn(run_loop(ctx, rx));
        *session = Some(Session { cancel, task });

        info!(debounce_ms = self.config.debounce_ms, "Mutation monitoring started");
        Ok(MutationSender { tx })
    }

    /// Stop the session. Valid in any state.
    pub fn stop_monitoring(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        session.cancel.cancel();
        session.task.abort();

        let _delivery = self.shared.delivery.lock();
        self.shared.cache.write().clear();
        *self.shared.state.write() = WatcherState::Idle;
        info!("Mutation monitoring stopped");
    }

    /// Patch one cached element's webhook status without re-scanning.
    ///
    /// Returns `false` when the element is not cached.
    pub fn update_element_status(&self, element_id: &str, status: WebhookStatus) -> bool {
        match self.shared.cache.write().get_mut(element_id) {
            Some(el) => {
                el.webhook_status = status;
                true
            }
            None => false,
        }
    }

    /// Cached descriptor for an element id.
    pub fn cached_element(&self, element_id: &str) -> Option<DetectedElement> {
        self.shared.cache.read().get(element_id).cloned()
    }

    /// All cached descriptors.
    pub fn cached_elements(&self) -> Vec<DetectedElement> {
        self.shared.cache.read().values().cloned().collect()
    }

    /// Whether a mutation would trigger a re-scan.
    pub fn qualifies(&self, record: &MutationRecord) -> bool {
        MutationFilter {
            tracked: self.tracked.clone(),
            tool_ui: self.tool_ui.clone(),
            scanner: self.scanner.clone(),
        }
        .qualifies(record)
    }
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
            session.task.abort();
        }
    }
}

struct MutationFilter {
    tracked: HashSet<String>,
    tool_ui: SelectorList,
    scanner: ElementScanner,
}

impl MutationFilter {
    fn qualifies(&self, record: &MutationRecord) -> bool {
        let relevant = match &record.kind {
            MutationKind::ChildList { added, removed } => added + removed > 0,
            MutationKind::Attributes { name } => self.tracked.contains(&name.to_ascii_lowercase()),
            MutationKind::CharacterData => false,
        };
        relevant && !record.inside_tool_ui && !self.targets_tool_ui(record.target)
    }

    fn targets_tool_ui(&self, target: Option<NodeId>) -> bool {
        if self.tool_ui.is_empty() {
            return false;
        }
        let (Some(target), Some(doc)) = (target, self.scanner.last_snapshot()) else {
            return false;
        };
        doc.element(target)
            .is_some_and(|el| self.tool_ui.matches_self_or_ancestor(el))
    }
}

struct LoopContext {
    scanner: ElementScanner,
    shared: Arc<Shared>,
    diagnostics: Arc<dyn Diagnostics>,
    callback: ScanCallback,
    cancel: CancellationToken,
    filter: MutationFilter,
    debounce: Duration,
}

async fn run_loop(ctx: LoopContext, mut rx: mpsc::Receiver<MutationRecord>) {
    spawn_scan(&ctx);

    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                debug!("Mutation loop shutting down");
                break;
            }
            record = rx.recv() => {
                let Some(record) = record else {
                    debug!("Mutation channel closed");
                    break;
                };
                if ctx.filter.qualifies(&record) {
                    deadline = Some(Instant::now() + ctx.debounce);
                    *ctx.shared.state.write() = WatcherState::DebouncePending;
                } else {
                    debug!(?record, "Ignoring mutation");
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                spawn_scan(&ctx);
            }
        }
    }
}

/// Start a scan on its own task; the newest generation wins.
fn spawn_scan(ctx: &LoopContext) {
    let generation = ctx.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
    *ctx.shared.state.write() = WatcherState::Scanning;

    let scanner = ctx.scanner.clone();
    let shared = Arc::clone(&ctx.shared);
    let diagnostics = Arc::clone(&ctx.diagnostics);
    let callback = Arc::clone(&ctx.callback);
    let cancel = ctx.cancel.clone();

    tokio::spawn(async move {
        let outcome = scanner.scan_fresh().await;

        let _delivery = shared.delivery.lock();
        if cancel.is_cancelled() {
            debug!(generation, "Monitoring stopped, scan result dropped");
            return;
        }
        if shared.generation.load(Ordering::SeqCst) != generation {
            diagnostics.record(DiagnosticEvent::ScanDiscarded { generation });
            return;
        }

        {
            let mut state = shared.state.write();
            if *state == WatcherState::Scanning {
                *state = WatcherState::Observing;
            }
        }

        match outcome {
            Ok(result) => {
                {
                    let mut cache = shared.cache.write();
                    cache.clear();
                    cache.extend(result.elements.iter().map(|e| (e.id.clone(), e.clone())));
                }
                callback(result);
            }
            Err(e) => warn!(generation, error = %e, "Scan failed"),
        }
    });
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
