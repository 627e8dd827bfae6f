//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub bulk: BulkConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Element scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Selectors whose matches are scan candidates.
    #[serde(default = "default_selectors")]
    pub selectors: Vec<String>,

    /// Selectors whose matches (and their subtrees) are never candidates.
    #[serde(default = "default_exclude_selectors")]
    pub exclude_selectors: Vec<String>,

    /// Keep elements that are not rendered.
    #[serde(default)]
    pub include_hidden: bool,

    /// Keep disabled elements.
    #[serde(default)]
    pub include_disabled: bool,

    /// Minimum bounding box width in CSS pixels.
    #[serde(default = "default_min_size")]
    pub min_width: f64,

    /// Minimum bounding box height in CSS pixels.
    #[serde(default = "default_min_size")]
    pub min_height: f64,

    /// Upper bound on elements processed per scan.
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,

    /// Per-element webhook status lookup timeout.
    #[serde(default = "default_status_lookup_timeout")]
    pub status_lookup_timeout_ms: u64,

    /// Page route used to infer the feature slug of detected elements.
    #[serde(default = "default_page_path")]
    pub page_path: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            selectors: default_selectors(),
            exclude_selectors: default_exclude_selectors(),
            include_hidden: false,
            include_disabled: false,
            min_width: default_min_size(),
            min_height: default_min_size(),
            max_elements: default_max_elements(),
            status_lookup_timeout_ms: default_status_lookup_timeout(),
            page_path: default_page_path(),
        }
    }
}

fn default_selectors() -> Vec<String> {
    [
        "button",
        "a[href]",
        "form",
        "input",
        "select",
        "textarea",
        "[role=\"button\"]",
        "[onclick]",
        "[data-testid]",
        "[data-element-id]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_selectors() -> Vec<String> {
    vec![
        "[data-elementhook-ui]".to_string(),
        "script".to_string(),
        "style".to_string(),
        "noscript".to_string(),
        "template".to_string(),
    ]
}

fn default_min_size() -> f64 {
    10.0
}

fn default_max_elements() -> usize {
    1000
}

fn default_status_lookup_timeout() -> u64 {
    2000
}

fn default_page_path() -> String {
    "/".to_string()
}

/// Mutation watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period before a re-scan runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Attribute names whose changes trigger a re-scan.
    #[serde(default = "default_tracked_attributes")]
    pub tracked_attributes: Vec<String>,

    /// Selector identifying the monitoring tool's own UI.
    #[serde(default = "default_tool_ui_selector")]
    pub tool_ui_selector: String,

    /// Capacity of the mutation record channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            tracked_attributes: default_tracked_attributes(),
            tool_ui_selector: default_tool_ui_selector(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_tracked_attributes() -> Vec<String> {
    ["class", "id", "style", "hidden", "disabled"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tool_ui_selector() -> String {
    "[data-elementhook-ui]".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

/// Query cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// Persist the cache to disk between sessions.
    #[serde(default)]
    pub persist: bool,

    /// Snapshot file location.
    #[serde(default = "default_persist_path")]
    pub persist_path: PathBuf,

    /// Snapshots older than this are discarded on load.
    #[serde(default = "default_persist_max_age")]
    pub persist_max_age_secs: u64,

    /// Background refresh interval for realtime-tier entries.
    #[serde(default = "default_realtime_refresh")]
    pub realtime_refresh_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            persist: false,
            persist_path: default_persist_path(),
            persist_max_age_secs: default_persist_max_age(),
            realtime_refresh_interval_secs: default_realtime_refresh(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    30_000
}

fn default_persist_path() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("elementhook").join("query-cache.json.gz"))
        .unwrap_or_else(|| PathBuf::from("/tmp/elementhook/query-cache.json.gz"))
}

fn default_persist_max_age() -> u64 {
    24 * 60 * 60
}

fn default_realtime_refresh() -> u64 {
    60
}

/// Remote data platform configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// REST endpoint base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Anonymous/service API key sent as `apikey`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Bearer token of the signed-in user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Timeout for each management API call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Table holding webhook assignments.
    #[serde(default = "default_assignments_table")]
    pub assignments_table: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            access_token: None,
            request_timeout_secs: default_request_timeout(),
            assignments_table: default_assignments_table(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_assignments_table() -> String {
    "element_webhooks".to_string()
}

/// Bulk operation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Delay between consecutive items.
    #[serde(default = "default_inter_item_delay")]
    pub inter_item_delay_ms: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            inter_item_delay_ms: default_inter_item_delay(),
        }
    }
}

fn default_inter_item_delay() -> u64 {
    50
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rotated log files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
