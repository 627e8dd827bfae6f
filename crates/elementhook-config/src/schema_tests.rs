use super::*;

#[test]
fn test_default_scanner_config() {
    let config = ScannerConfig::default();
    assert_eq!(config.min_width, 10.0);
    assert_eq!(config.min_height, 10.0);
    assert_eq!(config.max_elements, 1000);
    assert!(!config.include_hidden);
    assert!(!config.include_disabled);
    assert!(config.selectors.contains(&"button".to_string()));
    assert!(config.selectors.contains(&"a[href]".to_string()));
}

#[test]
fn test_default_watcher_config() {
    let config = WatcherConfig::default();
    assert_eq!(config.debounce_ms, 300);
    assert_eq!(config.tracked_attributes.len(), 5);
    assert_eq!(config.tool_ui_selector, "[data-elementhook-ui]");
}

#[test]
fn test_default_cache_config() {
    let config = CacheConfig::default();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_base_delay_ms, 1000);
    assert!(!config.persist);
    assert_eq!(config.persist_max_age_secs, 86_400);
}

#[test]
fn test_default_bulk_config() {
    assert_eq!(BulkConfig::default().inter_item_delay_ms, 50);
}

#[test]
fn test_partial_deserialize_uses_defaults() {
    let config: ScannerConfig = toml::from_str("include_hidden = true").unwrap();
    assert!(config.include_hidden);
    assert_eq!(config.max_elements, 1000);
    assert!(!config.selectors.is_empty());
}

#[test]
fn test_remote_config_skips_missing_secrets() {
    let json = serde_json::to_value(RemoteConfig::default()).unwrap();
    assert!(json.get("api_key").is_none());
    assert!(json.get("access_token").is_none());
    assert_eq!(json["assignments_table"], "element_webhooks");
}

#[test]
fn test_config_roundtrip_toml() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.watcher.debounce_ms, config.watcher.debounce_ms);
    assert_eq!(parsed.scanner.selectors, config.scanner.selectors);
}
