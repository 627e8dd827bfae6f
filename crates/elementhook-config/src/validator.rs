//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(e) => Err(ConfigError::InvalidValue {
                field: e.path,
                message: e.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_scanner(config, &mut result);
        Self::validate_watcher(config, &mut result);
        Self::validate_cache(config, &mut result);
        Self::validate_remote(config, &mut result);
        Self::validate_bulk(config, &mut result);

        result
    }

    fn validate_scanner(config: &Config, result: &mut ValidationResult) {
        let scanner = &config.scanner;

        if scanner.selectors.is_empty() {
            result.add_error(ValidationError::new(
                "scanner.selectors",
                "At least one selector is required",
            ));
        }

        for (i, selector) in scanner
            .selectors
            .iter()
            .chain(scanner.exclude_selectors.iter())
            .enumerate()
        {
            if selector.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("scanner.selectors[{}]", i),
                    "Selector cannot be empty",
                ));
            }
        }

        if scanner.min_width < 0.0 || scanner.min_height < 0.0 {
            result.add_error(ValidationError::new(
                "scanner.min_width",
                "Minimum element size cannot be negative",
            ));
        }

        if scanner.max_elements == 0 {
            result.add_error(ValidationError::new(
                "scanner.max_elements",
                "max_elements must be greater than 0",
            ));
        }

        if scanner.max_elements > 10_000 {
            result.add_warning(ValidationWarning::new(
                "scanner.max_elements",
                "max_elements is very high (>10000), scans may become slow",
            ));
        }

        if scanner.status_lookup_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "scanner.status_lookup_timeout_ms",
                "status_lookup_timeout_ms must be greater than 0",
            ));
        }
    }

    fn validate_watcher(config: &Config, result: &mut ValidationResult) {
        if config.watcher.debounce_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "watcher.debounce_ms",
                "debounce_ms is 0, every mutation burst will trigger a scan",
            ));
        }

        if config.watcher.channel_capacity == 0 {
            result.add_error(ValidationError::new(
                "watcher.channel_capacity",
                "channel_capacity must be greater than 0",
            ));
        }

        if config.watcher.tool_ui_selector.trim().is_empty() {
            result.add_warning(ValidationWarning::new(
                "watcher.tool_ui_selector",
                "No tool UI selector set, the monitor's own re-renders may trigger scans",
            ));
        }
    }

    fn validate_cache(config: &Config, result: &mut ValidationResult) {
        let cache = &config.cache;

        if cache.retry_base_delay_ms > cache.retry_max_delay_ms {
            result.add_error(ValidationError::new(
                "cache.retry_base_delay_ms",
                "retry_base_delay_ms cannot exceed retry_max_delay_ms",
            ));
        }

        if cache.max_retries > 10 {
            result.add_warning(ValidationWarning::new(
                "cache.max_retries",
                "max_retries is high (>10), failing reads may take very long to surface",
            ));
        }

        if cache.persist && cache.persist_max_age_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "cache.persist_max_age_secs",
                "persist_max_age_secs is 0, persisted snapshots will always be discarded",
            ));
        }
    }

    fn validate_remote(config: &Config, result: &mut ValidationResult) {
        let remote = &config.remote;

        if !remote.base_url.starts_with("http://") && !remote.base_url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "remote.base_url",
                "base_url must start with http:// or https://",
            ));
        }

        if remote.request_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "remote.request_timeout_secs",
                "request_timeout_secs must be greater than 0",
            ));
        }

        if remote.api_key.is_none() {
            result.add_warning(ValidationWarning::new(
                "remote.api_key",
                "API key is not set, may need to be set via environment variable",
            ));
        }

        if remote.assignments_table.is_empty() {
            result.add_error(ValidationError::new(
                "remote.assignments_table",
                "assignments_table cannot be empty",
            ));
        }
    }

    fn validate_bulk(config: &Config, result: &mut ValidationResult) {
        if config.bulk.inter_item_delay_ms > 5_000 {
            result.add_warning(ValidationWarning::new(
                "bulk.inter_item_delay_ms",
                "inter_item_delay_ms is above 5s, large selections will run for a long time",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
