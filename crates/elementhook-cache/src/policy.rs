//! Cache tiers and retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use elementhook_config::CacheConfig;

const MINUTE: u64 = 60;

/// Freshness class of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Reference data that rarely changes.
    Static,
    SemiStatic,
    #[default]
    Dynamic,
    /// Data refreshed in the background while in use.
    Realtime,
}

impl CacheTier {
    pub fn policy(&self) -> CachePolicy {
        match self {
            Self::Static => CachePolicy::new(30 * MINUTE, 120 * MINUTE, None),
            Self::SemiStatic => CachePolicy::new(20 * MINUTE, 60 * MINUTE, None),
            Self::Dynamic => CachePolicy::new(5 * MINUTE, 20 * MINUTE, None),
            Self::Realtime => CachePolicy::new(MINUTE, 10 * MINUTE, Some(MINUTE)),
        }
    }
}

/// Timing of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Age after which an entry is served stale and refreshed.
    pub stale_time: Duration,
    /// Idle time after which an entry is dropped by `gc`.
    pub gc_time: Duration,
    pub refresh_interval: Option<Duration>,
}

impl CachePolicy {
    fn new(stale_secs: u64, gc_secs: u64, refresh_secs: Option<u64>) -> Self {
        Self {
            stale_time: Duration::from_secs(stale_secs),
            gc_time: Duration::from_secs(gc_secs),
            refresh_interval: refresh_secs.map(Duration::from_secs),
        }
    }
}

/// Exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1`: base doubled per attempt,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<&CacheConfig> for RetryPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_presets() {
        let p = CacheTier::Static.policy();
        assert_eq!(p.stale_time, Duration::from_secs(30 * 60));
        assert_eq!(p.gc_time, Duration::from_secs(2 * 60 * 60));
        assert_eq!(p.refresh_interval, None);

        let p = CacheTier::SemiStatic.policy();
        assert_eq!(p.stale_time, Duration::from_secs(20 * 60));
        assert_eq!(p.gc_time, Duration::from_secs(60 * 60));

        let p = CacheTier::Dynamic.policy();
        assert_eq!(p.stale_time, Duration::from_secs(5 * 60));
        assert_eq!(p.gc_time, Duration::from_secs(20 * 60));

        let p = CacheTier::Realtime.policy();
        assert_eq!(p.stale_time, Duration::from_secs(60));
        assert_eq!(p.gc_time, Duration::from_secs(10 * 60));
        assert_eq!(p.refresh_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(30));
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            max_retries: 1,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 1000,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(1));
    }

    #[test]
    fn test_tier_serde() {
        assert_eq!(
            serde_json::to_string(&CacheTier::SemiStatic).unwrap(),
            "\"semi_static\""
        );
    }
}
