//! Bridge configuration.
//!
//! One struct with every tunable the core honors, plus environment
//! variable overrides. Values that would violate platform-imposed
//! limits are clamped at load, not at use.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Platform-imposed maximum event lookback in days. The retention
/// clamp in the event query engine enforces this uniformly; no other
/// component may extend it.
pub const RETENTION_DAYS_MAX: i64 = 7;

/// Hard ceiling on a single event query.
pub const EVENT_LIMIT_MAX: usize = 500;

/// Default values, kept in one place.
pub mod defaults {
    /// Similarity threshold for fuzzy device resolution.
    pub const FUZZY_THRESHOLD: f64 = 0.6;
    /// Command history ring capacity.
    pub const COMMAND_RING_SIZE: usize = 1000;
    /// Events returned per query unless the caller asks otherwise.
    pub const EVENT_LIMIT: usize = 100;
    /// Devices sampled for a system status report.
    pub const SYSTEM_STATUS_SAMPLE: usize = 15;
    /// Per-call adapter deadline.
    pub const ADAPTER_TIMEOUT_MS: u64 = 10_000;
}

/// Environment variable names recognized by [`BridgeConfig::from_env`].
pub mod env_vars {
    pub const FUZZY_THRESHOLD: &str = "HEARTH_FUZZY_THRESHOLD";
    pub const COMMAND_RING_SIZE: &str = "HEARTH_COMMAND_RING_SIZE";
    pub const RETENTION_DAYS: &str = "HEARTH_RETENTION_DAYS";
    pub const DEFAULT_EVENT_LIMIT: &str = "HEARTH_DEFAULT_EVENT_LIMIT";
    pub const SYSTEM_STATUS_SAMPLE: &str = "HEARTH_SYSTEM_STATUS_SAMPLE";
    pub const ADAPTER_TIMEOUT_MS: &str = "HEARTH_ADAPTER_TIMEOUT_MS";
    pub const RECOMMENDATION_CATALOG: &str = "HEARTH_RECOMMENDATION_CATALOG";
}

/// Tunables honored by the core components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Similarity threshold for fuzzy resolution, in `(0, 1]`.
    pub fuzzy_threshold: f64,
    /// Command tracker ring capacity.
    pub command_ring_size: usize,
    /// Maximum lookback in days; clamped to the platform limit.
    pub retention_days: i64,
    /// Default event query limit; clamped to [`EVENT_LIMIT_MAX`].
    pub default_event_limit: usize,
    /// Maximum devices sampled per system status report.
    pub system_status_sample: usize,
    /// Per-call adapter deadline in milliseconds.
    pub adapter_timeout_ms: u64,
    /// Optional recommendation catalog override file.
    pub recommendation_catalog_path: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: defaults::FUZZY_THRESHOLD,
            command_ring_size: defaults::COMMAND_RING_SIZE,
            retention_days: RETENTION_DAYS_MAX,
            default_event_limit: defaults::EVENT_LIMIT,
            system_status_sample: defaults::SYSTEM_STATUS_SAMPLE,
            adapter_timeout_ms: defaults::ADAPTER_TIMEOUT_MS,
            recommendation_catalog_path: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by any `HEARTH_*` variables present in the
    /// environment. Malformed values are rejected with the variable
    /// named rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = read_env(env_vars::FUZZY_THRESHOLD)? {
            config.fuzzy_threshold = v;
        }
        if let Some(v) = read_env(env_vars::COMMAND_RING_SIZE)? {
            config.command_ring_size = v;
        }
        if let Some(v) = read_env(env_vars::RETENTION_DAYS)? {
            config.retention_days = v;
        }
        if let Some(v) = read_env(env_vars::DEFAULT_EVENT_LIMIT)? {
            config.default_event_limit = v;
        }
        if let Some(v) = read_env(env_vars::SYSTEM_STATUS_SAMPLE)? {
            config.system_status_sample = v;
        }
        if let Some(v) = read_env(env_vars::ADAPTER_TIMEOUT_MS)? {
            config.adapter_timeout_ms = v;
        }
        if let Ok(path) = std::env::var(env_vars::RECOMMENDATION_CATALOG) {
            if !path.trim().is_empty() {
                config.recommendation_catalog_path = Some(PathBuf::from(path));
            }
        }

        config.validate()
    }

    /// Clamp platform-bounded values and reject nonsensical ones.
    pub fn validate(mut self) -> Result<Self> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(Error::invalid_input(
                "fuzzy_threshold",
                "must be within [0, 1]",
            ));
        }
        if self.command_ring_size == 0 {
            return Err(Error::invalid_input(
                "command_ring_size",
                "must be at least 1",
            ));
        }
        if self.retention_days < 1 {
            return Err(Error::invalid_input("retention_days", "must be at least 1"));
        }
        if self.retention_days > RETENTION_DAYS_MAX {
            tracing::warn!(
                requested = self.retention_days,
                max = RETENTION_DAYS_MAX,
                "retention_days exceeds the platform limit, clamping"
            );
            self.retention_days = RETENTION_DAYS_MAX;
        }
        if self.default_event_limit == 0 {
            return Err(Error::invalid_input(
                "default_event_limit",
                "must be at least 1",
            ));
        }
        if self.default_event_limit > EVENT_LIMIT_MAX {
            tracing::warn!(
                requested = self.default_event_limit,
                max = EVENT_LIMIT_MAX,
                "default_event_limit exceeds the query ceiling, clamping"
            );
            self.default_event_limit = EVENT_LIMIT_MAX;
        }
        if self.system_status_sample == 0 {
            return Err(Error::invalid_input(
                "system_status_sample",
                "must be at least 1",
            ));
        }
        if self.adapter_timeout_ms == 0 {
            return Err(Error::invalid_input(
                "adapter_timeout_ms",
                "must be at least 1",
            ));
        }
        Ok(self)
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_input(name, format!("could not parse '{raw}'"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.fuzzy_threshold, defaults::FUZZY_THRESHOLD);
        assert_eq!(config.command_ring_size, 1000);
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.default_event_limit, 100);
        assert_eq!(config.system_status_sample, 15);
    }

    #[test]
    fn test_retention_clamped_to_platform_limit() {
        let config = BridgeConfig {
            retention_days: 30,
            ..Default::default()
        };
        let config = config.validate().unwrap();
        assert_eq!(config.retention_days, RETENTION_DAYS_MAX);
    }

    #[test]
    fn test_event_limit_clamped() {
        let config = BridgeConfig {
            default_event_limit: 10_000,
            ..Default::default()
        };
        let config = config.validate().unwrap();
        assert_eq!(config.default_event_limit, EVENT_LIMIT_MAX);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = BridgeConfig {
            fuzzy_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"fuzzy_threshold": 0.7}"#).unwrap();
        assert_eq!(config.fuzzy_threshold, 0.7);
        assert_eq!(config.command_ring_size, defaults::COMMAND_RING_SIZE);
    }
}
