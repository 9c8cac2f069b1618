//! Convergence settings stored in profiles
//!
//! Every field is optional in the file; missing values fall back to the
//! library defaults in [`WaitConfig`](crate::progress::WaitConfig).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::progress::WaitConfig;

/// Per-profile wait settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitSettings {
    /// Maximum time to wait for convergence, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay before the first refresh and between refreshes, in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Lower bound on the spacing between refreshes, in seconds
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Consecutive "not found" refreshes tolerated while an object appears
    #[serde(default = "default_not_found_budget")]
    pub not_found_budget: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        WaitConfig::default().into()
    }
}

impl From<&WaitSettings> for WaitConfig {
    fn from(settings: &WaitSettings) -> Self {
        WaitConfig {
            timeout: Duration::from_secs(settings.timeout_secs),
            delay: Duration::from_secs(settings.delay_secs),
            min_interval: Duration::from_secs(settings.min_interval_secs),
            not_found_budget: settings.not_found_budget,
        }
    }
}

impl From<WaitConfig> for WaitSettings {
    fn from(config: WaitConfig) -> Self {
        Self {
            timeout_secs: config.timeout.as_secs(),
            delay_secs: config.delay.as_secs(),
            min_interval_secs: config.min_interval.as_secs(),
            not_found_budget: config.not_found_budget,
        }
    }
}

// Default value functions for serde
fn default_timeout_secs() -> u64 {
    WaitConfig::DEFAULT_TIMEOUT.as_secs()
}

fn default_delay_secs() -> u64 {
    WaitConfig::DEFAULT_DELAY.as_secs()
}

fn default_min_interval_secs() -> u64 {
    WaitConfig::DEFAULT_MIN_INTERVAL.as_secs()
}

fn default_not_found_budget() -> u32 {
    WaitConfig::DEFAULT_NOT_FOUND_BUDGET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_wait_config() {
        let settings = WaitSettings::default();
        assert_eq!(settings.timeout_secs, 300);
        assert_eq!(settings.delay_secs, 3);
        assert_eq!(settings.min_interval_secs, 3);
        assert_eq!(settings.not_found_budget, 120);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: WaitSettings = toml::from_str("timeout_secs = 1800").unwrap();
        assert_eq!(settings.timeout_secs, 1800);
        assert_eq!(settings.delay_secs, 3);

        let config = WaitConfig::from(&settings);
        assert_eq!(config.timeout, Duration::from_secs(1800));
        assert_eq!(config.not_found_budget, 120);
    }
}
