// cf-utils configuration
//
// Credentials and region are never ambient global state: callers build a
// CfConfig (directly or via from_env), load an SdkConfig from it once, and
// thread both into every client-constructing call.

use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

fn default_poll_interval_secs() -> u64 {
    5
}

/// Runtime configuration for the helper modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfConfig {
    /// AWS region. Falls back to the SDK's own resolution chain when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Named credentials profile. Falls back to the SDK default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Seconds slept between status probes while waiting for a terminal
    /// stack or change-set status.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for CfConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl CfConfig {
    /// Build a configuration from environment variables.
    ///
    /// Reads `AWS_REGION` (or `AWS_DEFAULT_REGION`), `AWS_PROFILE` and
    /// `CF_UTILS_POLL_INTERVAL_SECS`, leaving defaults in place for
    /// anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(region) =
            std::env::var("AWS_REGION").or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        {
            config.region = Some(region);
        }
        if let Ok(profile) = std::env::var("AWS_PROFILE") {
            config.profile = Some(profile);
        }
        if let Ok(raw) = std::env::var("CF_UTILS_POLL_INTERVAL_SECS") {
            match raw.parse() {
                Ok(secs) => config.poll_interval_secs = secs,
                Err(_) => warn!(
                    value = %raw,
                    "ignoring unparseable CF_UTILS_POLL_INTERVAL_SECS"
                ),
            }
        }

        config
    }

    /// Interval between status probes.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Load an AWS `SdkConfig` honouring the region/profile overrides.
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CfConfig::default();
        assert_eq!(config.region, None);
        assert_eq!(config.profile, None);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }
}
