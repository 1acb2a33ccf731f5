use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_UNIT_LENGTH;
use crate::Error;
use crate::Result;
use crate::WatchOptions;

/// Upper bound accepted for `watch.max_unit_length`
const MAX_UNIT_LENGTH_LIMIT: usize = 64 * 1024 * 1024;

/// Defaults applied to every subscription
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Staleness window for single-entity watches (unit: milliseconds).
    /// Unset means entities never go stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_ms: Option<u64>,

    /// Longest accepted stream unit in bytes; longer units are skipped
    #[serde(default = "default_max_unit_length")]
    pub max_unit_length: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: None,
            max_unit_length: default_max_unit_length(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stale_after_ms == Some(0) {
            return Err(Error::Config(ConfigError::Message(
                "watch.stale_after_ms must be greater than 0 when set".into(),
            )));
        }

        if self.max_unit_length == 0 || self.max_unit_length > MAX_UNIT_LENGTH_LIMIT {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch.max_unit_length must be between 1 and {} bytes, got {}",
                MAX_UNIT_LENGTH_LIMIT, self.max_unit_length
            ))));
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }

    pub fn options(&self) -> WatchOptions {
        WatchOptions {
            stale_after: self.stale_after(),
            max_unit_length: self.max_unit_length,
        }
    }
}

fn default_max_unit_length() -> usize {
    DEFAULT_MAX_UNIT_LENGTH
}
