//! Settings for the watch client.
//!
//! Layered the usual way, later sources overriding earlier ones:
//! 1. Type defaults
//! 2. Configuration file named by `CONFIG_PATH` (if set)
//! 3. Environment variables with the `WATCH__` prefix,
//!    e.g. `WATCH__CLIENT__BASE_URL=http://argo:3100`
mod client;
mod watch;

pub use client::*;
pub use watch::*;

#[cfg(test)]
mod config_test;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_PATH_ENV;
use crate::constants::ENV_PREFIX;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct WatchSettings {
    /// API server connection parameters
    #[serde(default)]
    pub client: ClientConfig,
    /// Subscription defaults
    #[serde(default)]
    pub watch: WatchConfig,
}

impl WatchSettings {
    /// Loads settings from defaults, `CONFIG_PATH` and the environment.
    ///
    /// Does not validate; call [`WatchSettings::validate`] once every
    /// override has been applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("WATCH__CLIENT__BASE_URL", "http://argo-rollouts:3100");
    /// let settings = WatchSettings::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let settings: Self = builder.add_source(environment()).build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Merges `path` on top of the current values. Environment variables
    /// still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Validates every section and hands the settings back.
    pub fn validate(self) -> Result<Self> {
        self.client.validate()?;
        self.watch.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
