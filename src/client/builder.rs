use std::time::Duration;

use super::WatchClient;
use crate::Result;
use crate::WatchSettings;

pub struct WatchClientBuilder {
    settings: WatchSettings,
}

impl WatchClientBuilder {
    /// Create a new builder with default settings and the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut settings = WatchSettings::default();
        settings.client.base_url = base_url.into();
        Self { settings }
    }

    /// Set connection timeout (default: 1s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.settings.client.connect_timeout_in_ms = timeout.as_millis() as u64;
        self
    }

    /// Set one-shot request timeout (default: 3s)
    pub fn request_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.settings.client.request_timeout_in_ms = timeout.as_millis() as u64;
        self
    }

    /// Default staleness window for entity watches (default: none)
    pub fn stale_after(
        mut self,
        window: Duration,
    ) -> Self {
        self.settings.watch.stale_after_ms = Some(window.as_millis() as u64);
        self
    }

    /// Longest accepted stream unit in bytes (default: 4 MiB)
    pub fn max_unit_length(
        mut self,
        max_unit_length: usize,
    ) -> Self {
        self.settings.watch.max_unit_length = max_unit_length;
        self
    }

    /// Completely replaces the settings, base URL included
    ///
    /// Discards everything set through the individual methods so far.
    pub fn set_config(
        mut self,
        settings: WatchSettings,
    ) -> Self {
        self.settings = settings;
        self
    }

    /// Validate the settings and build an HTTP-backed client
    pub fn build(self) -> Result<WatchClient> {
        WatchClient::from_settings(self.settings)
    }
}
