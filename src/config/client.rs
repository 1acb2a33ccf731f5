use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Connection settings for the rollout API server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme, host and port every request path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// TCP/TLS connect timeout for fetches and streams (unit: milliseconds)
    #[serde(default = "default_connect_timeout_in_ms")]
    pub connect_timeout_in_ms: u64,

    /// Whole-request timeout for one-shot fetches (unit: milliseconds).
    /// Streams are long-lived and never time out.
    #[serde(default = "default_request_timeout_in_ms")]
    pub request_timeout_in_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_in_ms: default_connect_timeout_in_ms(),
            request_timeout_in_ms: default_request_timeout_in_ms(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "client.base_url `{}` is not a valid URL: {}",
                self.base_url, e
            )))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(ConfigError::Message(format!(
                "client.base_url must use http or https, got `{}`",
                url.scheme()
            ))));
        }

        if self.connect_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "client.connect_timeout_in_ms must be greater than 0".into(),
            )));
        }
        if self.request_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "client.request_timeout_in_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:3100".to_string()
}
fn default_connect_timeout_in_ms() -> u64 {
    1000
}
fn default_request_timeout_in_ms() -> u64 {
    3000
}
