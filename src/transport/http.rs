use std::time::Duration;

use futures::StreamExt;
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use super::ByteStream;
use super::Fetcher;
use super::StreamOpener;
use crate::utils::scoped_timer::ScopedTimer;
use crate::ClientConfig;
use crate::FetchError;
use crate::WatchError;

/// `reqwest`-backed implementation of both collaborator traits
///
/// The request timeout applies to one-shot fetches only. Streams stay open
/// for as long as the server keeps them open or until they are dropped.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from client settings
    ///
    /// # Errors
    /// [`FetchError::Request`] if the underlying HTTP client cannot be built
    /// (e.g. TLS backend initialization failure).
    pub fn new(config: &ClientConfig) -> std::result::Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_in_ms))
            .build()
            .map_err(|e| FetchError::Request {
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            request_timeout: Duration::from_millis(config.request_timeout_in_ms),
        })
    }
}

#[async_trait::async_trait]
impl StreamOpener for HttpTransport {
    async fn open(
        &self,
        url: &str,
    ) -> std::result::Result<ByteStream, WatchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!(url, "Watch stream connect failed: {:?}", e);
                WatchError::ConnectFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::ConnectFailed {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        debug!(url, "Watch stream established");
        Ok(response
            .bytes_stream()
            .map_err(|e| WatchError::Transport(e.to_string()))
            .boxed())
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
    ) -> std::result::Result<Value, FetchError> {
        let _timer = ScopedTimer::new("transport::fetch", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(url, %status, "Fetch returned non-success status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
