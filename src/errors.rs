//! Watch Engine Error Hierarchy
//!
//! Errors are split by where they surface:
//! - [`WatchError`]: stream-level failures. Per-unit decode failures are
//!   recoverable and absorbed by the controllers; everything else ends the
//!   subscription's connection and becomes explicit state.
//! - [`FetchError`]: one-shot request failures, returned to whoever asked
//!   for the snapshot.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Streaming subscription failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// One-shot snapshot request failures
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Settings loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// Stream could not be established (transport error or non-2xx status)
    #[error("Failed to open stream {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// Established connection dropped before it was closed locally
    #[error("Stream transport failed: {0}")]
    Transport(String),

    /// Server sent an error frame in place of a result
    #[error("Upstream error (code {code}): {message}")]
    Upstream { code: i32, message: String },

    /// A single framing unit could not be parsed into a change event
    #[error("Failed to decode stream unit: {reason}")]
    Decode { reason: String },

    /// A change event parsed, but its payload is not the expected entity
    #[error("Failed to extract entity from record: {0}")]
    Extract(String),
}

impl WatchError {
    /// Whether the stream can keep delivering events after this error.
    ///
    /// Recoverable errors describe one unit; the rest describe the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WatchError::Decode { .. } | WatchError::Extract(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Request never produced a response
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Response carried a non-success status
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body was not the expected JSON document
    #[error("Failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Owning subscription was closed while the request was in flight
    #[error("Request to {url} was cancelled")]
    Cancelled { url: String },
}
