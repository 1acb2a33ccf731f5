//! Collaborator seams consumed by the watch engine
//!
//! The engine never talks HTTP directly. It needs exactly two capabilities:
//! - [`StreamOpener`]: open a persistent streaming response and hand back its
//!   body as raw byte chunks
//! - [`Fetcher`]: one-shot request returning a complete JSON snapshot
//!
//! [`HttpTransport`] implements both over `reqwest`. Tests substitute mocks or
//! channel-backed streams.

mod http;

pub use http::*;


use bytes::Bytes;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::FetchError;
use crate::WatchError;

/// Raw body of a streaming response. Dropping it releases the connection.
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, WatchError>>;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait StreamOpener: Send + Sync + 'static {
    /// Opens a streaming connection to `url`.
    ///
    /// Resolves once the response head has arrived; the body is delivered
    /// incrementally through the returned stream.
    ///
    /// # Errors
    /// [`WatchError::ConnectFailed`] if the connection cannot be established or
    /// the server answers with a non-success status.
    async fn open(
        &self,
        url: &str,
    ) -> std::result::Result<ByteStream, WatchError>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Performs a one-shot request and returns the decoded JSON body.
    ///
    /// Never retries internally.
    async fn fetch(
        &self,
        url: &str,
    ) -> std::result::Result<Value, FetchError>;
}
