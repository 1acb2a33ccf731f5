//! Keeps client-held state in sync with server-side resources through
//! long-lived watch streams.
//!
//! - [`stream`]: raw response body to change events
//! - [`watch`]: single-entity and list controllers built on those events
//! - [`WatchClient`]: settings, transport and path resolution in one place
//! - [`RolloutClient`]: the rollout dashboard API on top of it

mod client;
mod config;
mod constants;
mod errors;
mod event;
mod metrics;
mod rollout;
pub mod stream;
pub mod transport;
mod utils;
pub mod watch;

pub use client::*;
pub use config::*;
pub use constants::DEFAULT_MAX_UNIT_LENGTH;
pub use errors::*;
pub use event::*;
pub use metrics::*;
pub use rollout::*;
pub use stream::*;
pub use watch::*;


//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
