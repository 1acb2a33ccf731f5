//! Watch controllers
//!
//! Each controller owns one [`Subscription`](subscription::Subscription): a
//! task that opens a stream, decodes it and folds every event into state
//! published on a `tokio::sync::watch` channel.
//!
//! ```text
//! StreamOpener ─> EventStream ─> task ─> Guarded<core> ─> watch::Sender<State>
//!                                                              │
//!                                consumers: state() / changes() / updates()
//! ```
//!
//! - [`EntityWatch`]: latest value of one resource, equality-suppressed,
//!   with optional staleness
//! - [`ListWatch`]: identity-keyed ordered collection seeded by a baseline
//!
//! Unsubscribing (explicitly or by dropping the controller) releases the core
//! before cancelling the task, so no state changes once it has returned.
//! Streams are never reopened; callers subscribe again.

mod entity;
mod list;
mod loading;
mod reconcile;
mod staleness;
mod subscription;

pub use entity::*;
pub use list::*;
pub use loading::*;
pub use reconcile::*;
pub use subscription::ConnectionState;

#[cfg(test)]
mod staleness_test;

use std::sync::Arc;
use std::time::Duration;

use crate::constants::DEFAULT_MAX_UNIT_LENGTH;
use crate::RawRecord;
use crate::WatchError;

/// Maps a raw stream record to the watched entity
pub type Extractor<T> = Arc<dyn Fn(RawRecord) -> std::result::Result<T, WatchError> + Send + Sync>;

/// `true` when two values are observably the same
pub type Equality<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Stable key of a list entry
pub type Identity<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Per-subscription tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Mark an entity stale after this long without a change
    pub stale_after: Option<Duration>,
    /// Longest accepted stream unit in bytes
    pub max_unit_length: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            stale_after: None,
            max_unit_length: DEFAULT_MAX_UNIT_LENGTH,
        }
    }
}

impl WatchOptions {
    pub fn with_stale_after(
        mut self,
        stale_after: Option<Duration>,
    ) -> Self {
        self.stale_after = stale_after;
        self
    }
}
