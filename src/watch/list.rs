use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::subscription::Guarded;
use super::subscription::Subscription;
use super::subscription::WatchCore;
use super::ConnectionState;
use super::Extractor;
use super::Identity;
use super::LoadingTracker;
use super::Reconciler;
use super::WatchOptions;
use crate::constants::LIST_CONTROLLER;
use crate::transport::StreamOpener;
use crate::ChangeEvent;
use crate::FetchError;
use crate::RawRecord;
use crate::WatchError;

/// Snapshot of a list watch
#[derive(Debug, Clone)]
pub struct ListState<T> {
    /// Entries in insertion order, unique by identity
    pub items: Vec<T>,
    /// No baseline has been applied yet
    pub loading: bool,
    pub connection: ConnectionState,
    /// Last baseline fetch failure, cleared by the next successful baseline
    pub fetch_error: Option<String>,
}

impl<T> ListState<T> {
    fn initial() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            connection: ConnectionState::Connecting,
            fetch_error: None,
        }
    }
}

struct ListCore<T, K> {
    state: watch::Sender<ListState<T>>,
    reconciler: Reconciler<T, K>,
    extract: Extractor<T>,
    loading: LoadingTracker,
    /// Baseline fetches in flight
    pending_fetches: usize,
    /// Events applied since the oldest in-flight fetch started
    journal: Vec<ChangeEvent<T>>,
}

impl<T, K> ListCore<T, K>
where
    T: Clone,
    K: Eq + Hash + std::fmt::Debug,
{
    fn replace(
        &mut self,
        baseline: Vec<T>,
    ) -> usize {
        let mut items = self.reconciler.dedupe(baseline);
        // The snapshot may predate events already folded in; replaying them
        // in arrival order leaves every touched identity at its latest state.
        for event in &self.journal {
            self.reconciler.apply(&mut items, event.clone());
        }
        let len = items.len();
        self.loading.mark_loaded();
        let loading = self.loading.is_loading();

        self.state.send_modify(|state| {
            state.items = items;
            state.loading = loading;
            state.fetch_error = None;
        });
        len
    }

    fn record_fetch_error(
        &mut self,
        reason: String,
    ) {
        self.state.send_modify(|state| state.fetch_error = Some(reason));
    }

    fn begin_fetch(&mut self) {
        self.pending_fetches += 1;
    }
}

impl<T, K> WatchCore for ListCore<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Eq + Hash + std::fmt::Debug + 'static,
{
    fn apply(
        &mut self,
        event: ChangeEvent<RawRecord>,
    ) -> std::result::Result<bool, WatchError> {
        let extract = &self.extract;
        let event = event.try_map(|record| extract(record))?;
        if self.pending_fetches > 0 {
            self.journal.push(event.clone());
        }

        let reconciler = &self.reconciler;
        Ok(self
            .state
            .send_if_modified(|state| reconciler.apply(&mut state.items, event)))
    }

    fn set_connection(
        &mut self,
        connection: ConnectionState,
    ) {
        self.state.send_if_modified(|state| {
            if state.connection == connection {
                return false;
            }
            state.connection = connection;
            true
        });
    }
}

/// Keeps an identity-keyed collection in sync with a watch stream.
///
/// A baseline from a one-shot fetch replaces the list wholesale; stream
/// events fold on top of whatever is held. Events that arrive before any
/// baseline are applied to the empty list, and the list stays loading until
/// a baseline lands. Events received while [`load_baseline`] is awaiting
/// its fetch are replayed on top of the fetched snapshot, so subscribing
/// first and fetching second loses nothing the stream delivered.
///
/// [`load_baseline`]: ListWatch::load_baseline
///
/// Dropping the controller unsubscribes.
pub struct ListWatch<T, K = String> {
    core: Guarded<ListCore<T, K>>,
    state: watch::Receiver<ListState<T>>,
    subscription: Subscription,
}

impl<T, K> ListWatch<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Eq + Hash + std::fmt::Debug + Send + 'static,
{
    /// Starts watching `url`, optionally seeded with `baseline`.
    ///
    /// # Panics
    /// Outside of a tokio runtime.
    pub fn subscribe(
        opener: Arc<dyn StreamOpener>,
        url: impl Into<String>,
        identity: Identity<T, K>,
        extract: Extractor<T>,
        baseline: Option<Vec<T>>,
        options: WatchOptions,
    ) -> Self {
        let (sender, state) = watch::channel(ListState::initial());
        let mut list = ListCore {
            state: sender,
            reconciler: Reconciler::new(identity),
            extract,
            loading: LoadingTracker::new(),
            pending_fetches: 0,
            journal: Vec::new(),
        };
        if let Some(baseline) = baseline {
            list.replace(baseline);
        }

        let core = Guarded::new(list);
        let subscription = Subscription::spawn(
            opener,
            url.into(),
            options.max_unit_length,
            LIST_CONTROLLER,
            core.clone(),
        );

        Self {
            core,
            state,
            subscription,
        }
    }

    /// Replaces the working list wholesale.
    ///
    /// While a [`load_baseline`](ListWatch::load_baseline) is in flight,
    /// events it has journalled are replayed on top.
    ///
    /// Returns the number of entries held afterwards, or `None` once
    /// unsubscribed.
    pub fn set_baseline(
        &self,
        baseline: Vec<T>,
    ) -> Option<usize> {
        let len = self.core.with(|c| c.replace(baseline))?;
        info!(subscription_id = %self.subscription.id(), len, "Baseline applied");
        Some(len)
    }

    /// Awaits `fetch` and applies its result as the new baseline.
    ///
    /// On failure the held items and the loading flag are left alone, the
    /// reason is recorded in [`ListState::fetch_error`] and the error is
    /// returned. The fetch is abandoned if the controller is unsubscribed
    /// meanwhile.
    ///
    /// Stream events applied while the fetch is pending are replayed on top
    /// of its result. This assumes the stream delivers every change in
    /// order; a change the stream never carried cannot be recovered.
    pub async fn load_baseline<F>(
        &self,
        fetch: F,
    ) -> std::result::Result<usize, FetchError>
    where
        F: Future<Output = std::result::Result<Vec<T>, FetchError>>,
    {
        let cancelled = self.subscription.child_token();
        let _pending = PendingFetch::begin(&self.core);
        let fetched = tokio::select! {
            biased;
            _ = cancelled.cancelled() => None,
            fetched = fetch => Some(fetched),
        };

        self.finish_baseline(fetched)
    }

    fn finish_baseline(
        &self,
        fetched: Option<std::result::Result<Vec<T>, FetchError>>,
    ) -> std::result::Result<usize, FetchError> {
        let cancelled_error = || FetchError::Cancelled {
            url: self.subscription.url().to_string(),
        };

        match fetched {
            None => Err(cancelled_error()),
            Some(Ok(baseline)) => self.set_baseline(baseline).ok_or_else(cancelled_error),
            Some(Err(e)) => {
                error!(subscription_id = %self.subscription.id(), "Baseline fetch failed: {}", e);
                self.core.with(|c| c.record_fetch_error(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn state(&self) -> ListState<T> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.borrow().connection.clone()
    }

    /// Receiver notified on every state change.
    pub fn changes(&self) -> watch::Receiver<ListState<T>> {
        self.state.clone()
    }

    /// State snapshots as a stream, starting with the current one.
    pub fn updates(&self) -> WatchStream<ListState<T>> {
        WatchStream::new(self.state.clone())
    }

    pub fn id(&self) -> &str {
        self.subscription.id()
    }

    pub fn url(&self) -> &str {
        self.subscription.url()
    }

    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed()
    }

    /// Closes the stream. Later calls are no-ops and return `false`.
    pub fn unsubscribe(&self) -> bool {
        let closed = self.subscription.close();
        if closed {
            debug!(subscription_id = %self.subscription.id(), "List watch closed");
        }
        closed
    }
}

/// Keeps the event journal open for one baseline fetch; closes it even when
/// the fetch future is dropped half-way.
struct PendingFetch<'a, T, K> {
    core: &'a Guarded<ListCore<T, K>>,
}

impl<'a, T, K> PendingFetch<'a, T, K>
where
    T: Clone,
    K: Eq + Hash + std::fmt::Debug,
{
    fn begin(core: &'a Guarded<ListCore<T, K>>) -> Self {
        core.with(|c| c.begin_fetch());
        Self { core }
    }
}

impl<T, K> Drop for PendingFetch<'_, T, K> {
    fn drop(&mut self) {
        self.core.with(|c| {
            c.pending_fetches = c.pending_fetches.saturating_sub(1);
            if c.pending_fetches == 0 {
                c.journal.clear();
            }
        });
    }
}
