use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::staleness::StalenessTimer;
use super::subscription::Guarded;
use super::subscription::Subscription;
use super::subscription::WatchCore;
use super::ConnectionState;
use super::Equality;
use super::Extractor;
use super::LoadingTracker;
use super::WatchOptions;
use crate::constants::ENTITY_CONTROLLER;
use crate::transport::StreamOpener;
use crate::ChangeEvent;
use crate::ChangeKind;
use crate::RawRecord;
use crate::WatchError;

/// Snapshot of a single-entity watch
#[derive(Debug)]
pub struct EntityState<T> {
    /// Latest value; `None` until one arrived or after a DELETED event
    pub entity: Option<Arc<T>>,
    /// No value has been produced yet
    pub loading: bool,
    /// No state-changing event within the staleness window
    pub stale: bool,
    pub connection: ConnectionState,
}

impl<T> Clone for EntityState<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            loading: self.loading,
            stale: self.stale,
            connection: self.connection.clone(),
        }
    }
}

impl<T> EntityState<T> {
    fn initial() -> Self {
        Self {
            entity: None,
            loading: true,
            stale: false,
            connection: ConnectionState::Connecting,
        }
    }
}

struct EntityCore<T> {
    state: watch::Sender<EntityState<T>>,
    extract: Extractor<T>,
    equality: Equality<T>,
    loading: LoadingTracker,
    staleness: Option<StalenessTimer>,
}

impl<T: Send + Sync + 'static> EntityCore<T> {
    /// Offers a new value; ignored when equal to the current one.
    fn offer(
        &mut self,
        value: T,
    ) -> bool {
        let equality = &self.equality;
        let loading = &mut self.loading;

        let changed = self.state.send_if_modified(|state| {
            if let Some(current) = state.entity.as_deref() {
                if equality(current, &value) {
                    return false;
                }
            }
            loading.mark_loaded();
            state.entity = Some(Arc::new(value));
            state.loading = loading.is_loading();
            state.stale = false;
            true
        });

        if changed {
            self.touch();
        }
        changed
    }

    fn clear(&mut self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if state.entity.is_none() {
                return false;
            }
            state.entity = None;
            state.stale = false;
            true
        });

        if changed {
            self.touch();
        }
        changed
    }

    fn touch(&self) {
        if let Some(timer) = &self.staleness {
            timer.touch();
        }
    }

    fn mark_stale(&self) {
        self.state.send_if_modified(|state| {
            if state.stale {
                return false;
            }
            state.stale = true;
            true
        });
    }
}

impl<T: Send + Sync + 'static> WatchCore for EntityCore<T> {
    fn apply(
        &mut self,
        event: ChangeEvent<RawRecord>,
    ) -> std::result::Result<bool, WatchError> {
        match event.kind {
            ChangeKind::Deleted => Ok(self.clear()),
            ChangeKind::Added | ChangeKind::Modified => {
                let value = (self.extract)(event.payload)?;
                Ok(self.offer(value))
            }
        }
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

/// Keeps the latest value of one resource in sync with its watch stream.
///
/// Updates pass through the equality predicate: an incoming value equal to
/// the held one leaves the held `Arc` untouched, notifies nobody and does
/// not restart the staleness window.
///
/// Dropping the controller unsubscribes.
pub struct EntityWatch<T> {
    core: Guarded<EntityCore<T>>,
    state: watch::Receiver<EntityState<T>>,
    subscription: Subscription,
}

impl<T> EntityWatch<T>
where
    T: Send + Sync + 'static,
{
    /// Starts watching `url`.
    ///
    /// Returns at once in the loading state; the connection is opened in the
    /// background.
    ///
    /// # Panics
    /// Outside of a tokio runtime.
    pub fn subscribe(
        opener: Arc<dyn StreamOpener>,
        url: impl Into<String>,
        extract: Extractor<T>,
        equality: Equality<T>,
        options: WatchOptions,
    ) -> Self {
        let (sender, state) = watch::channel(EntityState::initial());
        let core = Guarded::new(EntityCore {
            state: sender,
            extract,
            equality,
            loading: LoadingTracker::new(),
            staleness: None,
        });

        // Armed before the stream task exists so the first event restarts it.
        let token = CancellationToken::new();
        if let Some(window) = options.stale_after {
            let stale_core = core.clone();
            let timer = StalenessTimer::spawn(window, token.child_token(), move || {
                stale_core.with(|c| c.mark_stale());
            });
            core.with(|c| c.staleness = Some(timer));
        }

        let subscription = Subscription::spawn_with_token(
            opener,
            url.into(),
            options.max_unit_length,
            ENTITY_CONTROLLER,
            core.clone(),
            token,
        );

        Self {
            core,
            state,
            subscription,
        }
    }

    /// Seeds a value obtained out of band, e.g. from a one-shot fetch.
    ///
    /// Goes through the same equality path as streamed values. Returns
    /// whether the held value changed; always `false` once unsubscribed.
    pub fn seed(
        &self,
        value: T,
    ) -> bool {
        let changed = self.core.with(|c| c.offer(value)).unwrap_or(false);
        debug!(subscription_id = %self.subscription.id(), changed, "Seeded entity");
        changed
    }

    pub fn state(&self) -> EntityState<T> {
        self.state.borrow().clone()
    }

    pub fn entity(&self) -> Option<Arc<T>> {
        self.state.borrow().entity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_stale(&self) -> bool {
        self.state.borrow().stale
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.borrow().connection.clone()
    }

    /// Receiver notified on every state change.
    ///
    /// `changed()` returns an error once the controller is unsubscribed.
    pub fn changes(&self) -> watch::Receiver<EntityState<T>> {
        self.state.clone()
    }

    /// State snapshots as a stream, starting with the current one.
    pub fn updates(&self) -> WatchStream<EntityState<T>> {
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
        self.subscription.close()
    }
}
