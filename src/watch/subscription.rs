use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::open_events;
use crate::transport::StreamOpener;
use crate::ChangeEvent;
use crate::RawRecord;
use crate::WatchError;
use crate::ACTIVE_SUBSCRIPTIONS;
use crate::WATCH_CONNECTION_FAILURES;
use crate::WATCH_DECODE_ERRORS;
use crate::WATCH_EVENTS_APPLIED;

/// Health of the connection behind a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Stream open in progress
    Connecting,
    /// Events are being received
    Open,
    /// Server closed the stream cleanly. Re-subscribe to keep watching.
    Ended,
    /// Stream could not be opened or broke; carries the reason
    Failed(String),
}

impl ConnectionState {
    /// Whether events may still arrive.
    pub fn is_watching(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

/// Controller state behind one short critical section.
///
/// Once released, every later access is refused, so nothing mutates the
/// state after its subscription was closed.
pub(crate) struct Guarded<S> {
    inner: Arc<Mutex<Option<S>>>,
}

impl<S> Clone for Guarded<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> Guarded<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(state))),
        }
    }

    /// Runs `f` on the state; `None` once released.
    pub(crate) fn with<R>(
        &self,
        f: impl FnOnce(&mut S) -> R,
    ) -> Option<R> {
        self.inner.lock().as_mut().map(f)
    }

    pub(crate) fn release(&self) -> Option<S> {
        self.inner.lock().take()
    }
}

/// What the stream task folds events into
pub(crate) trait WatchCore: Send + 'static {
    /// Applies one decoded event. `Ok(true)` if the visible state changed.
    ///
    /// Errors must be recoverable ones: the event is skipped.
    fn apply(
        &mut self,
        event: ChangeEvent<RawRecord>,
    ) -> std::result::Result<bool, WatchError>;

    fn set_connection(
        &mut self,
        connection: ConnectionState,
    );
}

/// Exclusively owned open stream: the connection, its decode cursor and the
/// task folding events into controller state.
///
/// Released exactly once, by [`Subscription::close`] or on drop.
pub(crate) struct Subscription {
    id: String,
    url: String,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    release: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Spawns the task that opens `url` and drives events into `core`.
    ///
    /// Returns immediately; connecting happens on the task.
    ///
    /// # Panics
    /// Outside of a tokio runtime.
    pub(crate) fn spawn<C: WatchCore>(
        opener: Arc<dyn StreamOpener>,
        url: String,
        max_unit_length: usize,
        controller: &'static str,
        core: Guarded<C>,
    ) -> Self {
        Self::spawn_with_token(opener, url, max_unit_length, controller, core, CancellationToken::new())
    }

    /// Like [`spawn`](Subscription::spawn), cancelling `token` on close.
    ///
    /// Lets tasks tied to the subscription take child tokens before the
    /// stream task starts.
    pub(crate) fn spawn_with_token<C: WatchCore>(
        opener: Arc<dyn StreamOpener>,
        url: String,
        max_unit_length: usize,
        controller: &'static str,
        core: Guarded<C>,
        token: CancellationToken,
    ) -> Self {
        let id = nanoid::nanoid!();

        let task = tokio::spawn(drive(
            opener,
            url.clone(),
            max_unit_length,
            controller,
            id.clone(),
            token.clone(),
            core.clone(),
        ));

        ACTIVE_SUBSCRIPTIONS.inc();
        info!(subscription_id = %id, %url, controller, "Subscribed");

        Self {
            id,
            url,
            token,
            task: Mutex::new(Some(task)),
            release: Mutex::new(Some(Box::new(move || {
                core.release();
            }))),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Token cancelled together with this subscription.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.release.lock().is_none()
    }

    /// Releases the subscription. Only the first call has an effect; it
    /// returns `true`.
    ///
    /// State is released first, so no event is applied after this returns
    /// even if the task is mid-way through one.
    pub(crate) fn close(&self) -> bool {
        let Some(release) = self.release.lock().take() else {
            return false;
        };
        release();

        self.token.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }

        ACTIVE_SUBSCRIPTIONS.dec();
        info!(subscription_id = %self.id, url = %self.url, "Unsubscribed");
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.close() {
            trace!(subscription_id = %self.id, "Subscription released on drop");
        }
    }
}

async fn drive<C: WatchCore>(
    opener: Arc<dyn StreamOpener>,
    url: String,
    max_unit_length: usize,
    controller: &'static str,
    subscription_id: String,
    token: CancellationToken,
    core: Guarded<C>,
) {
    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        opened = open_events(opener.as_ref(), &url, max_unit_length) => opened,
    };

    let mut events = match opened {
        Ok(events) => events,
        Err(e) => {
            error!(%subscription_id, %url, "Watch stream could not be opened: {}", e);
            WATCH_CONNECTION_FAILURES.with_label_values(&[controller]).inc();
            core.with(|c| c.set_connection(ConnectionState::Failed(e.to_string())));
            return;
        }
    };

    debug!(%subscription_id, %url, "Watch stream connected");
    if core.with(|c| c.set_connection(ConnectionState::Open)).is_none() {
        return;
    }

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            next = events.next() => next,
        };

        match next {
            None => {
                info!(%subscription_id, %url, "Watch stream ended");
                core.with(|c| c.set_connection(ConnectionState::Ended));
                return;
            }
            Some(Ok(event)) => {
                let kind = event.kind;
                match core.with(|c| c.apply(event)) {
                    None => return,
                    Some(Ok(changed)) => {
                        WATCH_EVENTS_APPLIED
                            .with_label_values(&[controller, kind.as_str()])
                            .inc();
                        trace!(%subscription_id, kind = kind.as_str(), changed, "Event applied");
                    }
                    Some(Err(e)) => {
                        warn!(%subscription_id, kind = kind.as_str(), "Skipping event: {}", e);
                        WATCH_DECODE_ERRORS.with_label_values(&[controller]).inc();
                    }
                }
            }
            Some(Err(e)) if e.is_recoverable() => {
                warn!(%subscription_id, "Skipping stream unit: {}", e);
                WATCH_DECODE_ERRORS.with_label_values(&[controller]).inc();
            }
            Some(Err(e)) => {
                error!(%subscription_id, %url, "Watch stream failed: {}", e);
                WATCH_CONNECTION_FAILURES.with_label_values(&[controller]).inc();
                core.with(|c| c.set_connection(ConnectionState::Failed(e.to_string())));
                return;
            }
        }
    }
}
