use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Marks a subscription stale when no state-changing event arrives within
/// `window`.
///
/// The window starts at creation and restarts on every [`touch`]. Being
/// stale never closes anything; the timer just waits for the next change
/// and arms again.
///
/// The countdown runs on its own task, which exits when `token` is cancelled
/// or the timer is dropped.
///
/// [`touch`]: StalenessTimer::touch
pub(crate) struct StalenessTimer {
    last_change: watch::Sender<Instant>,
}

impl StalenessTimer {
    pub(crate) fn spawn(
        window: Duration,
        token: CancellationToken,
        on_stale: impl Fn() + Send + 'static,
    ) -> Self {
        let (last_change, mut changes) = watch::channel(Instant::now());

        tokio::spawn(async move {
            loop {
                let deadline = *changes.borrow_and_update() + window;

                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        debug!(?window, "No change within staleness window");
                        on_stale();

                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return,
                            changed = changes.changed() => {
                                if changed.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });

        Self { last_change }
    }

    /// Restarts the window from now.
    pub(crate) fn touch(&self) {
        self.last_change.send_replace(Instant::now());
    }
}
