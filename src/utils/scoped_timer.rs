use tokio::time::Instant;
use tracing::trace;

/// Logs how long a one-shot request took once it goes out of scope.
pub(crate) struct ScopedTimer {
    start: Instant,
    name: &'static str,
    url: String,
}

impl ScopedTimer {
    pub(crate) fn new(
        name: &'static str,
        url: &str,
    ) -> Self {
        Self {
            start: Instant::now(),
            name,
            url: url.to_string(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        trace!(target: "timing", url = %self.url, "[TIMING] {} took {} ms", self.name, elapsed.as_millis());
    }
}
