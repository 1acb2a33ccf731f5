//! Prometheus instrumentation for watch subscriptions
//!
//! Collectors are created lazily and registered into [`REGISTRY`] on first
//! use of [`gather_metrics`]. Applications exposing their own registry can
//! call [`register_watch_metrics`] instead.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

lazy_static! {
    /// Change events folded into controller state, by controller and change kind
    pub static ref WATCH_EVENTS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events_applied", "Change events applied to watch state"),
        &["controller", "kind"]
    )
    .expect("metric can not be created");

    /// Stream units skipped because they could not be decoded
    pub static ref WATCH_DECODE_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_decode_errors", "Stream units skipped after a decode failure"),
        &["controller"]
    )
    .expect("metric can not be created");

    /// Streams that ended without being closed locally
    pub static ref WATCH_CONNECTION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_connection_failures", "Watch connections lost or never established"),
        &["controller"]
    )
    .expect("metric can not be created");

    /// Subscriptions created and not yet released
    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge =
        IntGauge::new("watch_active_subscriptions", "Watch subscriptions currently held")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

/// Registers every watch collector into `registry`.
pub fn register_watch_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(WATCH_EVENTS_APPLIED.clone()))?;
    registry.register(Box::new(WATCH_DECODE_ERRORS.clone()))?;
    registry.register(Box::new(WATCH_CONNECTION_FAILURES.clone()))?;
    registry.register(Box::new(ACTIVE_SUBSCRIPTIONS.clone()))?;
    Ok(())
}

/// Renders [`REGISTRY`] in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    REGISTER_ONCE.call_once(|| {
        if let Err(e) = register_watch_metrics(&REGISTRY) {
            error!("could not register watch metrics: {:?}", e);
        }
    });

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode watch metrics: {:?}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("watch metrics could not be from_utf8'd: {:?}", e);
        String::default()
    })
}
