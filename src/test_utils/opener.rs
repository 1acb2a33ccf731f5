use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::transport::ByteStream;
use crate::transport::StreamOpener;
use crate::WatchError;

/// Test side of a [`ChannelOpener`] stream
#[derive(Clone)]
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<std::result::Result<Bytes, WatchError>>,
}

impl StreamFeed {
    /// Sends `{"result": record}` as one unit.
    pub fn result(
        &self,
        record: Value,
    ) {
        self.raw(&format!("{}\n", serde_json::json!({ "result": record })));
    }

    /// Sends `{"result": {"type": kind, <field>: entity}}` as one unit.
    pub fn event(
        &self,
        kind: &str,
        field: &str,
        entity: Value,
    ) {
        let mut record = serde_json::Map::new();
        record.insert("type".to_string(), Value::String(kind.to_string()));
        record.insert(field.to_string(), entity);
        self.result(Value::Object(record));
    }

    /// Sends bytes verbatim.
    pub fn raw(
        &self,
        chunk: &str,
    ) {
        let _ = self.tx.send(Ok(Bytes::copy_from_slice(chunk.as_bytes())));
    }

    pub fn fail(
        &self,
        error: WatchError,
    ) {
        let _ = self.tx.send(Err(error));
    }

    /// Whether the consuming side dropped the stream.
    pub fn is_released(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Opener handing out one channel-backed stream
///
/// Further opens fail with [`WatchError::ConnectFailed`]. Dropping every
/// [`StreamFeed`] ends the stream cleanly.
pub struct ChannelOpener {
    stream: Mutex<Option<ByteStream>>,
    opens: AtomicUsize,
}

impl ChannelOpener {
    pub fn new() -> (Arc<Self>, StreamFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let opener = Arc::new(Self {
            stream: Mutex::new(Some(UnboundedReceiverStream::new(rx).boxed())),
            opens: AtomicUsize::new(0),
        });
        (opener, StreamFeed { tx })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StreamOpener for ChannelOpener {
    async fn open(
        &self,
        url: &str,
    ) -> std::result::Result<ByteStream, WatchError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.stream.lock().take().ok_or_else(|| WatchError::ConnectFailed {
            url: url.to_string(),
            reason: "stream already opened".to_string(),
        })
    }
}

/// Opener whose connect never completes
///
/// Records whether the pending connect was abandoned.
#[derive(Default)]
pub struct PendingOpener {
    started: Arc<AtomicBool>,
    abandoned: Arc<AtomicBool>,
}

struct AbandonGuard(Arc<AtomicBool>);

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl PendingOpener {
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StreamOpener for PendingOpener {
    async fn open(
        &self,
        _url: &str,
    ) -> std::result::Result<ByteStream, WatchError> {
        self.started.store(true, Ordering::SeqCst);
        let _guard = AbandonGuard(self.abandoned.clone());
        futures::future::pending::<()>().await;
        unreachable!("pending future resolved")
    }
}

/// Polls `check` on the runtime until it holds or `timeout` elapses.
pub async fn wait_until(
    timeout: std::time::Duration,
    mut check: impl FnMut() -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    check()
}
