//! Streaming HTTP server standing in for the rollouts API
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::hyper::Body;
use warp::Filter;

/// Server side of one watch stream
pub struct StreamSender {
    tx: mpsc::UnboundedSender<String>,
}

impl StreamSender {
    pub fn event(
        &self,
        kind: &str,
        info: Value,
    ) {
        self.line(json!({"result": {"type": kind, "rolloutInfo": info}}));
    }

    pub fn line(
        &self,
        unit: Value,
    ) {
        self.raw(format!("{unit}\n"));
    }

    pub fn raw(
        &self,
        chunk: impl Into<String>,
    ) {
        let _ = self.tx.send(chunk.into());
    }
}

type StreamSlot = Arc<Mutex<Option<mpsc::UnboundedReceiver<String>>>>;

fn stream_slot() -> (StreamSender, StreamSlot) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StreamSender { tx }, Arc::new(Mutex::new(Some(rx))))
}

fn stream_body(slot: &StreamSlot) -> warp::http::Response<Body> {
    let body = match slot.lock().unwrap().take() {
        Some(rx) => Body::wrap_stream(UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>)),
        None => Body::empty(),
    };
    warp::http::Response::new(body)
}

pub struct RolloutServer {
    pub addr: SocketAddr,
    pub list_stream: StreamSender,
    pub rollout_stream: StreamSender,
}

impl RolloutServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Serves namespace `default`:
/// - `/info` answers with `baseline`
/// - `/info/watch` and `/demo/info/watch` stream whatever the returned
///   senders push, one connection each
///
/// Every other path is a 404.
pub async fn start_server(baseline: Vec<Value>) -> RolloutServer {
    let (list_stream, list_slot) = stream_slot();
    let (rollout_stream, rollout_slot) = stream_slot();

    let list = warp::path!("api" / "v1" / "rollouts" / "default" / "info")
        .map(move || warp::reply::json(&json!({ "rollouts": baseline })));
    let list_watch = warp::path!("api" / "v1" / "rollouts" / "default" / "info" / "watch")
        .map(move || stream_body(&list_slot));
    let rollout_watch = warp::path!("api" / "v1" / "rollouts" / "default" / "demo" / "info" / "watch")
        .map(move || stream_body(&rollout_slot));

    let routes = warp::get().and(list.or(list_watch).or(rollout_watch));
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    RolloutServer {
        addr,
        list_stream,
        rollout_stream,
    }
}

pub fn rollout(
    name: &str,
    resource_version: &str,
) -> Value {
    json!({
        "objectMeta": {"name": name, "namespace": "default", "resourceVersion": resource_version},
        "status": "Healthy",
    })
}

pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
