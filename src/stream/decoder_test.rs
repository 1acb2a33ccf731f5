use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use serde_json::json;

use super::*;
use crate::transport::MockStreamOpener;
use crate::ChangeKind;
use crate::WatchError;

fn body(chunks: Vec<std::result::Result<&'static str, WatchError>>) -> crate::transport::ByteStream {
    stream::iter(chunks.into_iter().map(|c| c.map(|s| Bytes::from_static(s.as_bytes())))).boxed()
}

#[tokio::test]
async fn test_decode_events_across_chunk_boundaries() {
    let mut events = decode_events(
        body(vec![
            Ok(r#"{"result":{"type":"ADDED","rolloutInfo":{"id":1}}}"#),
            Ok("\n{\"result\":{\"type\":\"MODI"),
            Ok("FIED\",\"rolloutInfo\":{\"id\":1,\"rev\":2}}}\n"),
        ]),
        1024,
    );

    let first = events.next().await.unwrap().unwrap();
    assert_eq!(first.kind, ChangeKind::Added);
    assert_eq!(first.payload["rolloutInfo"], json!({"id": 1}));

    let second = events.next().await.unwrap().unwrap();
    assert_eq!(second.kind, ChangeKind::Modified);
    assert_eq!(second.payload["rolloutInfo"], json!({"id": 1, "rev": 2}));

    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn test_malformed_unit_does_not_end_sequence() {
    let mut events = decode_events(
        body(vec![Ok(concat!(
            "{\"result\":{\"type\":\"ADDED\",\"id\":1}}\n",
            "{garbage\n",
            "\n",
            "{\"result\":{\"type\":\"MODIFIED\",\"id\":1}}\n",
        ))]),
        1024,
    );

    assert_eq!(events.next().await.unwrap().unwrap().kind, ChangeKind::Added);
    let err = events.next().await.unwrap().unwrap_err();
    assert!(err.is_recoverable());
    // Blank keep-alive lines produce nothing
    assert_eq!(events.next().await.unwrap().unwrap().kind, ChangeKind::Modified);
    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn test_oversized_unit_reported_as_decode_error() {
    let mut events = decode_events(
        body(vec![Ok(concat!(
            "{\"result\":{\"padding\":\"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx\"}}\n",
            "{\"result\":{\"id\":2}}\n",
        ))]),
        24,
    );

    match events.next().await.unwrap() {
        Err(WatchError::Decode { reason }) => assert!(reason.contains("exceeds")),
        other => panic!("Expected decode error, got {other:?}"),
    }
    assert_eq!(events.next().await.unwrap().unwrap().payload["id"], json!(2));
}

#[tokio::test]
async fn test_transport_error_is_last_item() {
    let mut events = decode_events(
        body(vec![
            Ok("{\"result\":{\"id\":1}}\n"),
            Err(WatchError::Transport("connection reset".to_string())),
            Ok("{\"result\":{\"id\":2}}\n"),
        ]),
        1024,
    );

    assert!(events.next().await.unwrap().is_ok());
    let err = events.next().await.unwrap().unwrap_err();
    assert_eq!(err, WatchError::Transport("connection reset".to_string()));
    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn test_upstream_error_frame_is_not_recoverable() {
    let mut events = decode_events(
        body(vec![Ok("{\"error\":{\"code\":14,\"message\":\"unavailable\"}}\n")]),
        1024,
    );

    let err = events.next().await.unwrap().unwrap_err();
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_open_events_propagates_connect_failure() {
    let mut opener = MockStreamOpener::new();
    opener.expect_open().times(1).returning(|url| {
        Err(WatchError::ConnectFailed {
            url: url.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    });

    let result = open_events(&opener, "http://localhost/watch", 1024).await;
    assert!(matches!(result, Err(WatchError::ConnectFailed { .. })));
}

#[tokio::test]
async fn test_open_events_decodes_opened_body() {
    let mut opener = MockStreamOpener::new();
    opener
        .expect_open()
        .withf(|url| url == "http://localhost/watch")
        .times(1)
        .returning(|_| Ok(body(vec![Ok("{\"result\":{\"type\":\"DELETED\",\"id\":3}}\n")])));

    let mut events = open_events(&opener, "http://localhost/watch", 1024).await.unwrap();
    assert_eq!(events.next().await.unwrap().unwrap().kind, ChangeKind::Deleted);
}
