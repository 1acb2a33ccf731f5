use std::io;

use futures::stream::BoxStream;
use futures::StreamExt;
use futures::TryStreamExt;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::framing::Unit;
use super::framing::UnitCodec;
use crate::decode_unit;
use crate::transport::ByteStream;
use crate::transport::StreamOpener;
use crate::ChangeEvent;
use crate::RawRecord;
use crate::WatchError;

/// Lazy, non-restartable sequence of decoded change events.
///
/// Items are either events or errors. Recoverable errors
/// ([`WatchError::is_recoverable`]) describe a single unit and the sequence
/// goes on; any other error is the last item. Dropping the stream drops the
/// underlying connection.
pub type EventStream = BoxStream<'static, std::result::Result<ChangeEvent<RawRecord>, WatchError>>;

/// Frames and decodes a raw response body.
pub fn decode_events(
    body: ByteStream,
    max_unit_length: usize,
) -> EventStream {
    let reader = StreamReader::new(body.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));

    FramedRead::new(reader, UnitCodec::new(max_unit_length))
        .filter_map(move |unit| async move {
            match unit {
                Ok(Unit::Line(line)) => decode_unit(&line).transpose(),
                Ok(Unit::Oversized(len)) => Some(Err(WatchError::Decode {
                    reason: format!("unit of {len} bytes exceeds the {max_unit_length} byte limit"),
                })),
                Err(e) => Some(Err(into_watch_error(e))),
            }
        })
        .boxed()
}

/// Opens `url` through `opener` and decodes its body.
///
/// Suspends until the connection is established; events then arrive lazily.
pub async fn open_events(
    opener: &dyn StreamOpener,
    url: &str,
    max_unit_length: usize,
) -> std::result::Result<EventStream, WatchError> {
    let body = opener.open(url).await?;
    debug!(url, "Decoding watch stream");
    Ok(decode_events(body, max_unit_length))
}

/// Recovers the transport error that was tunnelled through `io::Error`.
fn into_watch_error(err: io::Error) -> WatchError {
    let message = err.to_string();
    match err.into_inner().map(|inner| inner.downcast::<WatchError>()) {
        Some(Ok(watch_error)) => *watch_error,
        _ => WatchError::Transport(message),
    }
}
