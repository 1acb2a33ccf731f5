//! Change events and the wire envelope they arrive in.
//!
//! Every stream unit is one JSON document of the form
//!
//! ```text
//! {"result": {"type": "MODIFIED", "rolloutInfo": {...}}}
//! {"result": {"objectMeta": {...}, ...}}            // bare entity update
//! {"error":  {"code": 5, "message": "not found"}}
//! ```
//!
//! The outer object is decoded as a strictly tagged variant: anything that is
//! not exactly one `result` or `error` member is rejected.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::WatchError;

/// Envelope body of a `result` frame, with the change kind already removed.
pub type RawRecord = serde_json::Map<String, Value>;

/// Kind of change carried by a [`ChangeEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// Entity appeared
    Added,
    /// Entity changed (also used for bare entity updates without a kind)
    Modified,
    /// Entity went away
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "ADDED",
            ChangeKind::Modified => "MODIFIED",
            ChangeKind::Deleted => "DELETED",
        }
    }
}

/// A single change observed on a watch stream
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<T> {
    pub kind: ChangeKind,
    pub payload: T,
}

impl<T> ChangeEvent<T> {
    pub fn new(
        kind: ChangeKind,
        payload: T,
    ) -> Self {
        Self { kind, payload }
    }

    pub fn added(payload: T) -> Self {
        Self::new(ChangeKind::Added, payload)
    }

    pub fn modified(payload: T) -> Self {
        Self::new(ChangeKind::Modified, payload)
    }

    pub fn deleted(payload: T) -> Self {
        Self::new(ChangeKind::Deleted, payload)
    }

    /// Converts the payload, keeping the change kind.
    pub fn try_map<U, E>(
        self,
        f: impl FnOnce(T) -> std::result::Result<U, E>,
    ) -> std::result::Result<ChangeEvent<U>, E> {
        Ok(ChangeEvent {
            kind: self.kind,
            payload: f(self.payload)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StreamFrame {
    Result(RawRecord),
    Error(UpstreamStatus),
}

#[derive(Debug, Deserialize)]
struct UpstreamStatus {
    #[serde(default, alias = "grpc_code")]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Decodes one framing unit.
///
/// Returns `Ok(None)` for blank units (keep-alives), a recoverable
/// [`WatchError::Decode`] for anything malformed and [`WatchError::Upstream`]
/// when the server reported an error in place of a result.
pub fn decode_unit(unit: &[u8]) -> std::result::Result<Option<ChangeEvent<RawRecord>>, WatchError> {
    let text = std::str::from_utf8(unit).map_err(|e| WatchError::Decode {
        reason: format!("invalid utf-8: {e}"),
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let frame: StreamFrame = serde_json::from_str(text).map_err(|e| WatchError::Decode {
        reason: e.to_string(),
    })?;

    match frame {
        StreamFrame::Error(status) => Err(WatchError::Upstream {
            code: status.code,
            message: status.message,
        }),
        StreamFrame::Result(mut record) => {
            let kind = match record.remove("type") {
                None => ChangeKind::Modified,
                Some(kind) => serde_json::from_value(kind).map_err(|e| WatchError::Decode {
                    reason: format!("invalid change type: {e}"),
                })?,
            };
            Ok(Some(ChangeEvent::new(kind, record)))
        }
    }
}

/// Extractor that reads the entity from one named envelope member,
/// e.g. `rolloutInfo` on list watch streams.
pub fn field_extractor<T>(
    field: &'static str
) -> impl Fn(RawRecord) -> std::result::Result<T, WatchError> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
{
    move |mut record: RawRecord| {
        let value = record
            .remove(field)
            .ok_or_else(|| WatchError::Extract(format!("missing field `{field}`")))?;
        serde_json::from_value(value).map_err(|e| WatchError::Extract(e.to_string()))
    }
}

/// Extractor that treats the whole envelope body as the entity.
pub fn record_extractor<T>() -> impl Fn(RawRecord) -> std::result::Result<T, WatchError> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
{
    |record: RawRecord| {
        serde_json::from_value(Value::Object(record)).map_err(|e| WatchError::Extract(e.to_string()))
    }
}
