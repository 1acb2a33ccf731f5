//! Rollout API bindings
//!
//! Paths served by the rollouts dashboard API:
//!
//! ```text
//! GET /api/v1/rollouts/{namespace}/info                one-shot list {"rollouts": [...]}
//! GET /api/v1/rollouts/{namespace}/info/watch          {"result": {"type": ..., "rolloutInfo": {...}}}
//! GET /api/v1/rollouts/{namespace}/{name}/info/watch   {"result": {...rollout info...}}
//! ```


use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::warn;

use crate::constants::ROLLOUTS_API_PREFIX;
use crate::constants::ROLLOUT_INFO_FIELD;
use crate::field_extractor;
use crate::record_extractor;
use crate::EntityWatch;
use crate::Equality;
use crate::Extractor;
use crate::FetchError;
use crate::Identity;
use crate::ListWatch;
use crate::RawRecord;
use crate::WatchClient;
use crate::WatchError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Dashboard summary of one rollout
///
/// Only the fields the watch logic reads are typed; everything else is kept
/// in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_meta: Option<ObjectMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_weight: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RolloutInfo {
    pub fn name(&self) -> Option<&str> {
        self.object_meta.as_ref()?.name.as_deref()
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.object_meta.as_ref()?.resource_version.as_deref()
    }

    /// Same observable revision.
    ///
    /// Missing metadata or resource versions never compare equal, so the
    /// newer value always replaces the held one.
    pub fn same_revision(
        &self,
        other: &RolloutInfo,
    ) -> bool {
        match (self.resource_version(), other.resource_version()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Identity of a rollout across a list watch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RolloutKey {
    pub namespace: String,
    pub name: String,
}

impl RolloutKey {
    /// Key of `info`, using `default_namespace` when the metadata has none.
    pub fn of(
        info: &RolloutInfo,
        default_namespace: &str,
    ) -> Self {
        let meta = info.object_meta.as_ref();
        Self {
            namespace: meta
                .and_then(|m| m.namespace.clone())
                .unwrap_or_else(|| default_namespace.to_string()),
            name: meta.and_then(|m| m.name.clone()).unwrap_or_default(),
        }
    }
}

/// Rejects records that do not name a rollout, so they are skipped like
/// any other undecodable unit.
fn named(info: RolloutInfo) -> std::result::Result<RolloutInfo, WatchError> {
    match info.name() {
        Some(_) => Ok(info),
        None => Err(WatchError::Extract("rollout record without objectMeta.name".to_string())),
    }
}

/// Extractor for single rollout streams, whose records are the rollout itself.
pub fn rollout_extractor() -> Extractor<RolloutInfo> {
    let extract = record_extractor::<RolloutInfo>();
    Arc::new(move |record: RawRecord| extract(record).and_then(named))
}

/// Extractor for namespace streams, which wrap each rollout in `rolloutInfo`.
pub fn rollout_list_extractor() -> Extractor<RolloutInfo> {
    let extract = field_extractor::<RolloutInfo>(ROLLOUT_INFO_FIELD);
    Arc::new(move |record: RawRecord| extract(record).and_then(named))
}

/// Body of the one-shot list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolloutInfoList {
    #[serde(default)]
    pub rollouts: Option<Vec<RolloutInfo>>,
}

pub type RolloutListWatch = ListWatch<RolloutInfo, RolloutKey>;

pub fn list_path(namespace: &str) -> String {
    format!("{ROLLOUTS_API_PREFIX}/{namespace}/info")
}

pub fn watch_all_path(namespace: &str) -> String {
    format!("{ROLLOUTS_API_PREFIX}/{namespace}/info/watch")
}

pub fn watch_path(
    namespace: &str,
    name: &str,
) -> String {
    format!("{ROLLOUTS_API_PREFIX}/{namespace}/{name}/info/watch")
}

/// Rollout API scoped to one namespace
#[derive(Clone)]
pub struct RolloutClient {
    client: WatchClient,
    namespace: String,
}

impl RolloutClient {
    pub(crate) fn new(
        client: WatchClient,
        namespace: String,
    ) -> Self {
        Self { client, namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fetches every rollout in the namespace. A response without a
    /// `rollouts` member is an empty list.
    pub async fn list(&self) -> std::result::Result<Vec<RolloutInfo>, FetchError> {
        let list: RolloutInfoList = self.client.fetch(&list_path(&self.namespace)).await?;
        Ok(list.rollouts.unwrap_or_default())
    }

    /// Watches every rollout in the namespace.
    ///
    /// The stream is subscribed before the baseline is fetched, and events
    /// it delivers while the fetch is pending are replayed on top of the
    /// fetched list. A failed baseline fetch leaves the
    /// watch loading with [`fetch_error`](crate::ListState::fetch_error) set;
    /// retry with [`refresh`](RolloutClient::refresh).
    pub async fn watch_all(&self) -> RolloutListWatch {
        let namespace = self.namespace.clone();
        let identity: Identity<RolloutInfo, RolloutKey> =
            Arc::new(move |info: &RolloutInfo| RolloutKey::of(info, &namespace));

        let watch = self.client.watch_list(
            &watch_all_path(&self.namespace),
            identity,
            rollout_list_extractor(),
            None,
        );

        if let Err(e) = self.refresh(&watch).await {
            warn!(namespace = %self.namespace, "Initial rollout list unavailable: {}", e);
        }
        watch
    }

    /// Re-fetches the baseline of `watch`.
    pub async fn refresh(
        &self,
        watch: &RolloutListWatch,
    ) -> std::result::Result<usize, FetchError> {
        watch.load_baseline(self.list()).await
    }

    /// Watches a single rollout.
    ///
    /// The watch stays loading until a record carrying rollout metadata
    /// arrives; records without it are skipped. Updates carrying an
    /// already-seen resource version are suppressed. `stale_after` falls
    /// back to `watch.stale_after_ms`.
    pub fn watch(
        &self,
        name: &str,
        stale_after: Option<Duration>,
    ) -> EntityWatch<RolloutInfo> {
        let equality: Equality<RolloutInfo> = Arc::new(|a: &RolloutInfo, b: &RolloutInfo| a.same_revision(b));
        let options = self.client.options(stale_after);
        self.client
            .watch_entity_with(&watch_path(&self.namespace, name), rollout_extractor(), equality, options)
    }
}
