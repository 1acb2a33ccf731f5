//! Client facade over the watch engine
//!
//! [`WatchClient`] owns the transport and the settings, resolves API paths
//! against the configured base URL and hands out controllers:
//! - [`fetch`](WatchClient::fetch) for one-shot snapshots
//! - [`watch_entity`](WatchClient::watch_entity) for a single resource
//! - [`watch_list`](WatchClient::watch_list) for a collection
//! - [`rollouts`](WatchClient::rollouts) for the rollout API
//!
//! # Basic Usage
//! ```no_run
//! use rollout_watch::WatchClient;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = WatchClient::builder("http://localhost:3100")
//!         .connect_timeout(Duration::from_secs(2))
//!         .build()
//!         .unwrap();
//!
//!     let rollouts = client.rollouts("default");
//!     let watch = rollouts.watch_all().await;
//!     println!("{} rollouts", watch.items().len());
//! }
//! ```

mod builder;

pub use builder::*;


use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::record_extractor;
use crate::transport::Fetcher;
use crate::transport::HttpTransport;
use crate::transport::StreamOpener;
use crate::EntityWatch;
use crate::Equality;
use crate::Extractor;
use crate::FetchError;
use crate::Identity;
use crate::ListWatch;
use crate::Result;
use crate::RolloutClient;
use crate::WatchOptions;
use crate::WatchSettings;

/// Entry point for fetching and watching resources
///
/// Cheap to clone; clones share the transport. Created through
/// [`builder()`](WatchClient::builder), [`from_settings()`](WatchClient::from_settings)
/// or [`from_parts()`](WatchClient::from_parts).
#[derive(Clone)]
pub struct WatchClient {
    pub(super) inner: Arc<ArcSwap<ClientInner>>,
}

#[derive(Clone)]
pub struct ClientInner {
    pub(super) opener: Arc<dyn StreamOpener>,
    pub(super) fetcher: Arc<dyn Fetcher>,
    pub(super) settings: WatchSettings,
    /// Transport was built from the settings and is rebuilt on refresh
    pub(super) owns_transport: bool,
}

impl WatchClient {
    /// Create a configured client builder for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> WatchClientBuilder {
        WatchClientBuilder::new(base_url)
    }

    /// Validates `settings` and builds an HTTP-backed client from them.
    pub fn from_settings(settings: WatchSettings) -> Result<Self> {
        let settings = settings.validate()?;
        let transport = Arc::new(HttpTransport::new(&settings.client)?);

        Ok(Self::with_inner(ClientInner {
            opener: transport.clone(),
            fetcher: transport,
            settings,
            owns_transport: true,
        }))
    }

    /// Builds a client over caller-supplied collaborators.
    pub fn from_parts(
        opener: Arc<dyn StreamOpener>,
        fetcher: Arc<dyn Fetcher>,
        settings: WatchSettings,
    ) -> Self {
        Self::with_inner(ClientInner {
            opener,
            fetcher,
            settings,
            owns_transport: false,
        })
    }

    fn with_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(inner)),
        }
    }

    /// Points the client at `new_base_url` (or keeps the current one) with a
    /// fresh transport.
    ///
    /// Controllers created earlier keep their connections; only later calls
    /// use the new transport. Clients built with
    /// [`from_parts()`](WatchClient::from_parts) keep their collaborators.
    pub fn refresh(
        &self,
        new_base_url: Option<String>,
    ) -> Result<()> {
        let old_inner = self.inner.load();
        let mut settings = old_inner.settings.clone();
        if let Some(base_url) = new_base_url {
            settings.client.base_url = base_url;
        }
        let settings = settings.validate()?;

        let new_inner = if old_inner.owns_transport {
            let transport = Arc::new(HttpTransport::new(&settings.client)?);
            ClientInner {
                opener: transport.clone(),
                fetcher: transport,
                settings,
                owns_transport: true,
            }
        } else {
            ClientInner {
                settings,
                ..ClientInner::clone(&old_inner)
            }
        };

        info!(base_url = %new_inner.settings.client.base_url, "Watch client refreshed");
        self.inner.store(Arc::new(new_inner));
        Ok(())
    }

    pub fn settings(&self) -> WatchSettings {
        self.inner.load().settings.clone()
    }

    /// Resolves an API path against the base URL.
    pub fn url(
        &self,
        path: &str,
    ) -> String {
        let inner = self.inner.load();
        let base = inner.settings.client.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// One-shot request for `path`, decoded as `T`.
    pub async fn fetch<T>(
        &self,
        path: &str,
    ) -> std::result::Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let fetcher = self.inner.load().fetcher.clone();
        let value = fetcher.fetch(&url).await?;
        serde_json::from_value(value).map_err(|source| FetchError::Decode { url, source })
    }

    /// Watches a single entity whose stream records are the entity itself.
    ///
    /// `stale_after` falls back to `watch.stale_after_ms`.
    pub fn watch_entity<T>(
        &self,
        path: &str,
        equality: Equality<T>,
        stale_after: Option<Duration>,
    ) -> EntityWatch<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let options = self.options(stale_after);
        self.watch_entity_with(path, Arc::new(record_extractor::<T>()), equality, options)
    }

    /// Watches a single entity with a custom extractor and options.
    pub fn watch_entity_with<T>(
        &self,
        path: &str,
        extract: Extractor<T>,
        equality: Equality<T>,
        options: WatchOptions,
    ) -> EntityWatch<T>
    where
        T: Send + Sync + 'static,
    {
        let opener = self.inner.load().opener.clone();
        EntityWatch::subscribe(opener, self.url(path), extract, equality, options)
    }

    /// Watches a collection, optionally seeded with `baseline`.
    pub fn watch_list<T, K>(
        &self,
        path: &str,
        identity: Identity<T, K>,
        extract: Extractor<T>,
        baseline: Option<Vec<T>>,
    ) -> ListWatch<T, K>
    where
        T: Clone + Send + Sync + 'static,
        K: Eq + Hash + std::fmt::Debug + Send + 'static,
    {
        let opener = self.inner.load().opener.clone();
        ListWatch::subscribe(
            opener,
            self.url(path),
            identity,
            extract,
            baseline,
            self.options(None),
        )
    }

    /// Rollout API scoped to `namespace`.
    pub fn rollouts(
        &self,
        namespace: impl Into<String>,
    ) -> RolloutClient {
        RolloutClient::new(self.clone(), namespace.into())
    }

    pub(crate) fn options(
        &self,
        stale_after: Option<Duration>,
    ) -> WatchOptions {
        let defaults = self.inner.load().settings.watch.options();
        match stale_after {
            Some(window) => defaults.with_stale_after(Some(window)),
            None => defaults,
        }
    }
}
