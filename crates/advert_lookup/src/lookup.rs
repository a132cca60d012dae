// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::flight::Flights;
use crate::telemetry::LookupActivity;
use crate::{
    AdvertCache, AdvertProvider, AdvertSource, Advertisement, DirectSource, DynamicSource, Error, IntoDynamicSource, LookupTelemetry,
    Result, RetryingSource,
};

const COMPONENT: &str = "lookup";

/// Resolves advertisements from a cache, falling back to an ordered list of sources.
///
/// [`resolve`][Self::resolve] reads the cache first. On a miss the sources are asked one after
/// the other, in list order, and the first advertisement found is written to the cache and
/// returned. Later sources are not asked.
///
/// Concurrent calls for the same identifier share one resolution, so a miss reaches the sources
/// once. Calls for different identifiers run in parallel.
///
/// [`shutdown`][Self::shutdown] waits for running calls to finish, closes the sources and makes
/// every later call fail with [`Error::Disposed`]. The cache belongs to whoever created it and is
/// left open.
///
/// Clones are handles to the same lookup.
///
/// # Examples
///
/// ```
/// use advert_lookup::{AdvertCache, AdvertLookup, AdvertProvider, Advertisement, ProviderError};
///
/// struct Catalog;
///
/// impl AdvertProvider for Catalog {
///     fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError> {
///         Ok(Some(Advertisement::new(id, format!("Advertisement #{id}"))))
///     }
/// }
///
/// struct Unreachable;
///
/// impl AdvertProvider for Unreachable {
///     fn get_advert(&self, _id: &str) -> Result<Option<Advertisement>, ProviderError> {
///         Err(ProviderError::new("unreachable"))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> advert_lookup::Result<()> {
/// let lookup = AdvertLookup::standard(AdvertCache::new(), || Catalog, Unreachable);
///
/// let advert = lookup.resolve("42").await?;
/// assert_eq!(advert.map(|advert| advert.name().to_owned()), Some("Advertisement #42".to_owned()));
///
/// lookup.shutdown().await;
/// assert!(lookup.resolve("42").await.unwrap_err().is_disposed());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AdvertLookup {
    core: Arc<LookupCore>,
    flights: Arc<Flights<Result<Option<Advertisement>>>>,
    // `true` once shut down. Every resolve holds a read permit while it runs.
    gate: Arc<RwLock<bool>>,
}

#[derive(Clone)]
struct LookupCore {
    cache: AdvertCache,
    sources: Vec<DynamicSource>,
    telemetry: LookupTelemetry,
}

impl AdvertLookup {
    /// Creates a lookup over `cache` and `sources`, asked in list order.
    ///
    /// An empty list is accepted; such a lookup only ever answers from the cache.
    #[must_use]
    pub fn new(cache: AdvertCache, sources: Vec<DynamicSource>) -> Self {
        if sources.is_empty() {
            tracing::warn!(
                advert_lookup.component = COMPONENT,
                "advertisement lookup created without sources, cache misses will never be resolved"
            );
        }

        Self {
            core: Arc::new(LookupCore {
                cache,
                sources,
                telemetry: LookupTelemetry::new(),
            }),
            flights: Arc::new(Flights::new()),
            gate: Arc::new(RwLock::new(false)),
        }
    }

    /// Creates the usual chain: a [`RetryingSource`] over `primary` with default settings,
    /// followed by a [`DirectSource`] over `secondary`.
    #[must_use]
    pub fn standard<F, P, S>(cache: AdvertCache, primary: F, secondary: S) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: AdvertProvider + 'static,
        S: AdvertProvider + Sync + 'static,
    {
        Self::new(
            cache,
            vec![RetryingSource::new(primary).into_dynamic(), DirectSource::new(secondary).into_dynamic()],
        )
    }

    /// Replaces the telemetry the lookup reports cache and source activity to.
    ///
    /// Sources keep their own telemetry.
    #[must_use]
    pub fn with_telemetry(self, telemetry: LookupTelemetry) -> Self {
        let core = Arc::unwrap_or_clone(self.core);

        Self {
            core: Arc::new(LookupCore { telemetry, ..core }),
            ..self
        }
    }

    /// The cache the lookup reads from and writes to.
    #[must_use]
    pub fn cache(&self) -> &AdvertCache {
        &self.core.cache
    }

    /// Resolves the advertisement published under `id`.
    ///
    /// Returns `Ok(None)` when neither the cache nor any source has it. A source that gave up
    /// after failing, or whose circuit is open, counts as not having it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`shutdown`][Self::shutdown] or once the cache has been
    /// closed, and [`Error::Source`] when a source fails unexpectedly. Errors are not cached.
    pub async fn resolve(&self, id: &str) -> Result<Option<Advertisement>> {
        let closed = self.gate.read().await;

        if *closed {
            return Err(Error::disposed("advertisement lookup"));
        }

        let core = Arc::clone(&self.core);
        let key = id.to_owned();
        let outcome = self.flights.run(id, move || async move { core.resolve(&key).await }).await;

        drop(closed);
        outcome
    }

    /// Waits for running calls to finish, then closes every source.
    ///
    /// Calls arriving afterwards fail with [`Error::Disposed`]. Shutting down twice is a no-op.
    pub async fn shutdown(&self) {
        let mut closed = self.gate.write().await;

        if *closed {
            return;
        }

        *closed = true;

        for source in &self.core.sources {
            source.close();
        }

        self.core.telemetry.record(COMPONENT, LookupActivity::Shutdown, "");
    }

    /// Returns `true` once [`shutdown`][Self::shutdown] has started.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.gate.try_read().map_or(true, |closed| *closed)
    }
}

impl LookupCore {
    async fn resolve(&self, id: &str) -> Result<Option<Advertisement>> {
        if let Some(advert) = self.cache.get(id).await? {
            self.telemetry.record(COMPONENT, LookupActivity::CacheHit, id);
            return Ok(Some(advert));
        }

        self.telemetry.record(COMPONENT, LookupActivity::CacheMiss, id);

        for source in &self.sources {
            let Some(advert) = source.try_get(id).await? else {
                self.telemetry.record(COMPONENT, LookupActivity::SourceEmpty, id);
                continue;
            };

            self.telemetry.record(COMPONENT, LookupActivity::SourceHit, id);
            self.cache.insert(id, advert.clone()).await?;
            self.telemetry.record(COMPONENT, LookupActivity::CacheInserted, id);

            return Ok(Some(advert));
        }

        self.telemetry.record(COMPONENT, LookupActivity::NotFound, id);
        Ok(None)
    }
}

impl Debug for AdvertLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertLookup")
            .field("cache", &self.core.cache)
            .field("sources", &self.core.sources.len())
            .field("flights", &self.flights)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
