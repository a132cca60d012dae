// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-memory cache of resolved advertisements backed by moka.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use parking_lot::RwLock;

use crate::{Advertisement, CacheConfig, Error, Result};

const COMPONENT: &str = "advertisement cache";

/// A shared, expiring store of advertisements keyed by identifier.
///
/// Every entry expires a fixed time after it was inserted; an expired entry reads as a miss.
/// The cache is a handle: clones share one store, so a single cache can back several lookups.
/// [`close`][Self::close] empties the store for every clone, after which all calls fail with
/// [`Error::Disposed`].
///
/// # Examples
///
/// ```
/// use advert_lookup::{AdvertCache, Advertisement};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> advert_lookup::Result<()> {
/// let cache = AdvertCache::new();
/// let shared = cache.clone();
///
/// cache.insert("42", Advertisement::new("42", "Advertisement #42")).await?;
///
/// assert!(shared.get("42").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AdvertCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    store: RwLock<Option<Cache<String, Advertisement>>>,
    time_to_live: Duration,
}

impl Default for AdvertCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvertCache {
    /// Creates an unbounded cache whose entries live for five minutes.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&CacheConfig::default())
    }

    /// Creates an unbounded cache whose entries live for `time_to_live`.
    #[must_use]
    pub fn with_time_to_live(time_to_live: Duration) -> Self {
        Self::build(time_to_live, None)
    }

    /// Creates a cache from `config`.
    ///
    /// A negative lifetime is ignored and the five minute default is kept.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::build(config.time_to_live(), config.max_capacity)
    }

    fn build(time_to_live: Duration, max_capacity: Option<u64>) -> Self {
        let mut builder = Cache::builder().time_to_live(time_to_live);

        if let Some(capacity) = max_capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            inner: Arc::new(CacheInner {
                store: RwLock::new(Some(builder.build())),
                time_to_live,
            }),
        }
    }

    /// How long an entry stays readable after it was inserted.
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.inner.time_to_live
    }

    /// Returns the advertisement cached under `id`, or `None` if it is absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] once the cache has been closed.
    pub async fn get(&self, id: &str) -> Result<Option<Advertisement>> {
        Ok(self.store()?.get(id).await)
    }

    /// Caches `advert` under `id`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] once the cache has been closed.
    pub async fn insert(&self, id: &str, advert: Advertisement) -> Result<()> {
        self.store()?.insert(id.to_owned(), advert).await;
        Ok(())
    }

    /// Removes the entry cached under `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] once the cache has been closed.
    pub async fn invalidate(&self, id: &str) -> Result<()> {
        self.store()?.invalidate(id).await;
        Ok(())
    }

    /// Number of live entries after pending maintenance has run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] once the cache has been closed.
    pub async fn entry_count(&self) -> Result<u64> {
        let store = self.store()?;
        store.run_pending_tasks().await;
        Ok(store.entry_count())
    }

    /// Drops every entry and disposes of the store for all clones. Closing twice is a no-op.
    pub fn close(&self) {
        if let Some(store) = self.inner.store.write().take() {
            store.invalidate_all();
        }
    }

    /// Returns `true` once [`close`][Self::close] has been called on any clone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.store.read().is_none()
    }

    // The store is cloned out so that no lock is held across an await.
    fn store(&self) -> Result<Cache<String, Advertisement>> {
        self.inner.store.read().clone().ok_or(Error::disposed(COMPONENT))
    }
}

impl Debug for AdvertCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertCache")
            .field("time_to_live", &self.inner.time_to_live)
            .field("closed", &self.is_closed())
            .finish()
    }
}
