// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolves a few advertisements through a flaky primary store and a reliable fallback.
//!
//! Run with `cargo run --example lookup` to watch the cache, the retries and the circuit in the
//! log output.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use advert_lookup::{
    AdvertCache, AdvertLookup, AdvertProvider, Advertisement, CacheConfig, DirectSource, IntoDynamicSource, ProviderError, RetryConfig,
    RetryingSource,
};

/// Fails two calls out of three.
struct FlakyStore {
    calls: Arc<AtomicU32>,
}

impl AdvertProvider for FlakyStore {
    fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError> {
        if self.calls.fetch_add(1, Ordering::Relaxed) % 3 == 2 {
            Ok(Some(Advertisement::new(id, format!("Advertisement #{id}")).with_description("from the primary store")))
        } else {
            Err(ProviderError::new("primary store timed out"))
        }
    }
}

/// Knows every advertisement.
struct Archive;

impl AdvertProvider for Archive {
    fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError> {
        Ok(Some(Advertisement::new(id, format!("Advertisement #{id}")).with_description("from the archive")))
    }
}

#[tokio::main]
async fn main() -> advert_lookup::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let calls = Arc::new(AtomicU32::new(0));
    let primary = RetryingSource::from_config(
        move || FlakyStore {
            calls: Arc::clone(&calls),
        },
        &RetryConfig {
            max_attempts: 2,
            retry_delay_ms: 50,
            max_errors_per_hour: 4,
        },
    )?;

    let cache = AdvertCache::from_config(&CacheConfig {
        time_to_live_ms: Some(60_000),
        max_capacity: Some(1_000),
    });

    let lookup = AdvertLookup::new(cache.clone(), vec![primary.into_dynamic(), DirectSource::new(Archive).into_dynamic()]);

    for id in ["1", "2", "3", "1", "4", "5"] {
        match lookup.resolve(id).await? {
            Some(advert) => println!("{id}: {} ({})", advert.name(), advert.description().unwrap_or_default()),
            None => println!("{id}: not found"),
        }
    }

    lookup.shutdown().await;
    cache.close();

    Ok(())
}
