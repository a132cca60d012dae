// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cache-aside advertisement lookup over a prioritized chain of sources.
//!
//! An [`AdvertLookup`] resolves an identifier to an [`Advertisement`]. It reads an
//! [`AdvertCache`] first; on a miss it asks its sources in order, and the first advertisement
//! found is written back to the cache.
//!
//! # Core Types
//!
//! - [`AdvertLookup`]: The public "resolve by id" operation. Concurrent calls for the same id are
//!   coalesced into one resolution, while different ids proceed in parallel.
//! - [`AdvertCache`]: A shared, time-to-live cache handle backed by `moka`.
//! - [`AdvertSource`]: The asynchronous source boundary. [`DynamicSource`] erases the concrete type.
//! - [`RetryingSource`]: Retries a flaky [`AdvertProvider`] and stops calling it once the failures
//!   of the last hour reach a threshold.
//! - [`DirectSource`]: A plain fallback that asks its provider once.
//! - [`ErrorWindow`]: The sliding one-hour failure counter behind the retrying source.
//!
//! # Failure Model
//!
//! Provider failures behind a [`RetryingSource`] never reach the caller: they are retried,
//! counted, and finally reported as "not found". Calls made after a component was shut down fail
//! with [`Error::Disposed`], and invalid configuration fails with [`Error::InvalidConfig`] when
//! the component is built.
//!
//! # Quick Start
//!
//! ```
//! use advert_lookup::{AdvertCache, AdvertLookup, AdvertProvider, Advertisement, ProviderError};
//!
//! struct Primary;
//!
//! impl AdvertProvider for Primary {
//!     fn get_advert(&self, _id: &str) -> Result<Option<Advertisement>, ProviderError> {
//!         Err(ProviderError::new("primary store is down"))
//!     }
//! }
//!
//! struct Secondary;
//!
//! impl AdvertProvider for Secondary {
//!     fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError> {
//!         Ok(Some(Advertisement::new(id, format!("Advertisement #{id}"))))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> advert_lookup::Result<()> {
//! let cache = AdvertCache::new();
//! let lookup = AdvertLookup::standard(cache.clone(), || Primary, Secondary);
//!
//! let advert = lookup.resolve("42").await?.expect("the secondary store has every advertisement");
//! assert_eq!(advert.name(), "Advertisement #42");
//! assert!(cache.get("42").await?.is_some());
//!
//! lookup.shutdown().await;
//! cache.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `metrics`: Counts every cache, source and circuit event with OpenTelemetry, see
//!   [`LookupTelemetry::with_metrics`].
//! - `serde`: Implements `Serialize` and `Deserialize` for [`Advertisement`], [`RetryConfig`] and
//!   [`CacheConfig`].

mod advertisement;
mod cache;
mod config;
mod error;
mod flight;
mod lookup;
mod provider;
mod retrying;
mod source;
mod telemetry;
#[cfg(test)]
mod testing;
mod window;

#[doc(inline)]
pub use advertisement::Advertisement;
#[doc(inline)]
pub use cache::AdvertCache;
#[doc(inline)]
pub use config::{
    CacheConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ERRORS_PER_HOUR, DEFAULT_RETRY_DELAY, DEFAULT_TIME_TO_LIVE, RetryConfig,
};
#[doc(inline)]
pub use error::{Error, ProviderError, Result};
#[doc(inline)]
pub use lookup::AdvertLookup;
#[doc(inline)]
pub use provider::AdvertProvider;
#[doc(inline)]
pub use retrying::RetryingSource;
#[doc(inline)]
pub use source::{AdvertSource, DirectSource, DynamicSource, IntoDynamicSource};
#[doc(inline)]
pub use telemetry::LookupTelemetry;
#[doc(inline)]
pub use window::{ErrorWindow, MAX_AGE};
