// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The asynchronous source boundary walked by the lookup.

use std::fmt::Debug;
use std::sync::Arc;

use crate::telemetry::LookupActivity;
use crate::{AdvertProvider, Advertisement, Error, LookupTelemetry, Result};

/// An asynchronous place an advertisement can be resolved from.
///
/// Sources answer `Ok(None)` when they have nothing for an identifier. Only unexpected failures
/// are returned as errors, and those reach the caller of
/// [`AdvertLookup::resolve`][crate::AdvertLookup::resolve].
///
/// Use [`IntoDynamicSource::into_dynamic`] to store sources of different types in one list.
#[dynosaur::dynosaur(pub(crate) DynAdvertSource = dyn(box) AdvertSource, bridge(none))]
pub trait AdvertSource: Send + Sync {
    /// Tries to resolve the advertisement published under `id`.
    fn try_get(&self, id: &str) -> impl Future<Output = Result<Option<Advertisement>>> + Send;

    /// Releases whatever the source holds. Called once by
    /// [`AdvertLookup::shutdown`][crate::AdvertLookup::shutdown].
    fn close(&self) {}
}

/// Extension trait for converting any [`AdvertSource`] into a [`DynamicSource`].
pub trait IntoDynamicSource: Sized {
    /// Erases the concrete source type.
    fn into_dynamic(self) -> DynamicSource;
}

impl<T> IntoDynamicSource for T
where
    T: AdvertSource + 'static,
{
    fn into_dynamic(self) -> DynamicSource {
        DynamicSource::new(self)
    }
}

/// A clonable, type-erased [`AdvertSource`].
///
/// # Examples
///
/// ```
/// use advert_lookup::{AdvertProvider, Advertisement, DirectSource, DynamicSource, IntoDynamicSource, ProviderError};
///
/// struct Empty;
///
/// impl AdvertProvider for Empty {
///     fn get_advert(&self, _id: &str) -> Result<Option<Advertisement>, ProviderError> {
///         Ok(None)
///     }
/// }
///
/// let sources: Vec<DynamicSource> = vec![DirectSource::new(Empty).into_dynamic()];
/// let shared = sources[0].clone();
/// ```
pub struct DynamicSource(Arc<DynAdvertSource<'static>>);

impl DynamicSource {
    pub(crate) fn new<T>(source: T) -> Self
    where
        T: AdvertSource + 'static,
    {
        Self(DynAdvertSource::new_arc(source))
    }
}

impl Debug for DynamicSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicSource").finish()
    }
}

impl Clone for DynamicSource {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl AdvertSource for DynamicSource {
    async fn try_get(&self, id: &str) -> Result<Option<Advertisement>> {
        self.0.try_get(id).await
    }

    fn close(&self) {
        self.0.close();
    }
}

const DIRECT: &str = "direct_source";

/// A source that asks its provider exactly once per lookup.
///
/// This is the plain fallback behind the retrying primary source. A provider failure is not
/// retried; it is returned as [`Error::Source`].
///
/// The provider is shared by concurrent lookups without locking, so it has to be `Sync`.
pub struct DirectSource<P> {
    provider: P,
    telemetry: LookupTelemetry,
}

impl<P: AdvertProvider + Sync> DirectSource<P> {
    /// Creates a source that calls `provider` for every lookup.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            telemetry: LookupTelemetry::new(),
        }
    }

    /// Replaces the telemetry the source reports provider failures to.
    #[must_use]
    pub fn with_telemetry(self, telemetry: LookupTelemetry) -> Self {
        Self { telemetry, ..self }
    }
}

impl<P> Debug for DirectSource<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectSource").finish_non_exhaustive()
    }
}

impl<P: AdvertProvider + Sync> AdvertSource for DirectSource<P> {
    async fn try_get(&self, id: &str) -> Result<Option<Advertisement>> {
        self.provider.get_advert(id).map_err(|error| {
            self.telemetry.record(DIRECT, LookupActivity::ProviderFailure, id);
            Error::from_source(error)
        })
    }
}
