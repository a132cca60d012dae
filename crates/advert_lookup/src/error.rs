// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

/// The result for fallible operations of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error returned by the lookup, its cache, its sources or the error window.
///
/// Transient provider failures never show up here: the [`RetryingSource`][crate::RetryingSource]
/// absorbs them and degrades to "not found". What remains are programming errors (use after
/// shutdown, invalid configuration) and unexpected failures of sources that do not retry.
///
/// The error is cheap to clone so that one outcome can be handed to every caller waiting on the
/// same identifier.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The component was shut down before the call arrived.
    #[error("this {component} has been shut down")]
    Disposed {
        /// Human readable name of the component that was shut down.
        component: &'static str,
    },

    /// A configuration value was rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// A source failed in a way it could not recover from itself.
    #[error("advertisement source failed: {0}")]
    Source(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) const fn disposed(component: &'static str) -> Self {
        Self::Disposed { component }
    }

    pub(crate) fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Wraps an unexpected failure of an [`AdvertSource`][crate::AdvertSource].
    ///
    /// Source implementations use this for failures that should reach the caller of
    /// [`AdvertLookup::resolve`][crate::AdvertLookup::resolve].
    pub fn from_source(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Source(Arc::from(cause.into()))
    }

    /// Returns `true` if the call arrived after the component was shut down.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }

    /// Returns `true` if a configuration value was rejected.
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

/// A failure reported by an external [`AdvertProvider`][crate::AdvertProvider].
///
/// Every provider failure is treated as transient by the retrying source, whatever its message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    message: Cow<'static, str>,
}

impl ProviderError {
    /// Creates a provider error with the given message.
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self { message: message.into() }
    }

    /// The message the provider reported.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Error: Send, Sync, Clone);
        static_assertions::assert_impl_all!(ProviderError: Send, Sync);
    }

    #[test]
    fn disposed_names_component() {
        let error = Error::disposed("advertisement cache");

        assert!(error.is_disposed());
        assert!(!error.is_invalid_config());
        assert_eq!(error.to_string(), "this advertisement cache has been shut down");
    }

    #[test]
    fn invalid_config_message() {
        let error = Error::invalid_config("retry delay cannot be negative");

        assert!(error.is_invalid_config());
        assert_eq!(error.to_string(), "invalid configuration: retry delay cannot be negative");
    }

    #[test]
    fn source_keeps_cause() {
        let error = Error::from_source(ProviderError::new("connection reset"));

        assert_eq!(error.to_string(), "advertisement source failed: connection reset");
        assert_eq!(error.source().unwrap().to_string(), "connection reset");

        let cloned = error.clone();
        assert_eq!(cloned.to_string(), error.to_string());
    }
}
