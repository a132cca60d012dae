// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed configuration for the retrying source and the advertisement cache.
//!
//! Both types carry the defaults used when a component is constructed without configuration.
//! Enable the `serde` feature to load them from any format the caller owns.

use std::time::Duration;

use crate::{Error, Result};

/// Number of provider attempts per lookup when nothing else is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay between two attempts after a provider failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

const DEFAULT_RETRY_DELAY_MS: i64 = 1000;

/// Failures within the last hour at which the retrying source stops calling its provider.
pub const DEFAULT_MAX_ERRORS_PER_HOUR: usize = 10;

/// Lifetime of a cached advertisement.
pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(5 * 60);

/// Configuration of a [`RetryingSource`][crate::RetryingSource].
///
/// The retry delay is kept signed so that a negative value coming from configuration is
/// reported instead of silently clamped.
///
/// # Examples
///
/// ```
/// use advert_lookup::RetryConfig;
///
/// let config = RetryConfig {
///     retry_delay_ms: 250,
///     ..RetryConfig::default()
/// };
///
/// assert_eq!(config.max_attempts, 3);
/// assert_eq!(config.max_errors_per_hour, 10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default, deny_unknown_fields))]
pub struct RetryConfig {
    /// Total provider attempts per lookup, including the first one.
    pub max_attempts: u32,
    /// Milliseconds to wait after a failed attempt. Must not be negative.
    pub retry_delay_ms: i64,
    /// Failures within the last hour at which the provider is no longer called.
    pub max_errors_per_hour: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_errors_per_hour: DEFAULT_MAX_ERRORS_PER_HOUR,
        }
    }
}

impl RetryConfig {
    /// Checks every value and returns the retry delay as a [`Duration`].
    pub(crate) fn validate(&self) -> Result<Duration> {
        if self.max_attempts == 0 {
            return Err(Error::invalid_config("at least one provider attempt is required"));
        }

        if self.max_errors_per_hour == 0 {
            return Err(Error::invalid_config("the error threshold must be at least one"));
        }

        if self.retry_delay_ms < 0 {
            return Err(Error::invalid_config(format!(
                "cannot wait less than 0 ms between attempts, got {} ms",
                self.retry_delay_ms
            )));
        }

        Ok(Duration::from_millis(self.retry_delay_ms.unsigned_abs()))
    }
}

/// Configuration of an [`AdvertCache`][crate::AdvertCache].
///
/// # Examples
///
/// ```
/// use advert_lookup::{AdvertCache, CacheConfig};
/// use std::time::Duration;
///
/// let cache = AdvertCache::from_config(&CacheConfig {
///     time_to_live_ms: Some(30_000),
///     max_capacity: Some(10_000),
/// });
///
/// assert_eq!(cache.time_to_live(), Duration::from_secs(30));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default, deny_unknown_fields))]
pub struct CacheConfig {
    /// Milliseconds an entry stays readable. Negative values are ignored.
    pub time_to_live_ms: Option<i64>,
    /// Upper bound on stored entries. Unbounded when absent.
    pub max_capacity: Option<u64>,
}

impl CacheConfig {
    pub(crate) fn time_to_live(&self) -> Duration {
        match self.time_to_live_ms {
            None => DEFAULT_TIME_TO_LIVE,
            Some(ms) if ms < 0 => {
                tracing::warn!(
                    cache.time_to_live_ms = ms,
                    "ignoring negative advertisement lifetime, keeping the default"
                );
                DEFAULT_TIME_TO_LIVE
            }
            Some(ms) => Duration::from_millis(ms.unsigned_abs()),
        }
    }
}
