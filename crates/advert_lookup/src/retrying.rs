// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ERRORS_PER_HOUR, DEFAULT_RETRY_DELAY};
use crate::telemetry::LookupActivity;
use crate::{AdvertProvider, AdvertSource, Advertisement, ErrorWindow, LookupTelemetry, Result, RetryConfig};

const COMPONENT: &str = "retrying_source";

/// A source that retries a flaky provider and stops calling it while it keeps failing.
///
/// Every call builds a fresh provider with the factory and attempts it up to `max_attempts`
/// times:
///
/// - an advertisement ends the call immediately;
/// - an empty answer is retried right away and is not counted as a failure;
/// - a [`ProviderError`][crate::ProviderError] is recorded in the source's [`ErrorWindow`], then
///   the next attempt waits for the retry delay.
///
/// Failures are shared by every call. Once the failures of the last hour reach
/// `max_errors_per_hour`, calls answer `Ok(None)` without touching the provider, until enough of
/// those failures age out. A call that pushes the count to the threshold stops retrying at once.
///
/// Provider failures never surface as errors: the caller only sees "not found".
///
/// # Examples
///
/// ```
/// use advert_lookup::{AdvertProvider, Advertisement, ProviderError, RetryConfig, RetryingSource};
///
/// struct Catalog;
///
/// impl AdvertProvider for Catalog {
///     fn get_advert(&self, id: &str) -> Result<Option<Advertisement>, ProviderError> {
///         Ok(Some(Advertisement::new(id, format!("Advertisement #{id}"))))
///     }
/// }
///
/// let source = RetryingSource::from_config(|| Catalog, &RetryConfig::default())?;
///
/// let invalid = RetryingSource::from_config(
///     || Catalog,
///     &RetryConfig {
///         retry_delay_ms: -1,
///         ..RetryConfig::default()
///     },
/// );
/// assert!(invalid.unwrap_err().is_invalid_config());
/// # Ok::<(), advert_lookup::Error>(())
/// ```
pub struct RetryingSource<F> {
    factory: F,
    errors: ErrorWindow,
    max_attempts: u32,
    retry_delay: Duration,
    max_errors_per_hour: usize,
    telemetry: LookupTelemetry,
}

impl<F, P> RetryingSource<F>
where
    F: Fn() -> P + Send + Sync,
    P: AdvertProvider,
{
    /// Creates a source with the default attempts, delay and error threshold.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            errors: ErrorWindow::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_errors_per_hour: DEFAULT_MAX_ERRORS_PER_HOUR,
            telemetry: LookupTelemetry::new(),
        }
    }

    /// Creates a source from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`][crate::Error::InvalidConfig] if the retry delay is
    /// negative, or if the attempt count or the error threshold is zero.
    pub fn from_config(factory: F, config: &RetryConfig) -> Result<Self> {
        let retry_delay = config.validate()?;

        Ok(Self {
            max_attempts: config.max_attempts,
            retry_delay,
            max_errors_per_hour: config.max_errors_per_hour,
            ..Self::new(factory)
        })
    }

    /// Replaces the telemetry the source reports attempts to.
    #[must_use]
    pub fn with_telemetry(self, telemetry: LookupTelemetry) -> Self {
        Self { telemetry, ..self }
    }

    /// Number of provider failures recorded within the last hour.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`][crate::Error::Disposed] once the source has been closed.
    pub fn errors_in_last_hour(&self) -> Result<usize> {
        self.errors.count_recent()
    }

    fn circuit_open(&self) -> Result<bool> {
        Ok(self.errors.count_recent()? >= self.max_errors_per_hour)
    }
}

impl<F> Debug for RetryingSource<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingSource")
            .field("errors", &self.errors)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("max_errors_per_hour", &self.max_errors_per_hour)
            .finish_non_exhaustive()
    }
}

impl<F, P> AdvertSource for RetryingSource<F>
where
    F: Fn() -> P + Send + Sync,
    P: AdvertProvider,
{
    async fn try_get(&self, id: &str) -> Result<Option<Advertisement>> {
        if self.circuit_open()? {
            self.telemetry.record(COMPONENT, LookupActivity::CircuitOpen, id);
            return Ok(None);
        }

        let provider = (self.factory)();

        for attempt in 1..=self.max_attempts {
            let outcome = provider.get_advert(id);

            match outcome {
                Ok(Some(advert)) => return Ok(Some(advert)),
                Ok(None) => {
                    self.telemetry
                        .record_attempt(COMPONENT, LookupActivity::ProviderEmpty, id, Some(attempt));
                }
                Err(error) => {
                    tracing::debug!(advert.id = id, attempt, error = %error, "provider call failed");
                    self.telemetry
                        .record_attempt(COMPONENT, LookupActivity::ProviderFailure, id, Some(attempt));

                    self.errors.record(Instant::now())?;

                    if self.circuit_open()? {
                        self.telemetry
                            .record_attempt(COMPONENT, LookupActivity::CircuitTripped, id, Some(attempt));
                        return Ok(None);
                    }

                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Ok(None)
    }

    fn close(&self) {
        self.errors.close();
    }
}
