// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and optional OpenTelemetry metrics for lookup activity.
//!
//! Logs are emitted through `tracing` and are always compiled in. Metrics require the `metrics`
//! feature and a meter provider passed to [`LookupTelemetry::with_metrics`].

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, MeterProvider},
};

/// Attribute carrying the component that reported an activity.
#[cfg(any(feature = "metrics", test))]
pub(crate) const COMPONENT: &str = "advert_lookup.component";

/// Attribute carrying the activity name.
#[cfg(any(feature = "metrics", test))]
pub(crate) const ACTIVITY: &str = "advert_lookup.activity";

#[cfg(any(feature = "metrics", test))]
const METER_NAME: &str = "advert_lookup";
#[cfg(any(feature = "metrics", test))]
const EVENT_COUNT_NAME: &str = "advert_lookup.event.count";

/// Telemetry sink shared by the cache, the sources and the lookup.
///
/// # Examples
///
/// ```
/// use advert_lookup::{AdvertCache, AdvertLookup, LookupTelemetry};
///
/// let lookup = AdvertLookup::new(AdvertCache::new(), Vec::new()).with_telemetry(LookupTelemetry::silent());
/// ```
#[derive(Clone, Debug)]
pub struct LookupTelemetry {
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_counter: Option<Counter<u64>>,
}

impl Default for LookupTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupTelemetry {
    /// Creates telemetry that emits structured logs and no metrics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            logs_enabled: true,
            #[cfg(any(feature = "metrics", test))]
            event_counter: None,
        }
    }

    /// Creates telemetry that emits nothing.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            logs_enabled: false,
            ..Self::new()
        }
    }

    /// Counts every activity with a meter obtained from `provider`.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn with_metrics(self, provider: &dyn MeterProvider) -> Self {
        let meter = provider.meter_with_scope(
            InstrumentationScope::builder(METER_NAME)
                .with_version(env!("CARGO_PKG_VERSION"))
                .build(),
        );

        let counter = meter
            .u64_counter(EVENT_COUNT_NAME)
            .with_description("Advertisement lookup events")
            .with_unit("{event}")
            .build();

        Self {
            event_counter: Some(counter),
            ..self
        }
    }

    pub(crate) fn record(&self, component: &'static str, activity: LookupActivity, id: &str) {
        self.record_attempt(component, activity, id, None);
    }

    pub(crate) fn record_attempt(&self, component: &'static str, activity: LookupActivity, id: &str, attempt: Option<u32>) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(counter) = &self.event_counter {
            counter.add(
                1,
                &[KeyValue::new(COMPONENT, component), KeyValue::new(ACTIVITY, activity.as_str())],
            );
        }

        if self.logs_enabled {
            emit(component, activity, id, attempt);
        }
    }
}

fn emit(component: &'static str, activity: LookupActivity, id: &str, attempt: Option<u32>) {
    // Tracing levels must be constant, so each severity gets its own expansion.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                advert_lookup.component = component,
                advert_lookup.activity = activity.as_str(),
                advert.id = id,
                attempt = attempt,
            )
        };
    }

    match activity.severity() {
        Severity::Debug => emit_event!(debug),
        Severity::Info => emit_event!(info),
        Severity::Warn => emit_event!(warn),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Debug,
    Info,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupActivity {
    CacheHit,
    CacheMiss,
    CacheInserted,
    SourceHit,
    SourceEmpty,
    ProviderFailure,
    ProviderEmpty,
    CircuitOpen,
    CircuitTripped,
    NotFound,
    Shutdown,
}

impl LookupActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::CacheHit => "cache.hit",
            Self::CacheMiss => "cache.miss",
            Self::CacheInserted => "cache.inserted",
            Self::SourceHit => "source.hit",
            Self::SourceEmpty => "source.empty",
            Self::ProviderFailure => "provider.failure",
            Self::ProviderEmpty => "provider.empty",
            Self::CircuitOpen => "circuit.open",
            Self::CircuitTripped => "circuit.tripped",
            Self::NotFound => "lookup.not_found",
            Self::Shutdown => "lookup.shutdown",
        }
    }

    pub(crate) fn severity(self) -> Severity {
        match self {
            Self::CacheHit | Self::CacheMiss | Self::SourceEmpty | Self::ProviderEmpty | Self::NotFound => Severity::Debug,
            Self::CacheInserted | Self::SourceHit | Self::Shutdown => Severity::Info,
            Self::ProviderFailure | Self::CircuitOpen | Self::CircuitTripped => Severity::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics, ScopeMetrics};
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn activity_as_str() {
        assert_eq!(LookupActivity::CacheHit.as_str(), "cache.hit");
        assert_eq!(LookupActivity::CacheMiss.as_str(), "cache.miss");
        assert_eq!(LookupActivity::CacheInserted.as_str(), "cache.inserted");
        assert_eq!(LookupActivity::SourceHit.as_str(), "source.hit");
        assert_eq!(LookupActivity::SourceEmpty.as_str(), "source.empty");
        assert_eq!(LookupActivity::ProviderFailure.as_str(), "provider.failure");
        assert_eq!(LookupActivity::ProviderEmpty.as_str(), "provider.empty");
        assert_eq!(LookupActivity::CircuitOpen.as_str(), "circuit.open");
        assert_eq!(LookupActivity::CircuitTripped.as_str(), "circuit.tripped");
        assert_eq!(LookupActivity::NotFound.as_str(), "lookup.not_found");
        assert_eq!(LookupActivity::Shutdown.as_str(), "lookup.shutdown");
    }

    #[test]
    fn failures_are_warnings() {
        assert_eq!(LookupActivity::ProviderFailure.severity(), Severity::Warn);
        assert_eq!(LookupActivity::CircuitOpen.severity(), Severity::Warn);
        assert_eq!(LookupActivity::CircuitTripped.severity(), Severity::Warn);
        assert_eq!(LookupActivity::CacheHit.severity(), Severity::Debug);
        assert_eq!(LookupActivity::Shutdown.severity(), Severity::Info);
    }

    #[traced_test]
    #[test]
    fn logs_activity_with_id() {
        LookupTelemetry::new().record_attempt("retrying_source", LookupActivity::ProviderFailure, "id-17", Some(2));

        assert!(logs_contain("provider.failure"));
        assert!(logs_contain("id-17"));
        assert!(logs_contain("retrying_source"));
    }

    #[traced_test]
    #[test]
    fn silent_emits_nothing() {
        LookupTelemetry::silent().record("lookup", LookupActivity::Shutdown, "id-99");

        assert!(!logs_contain("id-99"));
    }

    #[test]
    fn metrics_count_activity() {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();
        let telemetry = LookupTelemetry::silent().with_metrics(&provider);

        telemetry.record("cache", LookupActivity::CacheHit, "1");
        provider.force_flush().unwrap();

        let metrics = exporter.get_finished_metrics().unwrap();
        let metrics: Vec<_> = metrics
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .collect();

        let counter = metrics
            .iter()
            .find(|metric| metric.name() == EVENT_COUNT_NAME)
            .expect("event counter should be exported");

        let attributes: Vec<KeyValue> = match counter.data() {
            AggregatedMetrics::U64(MetricData::Sum(sum)) => sum.data_points().flat_map(|point| point.attributes().cloned()).collect(),
            _ => Vec::new(),
        };

        assert!(attributes.contains(&KeyValue::new(COMPONENT, "cache")));
        assert!(attributes.contains(&KeyValue::new(ACTIVITY, "cache.hit")));
    }
}
