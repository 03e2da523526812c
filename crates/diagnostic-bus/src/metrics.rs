//! # Diagnostic Bus Metrics
//!
//! Prometheus metrics for the bus itself.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! diagnostic-bus = { path = "...", features = ["metrics"] }
//! ```
//!
//! Without the feature every `record_*` helper compiles to nothing.
//!
//! ## Metrics Exported
//!
//! - `diag_events_written_total` - Counter of writes that reached the fan-out
//! - `diag_events_skipped_total` - Counter of publishes skipped because nobody listened
//! - `diag_sink_deliveries_total` - Counter of successful sink deliveries
//! - `diag_sink_panics_total` - Counter of sink panics isolated at dispatch
//! - `diag_sources_created_total` - Counter of sources created by registries
//! - `diag_active_subscriptions` - Gauge of live sink subscriptions

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Writes that reached the fan-out
    pub static ref EVENTS_WRITTEN: IntCounter = register_int_counter!(
        "diag_events_written_total",
        "Total number of events written to subscribers"
    )
    .expect("Failed to create EVENTS_WRITTEN metric");

    /// Publishes skipped on the disabled fast path
    pub static ref EVENTS_SKIPPED: IntCounter = register_int_counter!(
        "diag_events_skipped_total",
        "Total number of events skipped because no subscriber was interested"
    )
    .expect("Failed to create EVENTS_SKIPPED metric");

    /// Successful sink deliveries
    pub static ref SINK_DELIVERIES: IntCounter = register_int_counter!(
        "diag_sink_deliveries_total",
        "Total number of events handled by sinks"
    )
    .expect("Failed to create SINK_DELIVERIES metric");

    /// Sink panics caught at dispatch
    pub static ref SINK_PANICS: IntCounter = register_int_counter!(
        "diag_sink_panics_total",
        "Total number of sink panics isolated during dispatch"
    )
    .expect("Failed to create SINK_PANICS metric");

    /// Sources created
    pub static ref SOURCES_CREATED: IntCounter = register_int_counter!(
        "diag_sources_created_total",
        "Total number of event sources created"
    )
    .expect("Failed to create SOURCES_CREATED metric");

    /// Live subscriptions
    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge = register_int_gauge!(
        "diag_active_subscriptions",
        "Number of live sink subscriptions"
    )
    .expect("Failed to create ACTIVE_SUBSCRIPTIONS metric");
}

/// Record a write delivered to `deliveries` sinks.
#[inline]
pub fn record_write(deliveries: usize) {
    #[cfg(feature = "metrics")]
    {
        EVENTS_WRITTEN.inc();
        SINK_DELIVERIES.inc_by(deliveries as u64);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = deliveries;
}

/// Record a publish skipped on the disabled path.
#[inline]
pub fn record_skipped() {
    #[cfg(feature = "metrics")]
    EVENTS_SKIPPED.inc();
}

/// Record a sink panic.
#[inline]
pub fn record_sink_panic() {
    #[cfg(feature = "metrics")]
    SINK_PANICS.inc();
}

/// Record a source creation.
#[inline]
pub fn record_source_created() {
    #[cfg(feature = "metrics")]
    SOURCES_CREATED.inc();
}

/// Record a new subscription.
#[inline]
pub fn record_subscribed() {
    #[cfg(feature = "metrics")]
    ACTIVE_SUBSCRIPTIONS.inc();
}

/// Record a disposed subscription.
#[inline]
pub fn record_unsubscribed() {
    #[cfg(feature = "metrics")]
    ACTIVE_SUBSCRIPTIONS.dec();
}
