//! Prometheus text export of the bus metrics.
//!
//! The bus registers its counters in the default prometheus registry
//! (see `diagnostic_bus::metrics`); this module only renders them.

use prometheus::{Encoder, TextEncoder};

use crate::TelemetryError;

/// Render every metric in the default registry in the text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
