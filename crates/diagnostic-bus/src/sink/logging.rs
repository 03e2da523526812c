//! Sink rendering diagnostic events to a structured-logging backend.

use super::record::{LogBackend, LogRecord, TracingBackend};
use super::Sink;
use crate::config::SinkConfig;
use crate::envelope::{DiagnosticEvent, Payload};
use chrono::SecondsFormat;
use serde_json::Value;
use std::sync::Arc;
use tracing::Level;

/// Component-specific fields appended to every logged envelope.
///
/// Called once per logged event with the event name and the event. The
/// returned fields are logged in order after the four base fields.
pub trait Enricher: Send + Sync {
    fn fields(&self, event_name: &str, event: &DiagnosticEvent) -> Vec<(String, Value)>;
}

impl<F> Enricher for F
where
    F: Fn(&str, &DiagnosticEvent) -> Vec<(String, Value)> + Send + Sync,
{
    fn fields(&self, event_name: &str, event: &DiagnosticEvent) -> Vec<(String, Value)> {
        self(event_name, event)
    }
}

/// Default enricher: the domain fields the producer attached to the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldsEnricher;

impl Enricher for FieldsEnricher {
    fn fields(&self, _event_name: &str, event: &DiagnosticEvent) -> Vec<(String, Value)> {
        event
            .fields()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Logs every event it receives as one record.
///
/// Enriched events produce:
///
/// ```text
/// Timestamp = {timestamp}            local time, RFC 3339
/// EventName = {event_name}
/// Operation = {operation}
/// CorrelationId = {correlation_id}
/// <field> = {<field>}                one line per enrichment field
/// StackTrace = {stack_trace}         only when captured
/// ```
///
/// Opaque payloads produce just the event name and the raw value. Missing
/// payloads are ignored.
pub struct LoggingSink {
    backend: Arc<dyn LogBackend>,
    enricher: Arc<dyn Enricher>,
    level: Level,
}

impl LoggingSink {
    /// Sink logging through `tracing` at the default level.
    pub fn new() -> Self {
        Self::from_config(&SinkConfig::default())
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self {
            backend: Arc::new(TracingBackend),
            enricher: Arc::new(FieldsEnricher),
            level: config.level,
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn LogBackend>) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_enricher(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enricher = Arc::new(enricher);
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Build the record for an enriched event.
    pub fn event_record(&self, event_name: &str, event: &DiagnosticEvent) -> LogRecord {
        let envelope = event.envelope();
        let mut record = LogRecord::new(self.level);

        record.push_line(
            "Timestamp",
            "timestamp",
            envelope
                .timestamp_local()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        record.push_line("EventName", "event_name", event_name);
        record.push_line("Operation", "operation", envelope.operation());
        record.push_line(
            "CorrelationId",
            "correlation_id",
            envelope.correlation_id().to_string(),
        );

        for (name, value) in self.enricher.fields(event_name, event) {
            let label = name.clone();
            record.push_line(&label, name, value);
        }

        if let Some(stack_trace) = envelope.stack_trace() {
            record.push_line("StackTrace", "stack_trace", stack_trace.to_string());
        }

        record
    }

    /// Build the record for an opaque payload.
    pub fn opaque_record(&self, event_name: &str, value: &Value) -> LogRecord {
        let mut record = LogRecord::new(self.level);
        record.push_line("EventName", "event_name", event_name);
        record.push_line("Payload", "payload", value.clone());
        record
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for LoggingSink {
    fn on_next(&self, event_name: &str, payload: Option<&Payload>) {
        let record = match payload {
            None => return,
            Some(Payload::Envelope(event)) => self.event_record(event_name, event),
            Some(Payload::Opaque(value)) => self.opaque_record(event_name, value),
        };
        self.backend.emit(&record);
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
