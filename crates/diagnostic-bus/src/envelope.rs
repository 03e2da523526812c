//! # Event Envelope
//!
//! The common diagnostic payload carried by every enriched event: a UTC
//! timestamp, the operation name, a correlation id and an optional captured
//! call stack.
//!
//! Envelopes are immutable once built. They are shared read-only across the
//! fan-out to every subscribed sink.

use chrono::{DateTime, Local, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Call stack captured at envelope construction.
#[derive(Clone)]
pub struct StackTrace(Arc<Backtrace>);

impl StackTrace {
    /// Capture the current call stack regardless of `RUST_BACKTRACE`.
    pub fn capture() -> Self {
        Self(Arc::new(Backtrace::force_capture()))
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StackTrace { .. }")
    }
}

impl Serialize for StackTrace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Diagnostic event base information.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    timestamp: DateTime<Utc>,
    operation: String,
    correlation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack_trace: Option<StackTrace>,
}

impl EventEnvelope {
    /// Create an envelope stamped with the current UTC time.
    pub fn new(operation: impl Into<String>, correlation_id: Uuid) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            correlation_id,
            stack_trace: None,
        }
    }

    /// Attach the current call stack.
    #[must_use]
    pub fn with_stack_trace(mut self) -> Self {
        self.stack_trace = Some(StackTrace::capture());
        self
    }

    /// Timestamp in UTC.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp in the local timezone. Computed on every call.
    pub fn timestamp_local(&self) -> DateTime<Local> {
        self.timestamp.with_timezone(&Local)
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Correlation id linking sub-events of one operation.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Captured call stack, if any.
    pub fn stack_trace(&self) -> Option<&StackTrace> {
        self.stack_trace.as_ref()
    }

    /// Turn the envelope into an event that can carry domain fields.
    pub fn extend(self) -> DiagnosticEvent {
        DiagnosticEvent {
            envelope: self,
            fields: Map::new(),
        }
    }
}

/// An envelope extended with producer-defined domain fields.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    #[serde(flatten)]
    envelope: EventEnvelope,
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

impl DiagnosticEvent {
    /// Add a domain field. A field with the same name is replaced.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn envelope(&self) -> &EventEnvelope {
        &self.envelope
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl From<EventEnvelope> for DiagnosticEvent {
    fn from(envelope: EventEnvelope) -> Self {
        envelope.extend()
    }
}

/// What a source writes to its subscribers.
///
/// The variant is decided by the producer; sinks branch on it once.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Enriched diagnostic event
    Envelope(DiagnosticEvent),
    /// Arbitrary value without correlation information
    Opaque(Value),
}

impl Payload {
    /// Correlation id of an enriched event.
    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            Payload::Envelope(event) => Some(event.envelope().correlation_id()),
            Payload::Opaque(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&DiagnosticEvent> {
        match self {
            Payload::Envelope(event) => Some(event),
            Payload::Opaque(_) => None,
        }
    }
}

impl From<EventEnvelope> for Payload {
    fn from(envelope: EventEnvelope) -> Self {
        Payload::Envelope(envelope.extend())
    }
}

impl From<DiagnosticEvent> for Payload {
    fn from(event: DiagnosticEvent) -> Self {
        Payload::Envelope(event)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Opaque(value)
    }
}
