//! # Publisher
//!
//! Producer-side helpers on [`EventSource`]: check whether anybody listens,
//! assign a correlation id, build the envelope and write it, in one call.
//!
//! ```text
//! register_event(name, operation, id?, build?)
//!     │
//!     ├── empty name / operation ──→ Err
//!     │
//!     ├── !is_enabled(name) ──→ Ok(Uuid::nil())     nothing built, `build` not called
//!     │
//!     └── id = id.unwrap_or(new v4)
//!         envelope = { now UTC, operation, id, stack? }
//!         payload = build(envelope) or envelope
//!         write(name, payload) ──→ Ok(id)
//! ```

use crate::envelope::{EventEnvelope, Payload};
use crate::error::{BusError, BusResult};
use crate::metrics;
use crate::source::EventSource;
use uuid::Uuid;

/// Correlation id returned when an event was not published.
pub const NOT_PUBLISHED: Uuid = Uuid::nil();

/// Conditional, correlated event publishing.
pub trait Publish {
    /// Publish `event_name` if enabled, correlated with `correlation_id` or a
    /// fresh id. Returns the id used, or [`NOT_PUBLISHED`].
    fn register_event(
        &self,
        event_name: &str,
        operation: &str,
        correlation_id: Option<Uuid>,
    ) -> BusResult<Uuid>;

    /// Like [`Publish::register_event`], publishing what `build` makes of the
    /// envelope. `build` only runs when the event is enabled; returning `None`
    /// writes an empty payload.
    fn register_event_with<F>(
        &self,
        event_name: &str,
        operation: &str,
        correlation_id: Option<Uuid>,
        build: F,
    ) -> BusResult<Uuid>
    where
        F: FnOnce(EventEnvelope) -> Option<Payload>;

    /// Publish with a freshly allocated correlation id and return it.
    fn register_event_with_id(&self, event_name: &str, operation: &str) -> BusResult<Uuid> {
        self.register_event(event_name, operation, None)
    }

    /// Publish what `build` makes of an envelope with a fresh correlation id.
    fn register_event_with_id_and<F>(
        &self,
        event_name: &str,
        operation: &str,
        build: F,
    ) -> BusResult<Uuid>
    where
        F: FnOnce(EventEnvelope) -> Option<Payload>,
    {
        self.register_event_with(event_name, operation, None, build)
    }
}

impl Publish for EventSource {
    fn register_event(
        &self,
        event_name: &str,
        operation: &str,
        correlation_id: Option<Uuid>,
    ) -> BusResult<Uuid> {
        self.register_event_with(event_name, operation, correlation_id, |envelope| {
            Some(Payload::from(envelope))
        })
    }

    fn register_event_with<F>(
        &self,
        event_name: &str,
        operation: &str,
        correlation_id: Option<Uuid>,
        build: F,
    ) -> BusResult<Uuid>
    where
        F: FnOnce(EventEnvelope) -> Option<Payload>,
    {
        if event_name.is_empty() {
            return Err(BusError::EmptyEventName);
        }
        if operation.is_empty() {
            return Err(BusError::EmptyOperation);
        }

        if !self.is_enabled(event_name) {
            metrics::record_skipped();
            return Ok(NOT_PUBLISHED);
        }

        let correlation_id = correlation_id.unwrap_or_else(Uuid::new_v4);
        let mut envelope = EventEnvelope::new(operation, correlation_id);
        if self.captures_stack_traces() {
            envelope = envelope.with_stack_trace();
        }

        self.write(event_name, build(envelope));
        Ok(correlation_id)
    }
}
