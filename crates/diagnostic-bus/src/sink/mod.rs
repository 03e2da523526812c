//! # Sinks
//!
//! Terminal consumers of diagnostic events.
//!
//! ```text
//! EventSource::write ──→ Sink::on_next(event_name, payload)
//!                              │
//!                              ├── None                → ignored
//!                              ├── Payload::Envelope   → base fields + enrichment
//!                              └── Payload::Opaque     → raw value only
//! ```
//!
//! Sinks run on the producer's thread. Keep them fast and hand slow work off
//! internally.

mod logging;
mod record;

pub use logging::{Enricher, FieldsEnricher, LoggingSink};
pub use record::{LogBackend, LogRecord, TracingBackend};

use crate::envelope::Payload;
use crate::error::BusError;

/// Consumer of `(event name, payload)` pairs written by an event source.
pub trait Sink: Send + Sync + 'static {
    /// Handle one event. `payload` is `None` when the producer published nothing.
    fn on_next(&self, event_name: &str, payload: Option<&Payload>);

    /// Error signalled on the source. Sinks do not propagate it.
    fn on_error(&self, _error: &BusError) {}

    /// The source was disposed. Sinks do not propagate it.
    fn on_completed(&self) {}

    /// Name used in logs and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
