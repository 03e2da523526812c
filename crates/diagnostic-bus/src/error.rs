//! Error types for the diagnostic bus.
//!
//! Only producer-side misuse surfaces as an error to callers. Sink failures
//! and stream errors are reported through [`Sink::on_error`](crate::Sink::on_error)
//! and [`SourceObserver::on_error`](crate::SourceObserver::on_error) and never
//! reach business code.

use thiserror::Error;

/// Diagnostic bus errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Event name passed to a publisher was empty
    #[error("Event name must not be empty")]
    EmptyEventName,

    /// Operation name passed to a publisher was empty
    #[error("Operation name must not be empty")]
    EmptyOperation,

    /// Source name passed to the registry was empty
    #[error("Event source name must not be empty")]
    EmptySourceName,

    /// A sink panicked while handling an event
    #[error("Sink {sink} panicked while handling event {event_name}")]
    SinkPanicked { sink: String, event_name: String },

    /// Error signal raised on a notification stream
    #[error("Notification stream error: {0}")]
    Stream(String),
}

/// Result type for diagnostic bus operations
pub type BusResult<T> = Result<T, BusError>;
