//! # Diagnostic Bus - In-Process Diagnostic Event Bus
//!
//! Producers publish named diagnostic events only when somebody listens.
//! Every event carries a correlation id and a timestamp. Consumers subscribe
//! sinks to named sources through an observer on the source registry.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐  register_event()   ┌──────────────┐
//! │   Producer   │ ──────────────────→ │ EventSource  │
//! └──────────────┘                     │ is_enabled?  │── no ──→ Uuid::nil()
//!                                      └──────┬───────┘
//!                                             │ yes: envelope + write
//!                                             ▼
//!                       ┌────────────────────────────────────────┐
//!                       │ fan-out to subscribed sinks (in order) │
//!                       └──────────┬──────────────────┬──────────┘
//!                                  ▼                  ▼
//!                             LoggingSink         custom Sink
//!
//! ┌──────────────┐  source created    ┌──────────────────────┐  subscribe
//! │SourceRegistry│ ─────────────────→ │ SubscriptionObserver │ ──────────→ EventSource
//! └──────────────┘                    │ (allow-list)         │
//!                                     └──────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Disabled is cheap:** a source without interested subscribers costs one
//!   check; no envelope is built and no payload transform runs.
//! - **Safe teardown:** disposing a subscription is idempotent and may race
//!   an in-flight write (at most one extra delivery).
//! - **Best effort:** sink panics and stream errors never reach producers.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use diagnostic_bus::{LoggingSink, Publish, SourceRegistry, SubscriptionObserver};
//!
//! let registry = SourceRegistry::new();
//!
//! let observer = Arc::new(SubscriptionObserver::new(
//!     Arc::new(LoggingSink::new()),
//!     ["DbQueries"],
//! ));
//! observer.set_enabled(true);
//! let _attachment = observer.attach(&registry);
//!
//! let source = registry.get_or_create("DbQueries").unwrap();
//! let id = source.register_event("query.start", "ExecuteQuery", None).unwrap();
//! assert!(!id.is_nil());
//!
//! registry.shutdown();
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod publisher;
pub mod registry;
pub mod sink;
pub mod source;

// Re-export main types
pub use config::{ObserverConfig, SinkConfig, SourceConfig};
pub use envelope::{DiagnosticEvent, EventEnvelope, Payload, StackTrace};
pub use error::{BusError, BusResult};
pub use observer::SubscriptionObserver;
pub use publisher::{Publish, NOT_PUBLISHED};
pub use registry::{RegistryAttachment, SourceObserver, SourceRegistry};
pub use sink::{Enricher, FieldsEnricher, LogBackend, LogRecord, LoggingSink, Sink, TracingBackend};
pub use source::{EventFilter, EventSource, Subscription};
