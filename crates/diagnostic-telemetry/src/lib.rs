//! # Diagnostic Telemetry
//!
//! Process-level wiring for the diagnostic bus: installs the `tracing`
//! subscriber and attaches a logging observer to the global source registry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use diagnostic_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//!
//!     // Sources named in DIAG_LISTEN_TO are now logged
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `diagnostic-bus` | Service name in logs |
//! | `DIAG_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `DIAG_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `DIAG_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `DIAG_LISTEN_TO` | *(empty)* | Sources the logging observer subscribes to |

mod config;
mod logging;
#[cfg(feature = "metrics")]
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
#[cfg(feature = "metrics")]
pub use metrics::encode_metrics;

use diagnostic_bus::{LoggingSink, RegistryAttachment, SourceRegistry, SubscriptionObserver};
use std::sync::Arc;
use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),

    #[error("Failed to encode metrics: {0}")]
    Metrics(String),
}

/// Install logging and attach a logging observer to the global registry.
///
/// Returns a guard that must be held for the lifetime of the application.
/// Dropping it detaches the observer; sources stay registered.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_logging(&config)?;
    Ok(attach_logging(SourceRegistry::global(), &config))
}

/// Apply `config.source` to `registry` and attach a [`LoggingSink`] observer
/// configured by `config`.
///
/// `config.source` replaces the registry's settings (for the global registry,
/// the ones read from the environment at first use) for sources created from
/// now on. Sources that already exist are replayed to the observer.
pub fn attach_logging(registry: &SourceRegistry, config: &TelemetryConfig) -> TelemetryGuard {
    registry.configure(config.source.clone());

    let sink = Arc::new(LoggingSink::from_config(&config.sink));
    let observer = Arc::new(SubscriptionObserver::from_config(sink, &config.observer));
    let attachment = observer.attach_and_replay(registry);

    tracing::debug!(
        enabled = observer.is_enabled(),
        listen_to = ?observer.should_listen_to(),
        subscribed = observer.active_subscriptions(),
        "Logging observer attached"
    );

    TelemetryGuard {
        observer,
        attachment,
    }
}

/// Guard that keeps the logging observer attached.
pub struct TelemetryGuard {
    observer: Arc<SubscriptionObserver>,
    attachment: RegistryAttachment,
}

impl TelemetryGuard {
    /// The attached observer.
    pub fn observer(&self) -> &Arc<SubscriptionObserver> {
        &self.observer
    }

    pub fn is_attached(&self) -> bool {
        !self.attachment.is_detached()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        self.attachment.dispose();
        tracing::info!(
            subscriptions = self.observer.active_subscriptions(),
            "Logging observer detached"
        );
    }
}
