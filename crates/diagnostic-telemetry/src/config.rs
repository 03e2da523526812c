//! Telemetry configuration from environment variables.

use diagnostic_bus::{ObserverConfig, SinkConfig, SourceConfig};
use std::env;

/// Configuration for the logging pipeline and the diagnostic bus.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error, or directives)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Logging sink settings
    pub sink: SinkConfig,

    /// Observer settings
    pub observer: ObserverConfig,

    /// Source settings, applied to the registry by `attach_logging`
    pub source: SourceConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "diagnostic-bus".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            sink: SinkConfig::default(),
            observer: ObserverConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: diagnostic-bus)
    /// - `DIAG_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `DIAG_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `DIAG_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `DIAG_SINK_LEVEL`, `DIAG_OBSERVER_ENABLED`, `DIAG_LISTEN_TO`,
    ///   `DIAG_CAPTURE_STACK`: see `diagnostic_bus::config`
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "diagnostic-bus".to_string()),

            log_level: env::var("DIAG_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("DIAG_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("DIAG_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            sink: SinkConfig::from_env(),
            observer: ObserverConfig::from_env(),
            source: SourceConfig::from_env(),
        }
    }

    /// Raise the log filter so records from the logging sink are not dropped.
    ///
    /// Appends a `diagnostic_bus::sink=<level>` directive unless the filter
    /// already mentions the sink target.
    pub fn effective_filter(&self) -> String {
        if self.log_level.contains("diagnostic_bus::sink") {
            return self.log_level.clone();
        }
        let sink_level = self.sink.level.as_str().to_lowercase();
        if self.log_level.is_empty() {
            format!("diagnostic_bus::sink={sink_level}")
        } else {
            format!("{},diagnostic_bus::sink={sink_level}", self.log_level)
        }
    }
}
