//! Diagnostic bus configuration from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DIAG_SINK_LEVEL` | `trace` | Severity of records written by [`LoggingSink`](crate::LoggingSink) |
//! | `DIAG_OBSERVER_ENABLED` | `true` | Whether observers built from config start enabled |
//! | `DIAG_LISTEN_TO` | *(empty)* | Comma-separated source names observers subscribe to |
//! | `DIAG_CAPTURE_STACK` | `false` | Capture the call stack into every published envelope |

use std::env;
use tracing::Level;

/// Settings for logging sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Severity of emitted records
    pub level: Level,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            level: Level::TRACE,
        }
    }
}

impl SinkConfig {
    /// Read `DIAG_SINK_LEVEL`; unknown values fall back to `trace`.
    pub fn from_env() -> Self {
        Self {
            level: env::var("DIAG_SINK_LEVEL")
                .ok()
                .and_then(|v| parse_level(&v))
                .unwrap_or(Level::TRACE),
        }
    }
}

/// Settings for subscription observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Whether the observer processes notifications right away
    pub enabled: bool,

    /// Source names to subscribe to
    pub listen_to: Vec<String>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_to: Vec::new(),
        }
    }
}

impl ObserverConfig {
    /// Read `DIAG_OBSERVER_ENABLED` and `DIAG_LISTEN_TO`.
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("DIAG_OBSERVER_ENABLED")
                .map(|v| parse_flag(&v, true))
                .unwrap_or(true),

            listen_to: env::var("DIAG_LISTEN_TO")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
        }
    }

    /// Config for the given source names, enabled.
    pub fn listening_to<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            listen_to: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Settings applied to sources created by a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceConfig {
    /// Capture the call stack into every envelope built by the publisher
    pub capture_stack_traces: bool,
}

impl SourceConfig {
    /// Read `DIAG_CAPTURE_STACK`.
    pub fn from_env() -> Self {
        Self {
            capture_stack_traces: env::var("DIAG_CAPTURE_STACK")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(false),
        }
    }
}

/// Parse a level name (`trace`, `debug`, `info`, `warn`, `error`).
pub fn parse_level(value: &str) -> Option<Level> {
    value.trim().parse().ok()
}

fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
