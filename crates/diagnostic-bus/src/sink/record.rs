//! Log records and the backends that receive them.

use serde_json::Value;
use std::borrow::Cow;
use tracing::Level;

/// One structured log entry: a message template plus ordered named arguments.
///
/// Placeholders in the template are written `{name}` and refer to argument
/// names. Argument names are unique within a record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub template: String,
    pub args: Vec<(Cow<'static, str>, Value)>,
}

impl LogRecord {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            template: String::new(),
            args: Vec::new(),
        }
    }

    /// Append a `label = {name}` line and its argument.
    ///
    /// A name already taken gets a `_2`, `_3`, ... suffix so every line keeps
    /// its own value. Returns the name actually used.
    pub fn push_line(
        &mut self,
        label: &str,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Value>,
    ) -> Cow<'static, str> {
        let mut name = name.into();
        if self.arg(&name).is_some() {
            let mut n = 2;
            while self.arg(&format!("{name}_{n}")).is_some() {
                n += 1;
            }
            name = Cow::Owned(format!("{name}_{n}"));
        }

        if !self.template.is_empty() {
            self.template.push('\n');
        }
        self.template.push_str(label);
        self.template.push_str(" = {");
        self.template.push_str(&name);
        self.template.push('}');
        self.args.push((name.clone(), value.into()));
        name
    }

    /// Argument value by name.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args
            .iter()
            .find(|(arg, _)| *arg == name)
            .map(|(_, value)| value)
    }

    /// Substitute arguments into the template.
    ///
    /// Strings are inserted without quotes; other values use their JSON form.
    /// Unknown placeholders are left as they are.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };

            let name = &after[..end];
            match self.arg(name) {
                Some(Value::String(s)) => out.push_str(s),
                Some(value) => out.push_str(&value.to_string()),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}

/// Structured-logging backend a [`LoggingSink`](super::LoggingSink) writes to.
pub trait LogBackend: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// Backend emitting records as `tracing` events.
///
/// Events use target `diagnostic_bus::sink` and carry the raw template as a
/// field next to the rendered message.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBackend;

macro_rules! emit_at {
    ($level:expr, $($rest:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::event!(target: "diagnostic_bus::sink", Level::ERROR, $($rest)+)
        } else if level == Level::WARN {
            tracing::event!(target: "diagnostic_bus::sink", Level::WARN, $($rest)+)
        } else if level == Level::INFO {
            tracing::event!(target: "diagnostic_bus::sink", Level::INFO, $($rest)+)
        } else if level == Level::DEBUG {
            tracing::event!(target: "diagnostic_bus::sink", Level::DEBUG, $($rest)+)
        } else {
            tracing::event!(target: "diagnostic_bus::sink", Level::TRACE, $($rest)+)
        }
    }};
}

impl LogBackend for TracingBackend {
    fn emit(&self, record: &LogRecord) {
        let message = record.render();
        emit_at!(record.level, template = %record.template, "{}", message);
    }
}
