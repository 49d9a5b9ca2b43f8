//! Structured JSON logger
//!
//! - Deterministic key ordering (event first, then severity, then
//!   fields sorted alphabetically)
//! - Explicit severity levels, filtered per component
//! - Synchronous: one write, one flush, one line

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::events::Event;

/// Log severity levels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logging configuration, passed into component constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum severity to emit.
    pub min_severity: Severity,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            min_severity: Severity::Info,
        }
    }
}

impl LogConfig {
    /// Emit everything, including trace detail.
    pub fn verbose() -> Self {
        Self {
            min_severity: Severity::Trace,
        }
    }

    /// Emit only failures.
    pub fn quiet() -> Self {
        Self {
            min_severity: Severity::Error,
        }
    }
}

/// A structured logger value held by each component.
///
/// Copyable so a component can hand it to the pieces it constructs.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    min_severity: Severity,
}

impl Logger {
    /// Build a logger from configuration.
    pub fn new(config: LogConfig) -> Self {
        Self {
            min_severity: config.min_severity,
        }
    }

    /// Log a trace-level event.
    pub fn trace(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Trace, event, fields);
    }

    /// Log an info-level event.
    pub fn info(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Info, event, fields);
    }

    /// Log a warn-level event.
    pub fn warn(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Warn, event, fields);
    }

    /// Log an error-level event (goes to stderr).
    pub fn error(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Error, event, fields);
    }

    /// Log an event with the given severity and fields.
    pub fn log(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        if severity < self.min_severity {
            return;
        }
        if severity >= Severity::Error {
            Self::write_line(severity, event, fields, &mut io::stderr());
        } else {
            Self::write_line(severity, event, fields, &mut io::stdout());
        }
    }

    fn write_line<W: Write>(
        severity: Severity,
        event: Event,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        // JSON built by hand for deterministic key ordering
        let mut output = String::with_capacity(128);

        output.push_str("{\"event\":\"");
        output.push_str(event.as_str());
        output.push_str("\",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted {
            output.push_str(",\"");
            Self::escape_json_string(&mut output, key);
            output.push_str("\":\"");
            Self::escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push_str("}\n");

        let _ = writer.write_all(output.as_bytes());
        let _ = writer.flush();
    }

    fn escape_json_string(output: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c if c.is_control() => {
                    output.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => output.push(c),
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}
