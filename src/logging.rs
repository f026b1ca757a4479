//! Event logging configuration with automatic secret redaction.
//!
//! Command events always flow through the emitter tree; the logging layers
//! configured here additionally print selected events to stdout/stderr.
//! Each layer names the events it covers and where they go; later layers
//! override earlier ones for the events they name. Anything printed passes
//! through header/token redaction first.

use crate::error::Error;
use crate::events::{CommandEvent, EventEmitter, EventFormatter, EventName};
use std::collections::HashMap;
use std::sync::Arc;

/// Which events a layer applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingEvents {
    All,
    Named(Vec<EventName>),
}

/// Where a layer sends its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingOutput {
    /// Emit through the emitter tree only (the default for every event).
    Event,
    Stdout,
    Stderr,
    /// Stdout plus the full event payload.
    StdoutVerbose,
    /// Stderr plus the full event payload.
    StderrVerbose,
}

impl LoggingOutput {
    /// Parses the configuration string form.
    ///
    /// # Errors
    ///
    /// Configuration error for unknown output names.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "event" => Ok(Self::Event),
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            "stdout:verbose" => Ok(Self::StdoutVerbose),
            "stderr:verbose" => Ok(Self::StderrVerbose),
            other => Err(Error::invalid_config(
                "logging.emits",
                format!("unknown output '{other}'"),
            )),
        }
    }

    const fn is_stdout(self) -> bool {
        matches!(self, Self::Stdout | Self::StdoutVerbose)
    }

    const fn is_stderr(self) -> bool {
        matches!(self, Self::Stderr | Self::StderrVerbose)
    }
}

/// One configuration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingLayer {
    pub events: LoggingEvents,
    pub emits: Vec<LoggingOutput>,
}

/// Parsed logging configuration for one client scope.
#[derive(Clone, Default)]
pub struct LoggingConfig {
    resolved: HashMap<EventName, Vec<LoggingOutput>>,
    formatter: Option<EventFormatter>,
}

impl std::fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("resolved", &self.resolved)
            .field("has_formatter", &self.formatter.is_some())
            .finish()
    }
}

impl LoggingConfig {
    /// Resolves layers in order (later layers win per event) and validates
    /// the result.
    ///
    /// # Errors
    ///
    /// Configuration error when a layer routes the same event to both stdout
    /// and stderr.
    pub fn parse(layers: &[LoggingLayer]) -> Result<Self, Error> {
        let mut resolved: HashMap<EventName, Vec<LoggingOutput>> = HashMap::new();
        for layer in layers {
            let covered: Vec<EventName> = match &layer.events {
                LoggingEvents::All => EventName::ALL.to_vec(),
                LoggingEvents::Named(names) => names.clone(),
            };
            for name in covered {
                resolved.insert(name, layer.emits.clone());
            }
        }

        for (name, outputs) in &resolved {
            let stdout = outputs.iter().any(|o| o.is_stdout());
            let stderr = outputs.iter().any(|o| o.is_stderr());
            if stdout && stderr {
                return Err(Error::invalid_config(
                    "logging.emits",
                    format!("event '{name}' routed to both stdout and stderr"),
                ));
            }
        }

        Ok(Self {
            resolved,
            formatter: None,
        })
    }

    /// Replaces the default event formatting.
    #[must_use]
    pub fn with_formatter(mut self, formatter: EventFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Registers console listeners on `emitter` for every configured event.
    pub fn install(&self, emitter: &Arc<EventEmitter>) {
        for (name, outputs) in &self.resolved {
            for output in outputs {
                let (to_stderr, verbose) = match output {
                    LoggingOutput::Event => continue,
                    LoggingOutput::Stdout => (false, false),
                    LoggingOutput::Stderr => (true, false),
                    LoggingOutput::StdoutVerbose => (false, true),
                    LoggingOutput::StderrVerbose => (true, true),
                };
                let formatter = self.formatter.clone();
                emitter.on(*name, move |event| {
                    let line = format_line(event, formatter.as_ref(), verbose);
                    if to_stderr {
                        eprintln!("{line}");
                    } else {
                        println!("{line}");
                    }
                });
            }
        }
    }
}

fn format_line(event: &CommandEvent, formatter: Option<&EventFormatter>, verbose: bool) -> String {
    let mut line = formatter.map_or_else(|| event.format_default(), |f| (f.as_ref())(event));
    if verbose {
        if let Some(extra) = &event.extra_log_info {
            line.push(' ');
            line.push_str(&redact_extra_info(extra).to_string());
        }
    }
    line
}

/// Replacement text for masked values.
const REDACTED: &str = "[REDACTED]";

/// Header names that always carry credentials.
const CREDENTIAL_HEADERS: &[&str] = &["authorization", "token", "cookie", "proxy-authorization"];

/// Whether a header's value must be masked before it reaches a console
/// line. Verbose event output and transport diagnostics both go through
/// this rule set.
#[must_use]
pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    CREDENTIAL_HEADERS.contains(&name.as_str())
        || name.starts_with("x-auth")
        || name.contains("api-key")
        || name.contains("secret")
}

/// Masks a value for logging. An empty value stays empty, so the line still
/// shows the field was present but blank.
#[must_use]
pub fn mask_value(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        REDACTED.to_string()
    }
}

/// Redacts any sensitive-looking field inside transport diagnostics before
/// they hit a console line.
#[must_use]
pub fn redact_extra_info(extra: &serde_json::Value) -> serde_json::Value {
    match extra {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_sensitive_header(k) {
                        (
                            k.clone(),
                            serde_json::Value::String(mask_value(v.as_str().unwrap_or("?"))),
                        )
                    } else {
                        (k.clone(), redact_extra_info(v))
                    }
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
