//! Command lifecycle events.
//!
//! The execution core narrates every logical command through a fixed set of
//! events: `commandStarted → (commandWarnings)* → (commandSucceeded |
//! commandFailed)` for the Data API, and the `adminCommand*` family (with
//! `adminCommandPolling` ticks) for the DevOps API. Events flow through the
//! hierarchical [`emitter::EventEmitter`] tree and can also be printed by the
//! logging layer.

pub mod emitter;

pub use emitter::{EventEmitter, ListenerId};

use crate::error::ErrorKind;
use chrono::{DateTime, Local, Utc};
use std::sync::atomic::{AtomicU8, Ordering};

/// The two event families. Request ids are generated per family only when a
/// listener for that family is attached anywhere up the emitter tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    Command,
    AdminCommand,
}

/// All event names the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    CommandStarted,
    CommandSucceeded,
    CommandFailed,
    CommandWarnings,
    AdminCommandStarted,
    AdminCommandSucceeded,
    AdminCommandFailed,
    AdminCommandPolling,
    AdminCommandWarnings,
}

impl EventName {
    /// The family this event belongs to.
    #[must_use]
    pub const fn family(self) -> EventFamily {
        match self {
            Self::CommandStarted
            | Self::CommandSucceeded
            | Self::CommandFailed
            | Self::CommandWarnings => EventFamily::Command,
            _ => EventFamily::AdminCommand,
        }
    }

    /// The camel-case name used in formatted output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CommandStarted => "commandStarted",
            Self::CommandSucceeded => "commandSucceeded",
            Self::CommandFailed => "commandFailed",
            Self::CommandWarnings => "commandWarnings",
            Self::AdminCommandStarted => "adminCommandStarted",
            Self::AdminCommandSucceeded => "adminCommandSucceeded",
            Self::AdminCommandFailed => "adminCommandFailed",
            Self::AdminCommandPolling => "adminCommandPolling",
            Self::AdminCommandWarnings => "adminCommandWarnings",
        }
    }

    /// Every event name, for "all"-style listener registration.
    pub const ALL: &'static [Self] = &[
        Self::CommandStarted,
        Self::CommandSucceeded,
        Self::CommandFailed,
        Self::CommandWarnings,
        Self::AdminCommandStarted,
        Self::AdminCommandSucceeded,
        Self::AdminCommandFailed,
        Self::AdminCommandPolling,
        Self::AdminCommandWarnings,
    ];
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventName {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| {
                crate::error::Error::invalid_config(
                    "logging.events",
                    format!("unknown event name '{s}'"),
                )
            })
    }
}

/// Snapshot of the request a command event describes.
#[derive(Debug, Clone, Default)]
pub struct EventRequestInfo {
    /// Data API command name (`find`, `insertMany`, ...) or DevOps method+path.
    pub command_name: String,
    pub url: String,
    pub keyspace: Option<String>,
    pub target: Option<String>,
}

/// Event-specific payload.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Started,
    Succeeded {
        duration_ms: u64,
    },
    Failed {
        duration_ms: u64,
        error_kind: ErrorKind,
        message: String,
    },
    Warnings {
        warnings: Vec<String>,
    },
    Polling {
        elapsed_ms: u64,
        iteration: u32,
    },
}

/// Propagation state, mutated by listeners through shared references.
const PROPAGATE: u8 = 0;
const STOP: u8 = 1;
const STOP_IMMEDIATE: u8 = 2;

/// One command lifecycle event.
#[derive(Debug)]
pub struct CommandEvent {
    pub name: EventName,
    pub timestamp: DateTime<Utc>,
    /// Shared by every event of one logical command; empty when no listener
    /// for the family was attached at creation (skips UUID cost).
    pub request_id: String,
    pub request: EventRequestInfo,
    pub payload: EventPayload,
    /// Free-form transport diagnostics attached by the fetcher.
    pub extra_log_info: Option<serde_json::Value>,
    propagation: AtomicU8,
}

impl CommandEvent {
    /// Builds an event stamped with the current time.
    #[must_use]
    pub fn new(
        name: EventName,
        request_id: String,
        request: EventRequestInfo,
        payload: EventPayload,
    ) -> Self {
        Self {
            name,
            timestamp: Utc::now(),
            request_id,
            request,
            payload,
            extra_log_info: None,
            propagation: AtomicU8::new(PROPAGATE),
        }
    }

    /// Prevents this event from bubbling past the current emitter.
    pub fn stop_propagation(&self) {
        // Never downgrade an immediate stop.
        let _ = self.propagation.compare_exchange(
            PROPAGATE,
            STOP,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    /// Stops bubbling *and* skips remaining listeners on the current emitter.
    pub fn stop_immediate_propagation(&self) {
        self.propagation.store(STOP_IMMEDIATE, Ordering::Relaxed);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.propagation.load(Ordering::Relaxed) != PROPAGATE
    }

    pub(crate) fn is_stopped_immediately(&self) -> bool {
        self.propagation.load(Ordering::Relaxed) == STOP_IMMEDIATE
    }

    /// One-line human-readable message for this event.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.payload {
            EventPayload::Started => format!("{} started", self.request.command_name),
            EventPayload::Succeeded { duration_ms } => {
                format!("{} succeeded in {duration_ms}ms", self.request.command_name)
            }
            EventPayload::Failed {
                duration_ms,
                error_kind,
                message,
            } => format!(
                "{} failed after {duration_ms}ms ({error_kind}): {message}",
                self.request.command_name
            ),
            EventPayload::Warnings { warnings } => {
                format!("{} warnings: {}", self.request.command_name, warnings.join("; "))
            }
            EventPayload::Polling {
                elapsed_ms,
                iteration,
            } => format!(
                "{} polling (iteration {iteration}, {elapsed_ms}ms elapsed)",
                self.request.command_name
            ),
        }
    }

    /// Default formatting: `YYYY-MM-DD HH:MM:SS TZ [reqId8] [eventName]: message`.
    #[must_use]
    pub fn format_default(&self) -> String {
        let local: DateTime<Local> = self.timestamp.into();
        let req_id8: String = self.request_id.chars().take(8).collect();
        format!(
            "{} [{}] [{}]: {}",
            local.format("%Y-%m-%d %H:%M:%S %Z"),
            req_id8,
            self.name,
            self.message()
        )
    }
}

/// A user-installable replacement for [`CommandEvent::format_default`].
pub type EventFormatter = std::sync::Arc<dyn Fn(&CommandEvent) -> String + Send + Sync>;
