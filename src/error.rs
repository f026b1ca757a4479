//! Error handling module for the Astra client
//!
//! All failures surfaced by the crate are mapped to one of the [`ErrorKind`]
//! categories. The design follows these principles:
//!
//! 1. **Typed payloads**: every variant carries structured fields callers can
//!    inspect without parsing strings (timed-out category, HTTP snapshot,
//!    the full server error list, ...)
//! 2. **Constructor helpers**: `Error::timeout(..)`, `Error::invalid_config(..)`
//!    etc. keep call sites terse
//! 3. **Local retry decisions only**: the execution core never swallows an
//!    error; it either retries (retry adapter) or propagates upward

use crate::value::DocValue;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;

/// The category of budget that expired, named so callers can tell a slow
/// provisioning poll apart from a slow single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutCategory {
    /// A single Data API or DevOps request exceeded its per-request budget.
    Request,
    /// The overall budget of a generic multi-request method expired.
    General,
    /// A DevOps long-running provisioning loop exceeded its overall budget.
    Provisioning,
    /// A database-admin scoped operation expired.
    DatabaseAdmin,
    /// A keyspace-admin scoped operation expired.
    KeyspaceAdmin,
    /// A collection-admin scoped operation expired.
    CollectionAdmin,
    /// A table-admin scoped operation expired.
    TableAdmin,
}

impl TimeoutCategory {
    /// Stable string identifier, used in messages and event payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::General => "general",
            Self::Provisioning => "provisioning",
            Self::DatabaseAdmin => "databaseAdmin",
            Self::KeyspaceAdmin => "keyspaceAdmin",
            Self::CollectionAdmin => "collectionAdmin",
            Self::TableAdmin => "tableAdmin",
        }
    }
}

impl std::fmt::Display for TimeoutCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single error reported by the Data API inside a 2xx response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Machine-readable code, e.g. `COLLECTION_NOT_EXIST`.
    #[serde(default, rename = "errorCode")]
    pub error_code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Free-form server-supplied attributes.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Snapshot of a non-2xx HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpSnapshot {
    pub status: u16,
    pub status_text: String,
    pub body: Option<String>,
    pub url: String,
}

/// Partial progress recovered from a failed multi-document write.
///
/// `insertMany` executes its chunks sequentially in both ordered and
/// unordered mode, so the ids here always follow input order, up to the
/// chunk that failed.
#[derive(Debug, Clone, Default)]
pub struct PartialResult {
    pub inserted_ids: Vec<DocValue>,
}

#[derive(Error, Debug)]
pub enum Error {
    /// The fetch transport failed to obtain any response at all
    /// (connection refused, DNS, TLS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation exceeded one of its budgets.
    #[error("{category} timed out after {elapsed:?} (budget {budget:?})")]
    Timeout {
        category: TimeoutCategory,
        elapsed: Duration,
        budget: Duration,
    },

    /// Non-2xx (other than 401) HTTP response.
    #[error("HTTP {} {} from {}", .0.status, .0.status_text, .0.url)]
    Http(HttpSnapshot),

    /// 401, or a 2xx body carrying the `UNAUTHENTICATED` sentinel.
    #[error("authentication failed against {url}")]
    Authentication { url: String, body: Option<String> },

    /// 2xx response whose envelope carries a non-empty `errors` array.
    #[error("command failed: {}", first_descriptor_message(descriptors))]
    Response {
        descriptors: Vec<ErrorDescriptor>,
        partial_result: Option<PartialResult>,
        raw: serde_json::Value,
    },

    /// `COLLECTION_NOT_EXIST`, reified with the names the caller used.
    #[error("collection '{collection}' does not exist in keyspace '{keyspace}'")]
    CollectionNotFound { keyspace: String, collection: String },

    /// A long-running poll observed a status outside its legal set.
    #[error("operation on '{resource}' not allowed: status '{status}' (expected {target} via {legal_states:?})")]
    OperationNotAllowed {
        resource: String,
        status: String,
        target: String,
        legal_states: Vec<String>,
    },

    /// Caller violated the cursor state contract (builder after start,
    /// re-iterating a closed cursor, ...).
    #[error("cursor error: {0}")]
    CursorState(Cow<'static, str>),

    /// Structural problem producing or consuming a wire value.
    #[error("serialization error{}: {message}", fmt_path(path))]
    Serialization {
        message: Cow<'static, str>,
        path: Vec<String>,
    },

    /// Invalid option value, raised at construction by the options parsers.
    #[error("invalid configuration for '{field}': {message}")]
    Configuration {
        field: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    /// Request submitted after `close()`.
    #[error("client has been closed")]
    ClientClosed,
}

fn first_descriptor_message(descriptors: &[ErrorDescriptor]) -> &str {
    descriptors
        .first()
        .and_then(|d| d.message.as_deref())
        .unwrap_or("(no error message)")
}

fn fmt_path(path: &[String]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at {}", path.join("."))
    }
}

/// Error categories for classification and event payloads.
///
/// Every [`Error`] maps to exactly one kind; retry adapters and logging
/// dispatch on the kind rather than on the variant payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Timeout,
    Http,
    Authentication,
    Response,
    CollectionNotFound,
    OperationNotAllowed,
    CursorState,
    Serialization,
    Configuration,
    ClientClosed,
}

impl ErrorKind {
    /// Get the string identifier for this error kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "Transport",
            Self::Timeout => "Timeout",
            Self::Http => "Http",
            Self::Authentication => "Authentication",
            Self::Response => "Response",
            Self::CollectionNotFound => "CollectionNotFound",
            Self::OperationNotAllowed => "OperationNotAllowed",
            Self::CursorState => "CursorState",
            Self::Serialization => "Serialization",
            Self::Configuration => "Configuration",
            Self::ClientClosed => "ClientClosed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into its [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Transport,
            Self::Json(_) | Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Http(_) => ErrorKind::Http,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Response { .. } => ErrorKind::Response,
            Self::CollectionNotFound { .. } => ErrorKind::CollectionNotFound,
            Self::OperationNotAllowed { .. } => ErrorKind::OperationNotAllowed,
            Self::CursorState(_) => ErrorKind::CursorState,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::ClientClosed => ErrorKind::ClientClosed,
        }
    }

    /// Timeout in the given category after `elapsed` of a `budget`.
    #[must_use]
    pub const fn timeout(category: TimeoutCategory, elapsed: Duration, budget: Duration) -> Self {
        Self::Timeout {
            category,
            elapsed,
            budget,
        }
    }

    /// Invalid option value with the offending field path.
    #[must_use]
    pub fn invalid_config(
        field: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Cursor state-contract violation.
    #[must_use]
    pub fn cursor_state(message: impl Into<Cow<'static, str>>) -> Self {
        Self::CursorState(message.into())
    }

    /// Serialization failure at the given document path.
    #[must_use]
    pub fn serialization(message: impl Into<Cow<'static, str>>, path: &[String]) -> Self {
        Self::Serialization {
            message: message.into(),
            path: path.to_vec(),
        }
    }

    /// Build the right error for a 2xx envelope with a non-empty `errors`
    /// array: the authentication sentinel and `COLLECTION_NOT_EXIST` are
    /// reified into their own kinds.
    #[must_use]
    pub fn from_descriptors(
        descriptors: Vec<ErrorDescriptor>,
        raw: serde_json::Value,
        url: &str,
        keyspace: Option<&str>,
        collection: Option<&str>,
    ) -> Self {
        if let Some(first) = descriptors.first() {
            if first.message.as_deref() == Some(crate::constants::SENTINEL_UNAUTHENTICATED) {
                return Self::Authentication {
                    url: url.to_string(),
                    body: first.message.clone(),
                };
            }
            if first.error_code.as_deref()
                == Some(crate::constants::ERROR_CODE_COLLECTION_NOT_EXIST)
            {
                if let (Some(ks), Some(coll)) = (keyspace, collection) {
                    return Self::CollectionNotFound {
                        keyspace: ks.to_string(),
                        collection: coll.to_string(),
                    };
                }
            }
        }
        Self::Response {
            descriptors,
            partial_result: None,
            raw,
        }
    }

    /// Attach partial write progress to a response error; no-op for other
    /// kinds.
    #[must_use]
    pub fn with_partial_result(self, partial: PartialResult) -> Self {
        match self {
            Self::Response {
                descriptors, raw, ..
            } => Self::Response {
                descriptors,
                partial_result: Some(partial),
                raw,
            },
            other => other,
        }
    }

    /// True when the error came from the server rather than this client.
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Response { .. } | Self::Authentication { .. }
        )
    }
}
