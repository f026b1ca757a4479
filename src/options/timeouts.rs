//! Per-category timeout defaults and their layered merging.
//!
//! Each field overrides rightmost-non-null across layers; `resolve()` fills
//! in the built-in defaults once all layers are merged.

use super::Monoid;
use crate::constants;
use crate::error::Error;

/// Partial timeout configuration, one optional budget per category
/// (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeoutDefaults {
    pub request_timeout_ms: Option<u64>,
    pub general_method_timeout_ms: Option<u64>,
    pub collection_admin_timeout_ms: Option<u64>,
    pub table_admin_timeout_ms: Option<u64>,
    pub database_admin_timeout_ms: Option<u64>,
    pub keyspace_admin_timeout_ms: Option<u64>,
}

/// Fully resolved timeout configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimeouts {
    pub request_timeout_ms: u64,
    pub general_method_timeout_ms: u64,
    pub collection_admin_timeout_ms: u64,
    pub table_admin_timeout_ms: u64,
    pub database_admin_timeout_ms: u64,
    pub keyspace_admin_timeout_ms: u64,
}

impl Default for ResolvedTimeouts {
    fn default() -> Self {
        TimeoutDefaults::default().resolve()
    }
}

/// Timeouts above this are almost certainly a unit mistake (1 week in ms).
const MAX_TIMEOUT_MS: u64 = 7 * 24 * 60 * 60 * 1000;

fn validate_field(field: &'static str, value: Option<u64>) -> Result<(), Error> {
    let Some(ms) = value else { return Ok(()) };
    if ms == 0 {
        return Err(Error::invalid_config(field, "timeout must be greater than 0"));
    }
    if ms > MAX_TIMEOUT_MS {
        return Err(Error::invalid_config(
            field,
            format!("timeout cannot exceed {MAX_TIMEOUT_MS} ms (1 week)"),
        ));
    }
    Ok(())
}

impl TimeoutDefaults {
    /// Validates every present field.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field when a value
    /// is zero or implausibly large.
    pub fn parse(self) -> Result<Self, Error> {
        validate_field("timeoutDefaults.requestTimeoutMs", self.request_timeout_ms)?;
        validate_field(
            "timeoutDefaults.generalMethodTimeoutMs",
            self.general_method_timeout_ms,
        )?;
        validate_field(
            "timeoutDefaults.collectionAdminTimeoutMs",
            self.collection_admin_timeout_ms,
        )?;
        validate_field(
            "timeoutDefaults.tableAdminTimeoutMs",
            self.table_admin_timeout_ms,
        )?;
        validate_field(
            "timeoutDefaults.databaseAdminTimeoutMs",
            self.database_admin_timeout_ms,
        )?;
        validate_field(
            "timeoutDefaults.keyspaceAdminTimeoutMs",
            self.keyspace_admin_timeout_ms,
        )?;
        Ok(self)
    }

    /// Fills unset fields with the built-in defaults.
    #[must_use]
    pub fn resolve(self) -> ResolvedTimeouts {
        ResolvedTimeouts {
            request_timeout_ms: self
                .request_timeout_ms
                .unwrap_or(constants::DEFAULT_REQUEST_TIMEOUT_MS),
            general_method_timeout_ms: self
                .general_method_timeout_ms
                .unwrap_or(constants::DEFAULT_GENERAL_METHOD_TIMEOUT_MS),
            collection_admin_timeout_ms: self
                .collection_admin_timeout_ms
                .unwrap_or(constants::DEFAULT_COLLECTION_ADMIN_TIMEOUT_MS),
            table_admin_timeout_ms: self
                .table_admin_timeout_ms
                .unwrap_or(constants::DEFAULT_TABLE_ADMIN_TIMEOUT_MS),
            database_admin_timeout_ms: self
                .database_admin_timeout_ms
                .unwrap_or(constants::DEFAULT_DATABASE_ADMIN_TIMEOUT_MS),
            keyspace_admin_timeout_ms: self
                .keyspace_admin_timeout_ms
                .unwrap_or(constants::DEFAULT_KEYSPACE_ADMIN_TIMEOUT_MS),
        }
    }
}

impl Monoid for TimeoutDefaults {
    fn empty() -> Self {
        Self::default()
    }

    fn combine(self, other: Self) -> Self {
        Self {
            request_timeout_ms: other.request_timeout_ms.or(self.request_timeout_ms),
            general_method_timeout_ms: other
                .general_method_timeout_ms
                .or(self.general_method_timeout_ms),
            collection_admin_timeout_ms: other
                .collection_admin_timeout_ms
                .or(self.collection_admin_timeout_ms),
            table_admin_timeout_ms: other.table_admin_timeout_ms.or(self.table_admin_timeout_ms),
            database_admin_timeout_ms: other
                .database_admin_timeout_ms
                .or(self.database_admin_timeout_ms),
            keyspace_admin_timeout_ms: other
                .keyspace_admin_timeout_ms
                .or(self.keyspace_admin_timeout_ms),
        }
    }
}
