//! Database lifecycle operations against the DevOps API.
//!
//! Create/list/drop databases, region discovery, and Astra endpoint
//! derivation. Creation and termination are long-running: the control plane
//! answers immediately and the client polls the resource until it reaches its
//! target status.

use crate::constants;
use crate::error::{Error, TimeoutCategory};
use crate::http::devops::{DevopsHttpClient, DevopsRequest, LongRunningInfo};
use crate::http::fetch::HttpMethod;
use crate::http::timeouts::TimeoutManager;
use crate::options::timeouts::ResolvedTimeouts;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Which Astra control plane (and endpoint domain suffix) to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AstraEnvironment {
    #[default]
    Prod,
    Dev,
    Test,
}

impl AstraEnvironment {
    /// The DevOps API base URL for this environment.
    #[must_use]
    pub const fn devops_url(self) -> &'static str {
        match self {
            Self::Prod => constants::DEVOPS_PROD_URL,
            Self::Dev => constants::DEVOPS_DEV_URL,
            Self::Test => constants::DEVOPS_TEST_URL,
        }
    }

    const fn domain_infix(self) -> &'static str {
        match self {
            Self::Prod => "",
            Self::Dev => "-dev",
            Self::Test => "-test",
        }
    }
}

/// Derives the Data API endpoint of a database:
/// `https://{id}-{region}.apps{""|"-dev"|"-test"}.astra.datastax.com`.
#[must_use]
pub fn build_astra_endpoint(id: &str, region: &str, env: AstraEnvironment) -> String {
    format!(
        "https://{id}-{region}.apps{}.astra.datastax.com",
        env.domain_infix()
    )
}

/// Lifecycle statuses the poll loop consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseStatus {
    Initializing,
    Pending,
    Associating,
    Active,
    Maintenance,
    Terminating,
    Terminated,
    /// Any status this client version does not know about.
    Other(String),
}

impl DatabaseStatus {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "INITIALIZING" => Self::Initializing,
            "PENDING" => Self::Pending,
            "ASSOCIATING" => Self::Associating,
            "ACTIVE" => Self::Active,
            "MAINTENANCE" => Self::Maintenance,
            "TERMINATING" => Self::Terminating,
            "TERMINATED" => Self::Terminated,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A database as reported by `GET /databases`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub info: DatabaseConfig,
}

/// The creation-time configuration block inside [`DatabaseInfo`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, rename = "cloudProvider")]
    pub cloud_provider: String,
    #[serde(default)]
    pub keyspaces: Vec<String>,
}

/// One serverless region row from region discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "cloudProvider")]
    pub cloud_provider: String,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "reservedForQualifiedUsers")]
    pub reserved_for_qualified_users: bool,
}

/// Parameters for [`AdminApi::create_database`].
#[derive(Debug, Clone)]
pub struct CreateDatabaseOptions {
    pub name: String,
    pub cloud_provider: String,
    pub region: String,
    pub keyspace: Option<String>,
    /// `false` returns right after the creation request, without polling.
    pub blocking: bool,
    pub poll_interval: Duration,
}

impl CreateDatabaseOptions {
    #[must_use]
    pub fn new(name: impl Into<String>, cloud_provider: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cloud_provider: cloud_provider.into(),
            region: region.into(),
            keyspace: None,
            blocking: true,
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Sets the poll interval from a human-readable form ("5s", "500ms").
    ///
    /// # Errors
    ///
    /// Configuration error on an invalid duration string.
    pub fn with_poll_interval(mut self, interval: &str) -> Result<Self, Error> {
        self.poll_interval = crate::duration::parse_duration("createDatabase.pollInterval", interval)?;
        Ok(self)
    }
}

/// Options for [`AdminApi::find_available_regions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FindRegionsOptions {
    /// `Some(false)` queries regions outside the organization's enabled set
    /// (`filter-by-org=disabled`); `true`/omitted queries enabled ones.
    pub only_org_enabled_regions: Option<bool>,
}

/// A created (or resumed) database handle: id plus derived endpoint.
#[derive(Debug, Clone)]
pub struct CreatedDatabase {
    pub id: String,
    pub endpoint: String,
}

/// The database-lifecycle operations of the control plane.
pub struct AdminApi {
    devops: Arc<DevopsHttpClient>,
    environment: AstraEnvironment,
    timeouts: ResolvedTimeouts,
}

impl AdminApi {
    #[must_use]
    pub const fn new(
        devops: Arc<DevopsHttpClient>,
        environment: AstraEnvironment,
        timeouts: ResolvedTimeouts,
    ) -> Self {
        Self {
            devops,
            environment,
            timeouts,
        }
    }

    fn admin_timeout(&self) -> TimeoutManager {
        TimeoutManager::single_phase(
            TimeoutCategory::DatabaseAdmin,
            Duration::from_millis(self.timeouts.database_admin_timeout_ms),
        )
    }

    fn provisioning_timeout(&self) -> TimeoutManager {
        TimeoutManager::multi_phase(
            TimeoutCategory::Provisioning,
            Duration::from_millis(self.timeouts.request_timeout_ms),
            Duration::from_millis(self.timeouts.database_admin_timeout_ms),
        )
    }

    /// Lists every database in the organization.
    ///
    /// # Errors
    ///
    /// HTTP/transport/timeout kinds from the execution core.
    pub async fn find_databases(&self) -> Result<Vec<DatabaseInfo>, Error> {
        let request = DevopsRequest::new(HttpMethod::Get, "/databases");
        let response = self.devops.request(&request, &self.admin_timeout()).await?;
        let data = response.data.unwrap_or_default();
        Ok(serde_json::from_value(data)?)
    }

    /// Fetches one database by id.
    ///
    /// # Errors
    ///
    /// HTTP/transport/timeout kinds from the execution core.
    pub async fn get_database(&self, id: &str) -> Result<DatabaseInfo, Error> {
        let request = DevopsRequest::new(HttpMethod::Get, format!("/databases/{id}"));
        let response = self.devops.request(&request, &self.admin_timeout()).await?;
        let data = response.data.unwrap_or_default();
        Ok(serde_json::from_value(data)?)
    }

    /// Creates a database and, unless `options.blocking` is off, polls until
    /// it reaches `ACTIVE`.
    ///
    /// # Errors
    ///
    /// `Error::OperationNotAllowed` when provisioning leaves the legal
    /// states; `Error::Timeout` with the `provisioning` category when the
    /// admin budget expires; plus the usual execution kinds.
    pub async fn create_database(
        &self,
        options: &CreateDatabaseOptions,
    ) -> Result<CreatedDatabase, Error> {
        let mut body = serde_json::json!({
            "name": options.name,
            "cloudProvider": options.cloud_provider,
            "region": options.region,
            "capacityUnits": 1,
            "tier": "serverless",
            "dbType": "vector",
        });
        if let Some(keyspace) = &options.keyspace {
            body["keyspace"] = serde_json::json!(keyspace);
        }

        let request = DevopsRequest::new(HttpMethod::Post, "/databases").with_body(body);
        let mut info = LongRunningInfo::new(
            "ACTIVE",
            &["INITIALIZING", "PENDING", "ASSOCIATING", "MAINTENANCE"],
        );
        info.poll_interval = options.poll_interval;
        info.blocking = options.blocking;

        let outcome = self
            .devops
            .request_long_running(&request, &info, &self.provisioning_timeout())
            .await?;
        let endpoint =
            build_astra_endpoint(&outcome.resource_id, &options.region, self.environment);
        Ok(CreatedDatabase {
            id: outcome.resource_id,
            endpoint,
        })
    }

    /// Terminates a database and polls until it reaches `TERMINATED`.
    ///
    /// # Errors
    ///
    /// Same kinds as [`Self::create_database`].
    pub async fn drop_database(&self, id: &str) -> Result<(), Error> {
        let request =
            DevopsRequest::new(HttpMethod::Post, format!("/databases/{id}/terminate"));
        let mut info = LongRunningInfo::new("TERMINATED", &["TERMINATING"]);
        info.resource_id = Some(id.to_string());
        self.devops
            .request_long_running(&request, &info, &self.provisioning_timeout())
            .await?;
        Ok(())
    }

    /// Discovers serverless vector regions.
    ///
    /// # Errors
    ///
    /// HTTP/transport/timeout kinds from the execution core.
    pub async fn find_available_regions(
        &self,
        options: FindRegionsOptions,
    ) -> Result<Vec<RegionInfo>, Error> {
        let filter = if options.only_org_enabled_regions == Some(false) {
            "disabled"
        } else {
            "enabled"
        };
        let request = DevopsRequest::new(HttpMethod::Get, "/regions/serverless")
            .with_query("filter-by-org", filter)
            .with_query("region-type", "vector");
        let response = self.devops.request(&request, &self.admin_timeout()).await?;
        let data = response.data.unwrap_or_default();
        Ok(serde_json::from_value(data)?)
    }
}
