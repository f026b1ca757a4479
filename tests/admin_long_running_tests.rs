//! DevOps lifecycle operations: long-running creates, drops, regions.

mod common;

use astra_client::admin::{
    build_astra_endpoint, AdminApi, AstraEnvironment, CreateDatabaseOptions, FindRegionsOptions,
};
use astra_client::error::{Error, ErrorKind};
use astra_client::events::{EventEmitter, EventName};
use astra_client::http::devops::DevopsHttpClient;
use astra_client::http::fetch::DefaultFetcher;
use astra_client::http::retry::RetryConfig;
use astra_client::options::timeouts::{ResolvedTimeouts, TimeoutDefaults};
use astra_client::token::{HeaderStack, StaticTokenProvider};
use common::EventRecorder;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn admin_api(mock_uri: &str) -> (AdminApi, Arc<EventEmitter>) {
    let emitter = EventEmitter::root();
    let headers = HeaderStack {
        token: Some(Arc::new(
            StaticTokenProvider::new("AstraCS:test-token").unwrap(),
        )),
        providers: vec![],
    };
    let devops = Arc::new(DevopsHttpClient::new(
        Arc::new(DefaultFetcher::new().unwrap()),
        mock_uri.to_string(),
        headers,
        Arc::clone(&emitter),
        RetryConfig::default(),
    ));
    let timeouts = TimeoutDefaults::default().resolve();
    (
        AdminApi::new(devops, AstraEnvironment::Prod, timeouts),
        emitter,
    )
}

fn quick_create_options() -> CreateDatabaseOptions {
    let mut options = CreateDatabaseOptions::new("T", "GCP", "us-east1");
    options.poll_interval = Duration::from_millis(10);
    options
}

/// Serves the status progression a freshly created database goes through.
struct StatusSequence {
    statuses: Mutex<Vec<&'static str>>,
    polls: Arc<AtomicUsize>,
}

impl StatusSequence {
    fn new(statuses: &[&'static str]) -> (Self, Arc<AtomicUsize>) {
        let polls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                statuses: Mutex::new(statuses.to_vec()),
                polls: Arc::clone(&polls),
            },
            polls,
        )
    }
}

impl Respond for StatusSequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.remove(0)
        } else {
            statuses[0]
        };
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-db-id",
            "status": status,
            "info": {"name": "T", "region": "us-east1", "cloudProvider": "GCP"},
        }))
    }
}

#[tokio::test]
async fn test_create_database_polls_until_active() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("Location", "new-db-id"),
        )
        .mount(&mock_server)
        .await;
    let (sequence, polls) = StatusSequence::new(&["INITIALIZING", "PENDING", "ACTIVE"]);
    Mock::given(method("GET"))
        .and(path("/databases/new-db-id"))
        .respond_with(sequence)
        .mount(&mock_server)
        .await;

    let (admin, emitter) = admin_api(&mock_server.uri());
    let recorder = EventRecorder::attach(&emitter);

    let created = admin.create_database(&quick_create_options()).await.unwrap();
    assert_eq!(created.id, "new-db-id");
    assert_eq!(
        created.endpoint,
        "https://new-db-id-us-east1.apps.astra.datastax.com"
    );
    assert_eq!(polls.load(Ordering::SeqCst), 3);

    assert_eq!(recorder.count_of(EventName::AdminCommandStarted), 1);
    assert!(recorder.count_of(EventName::AdminCommandPolling) >= 1);
    assert_eq!(recorder.count_of(EventName::AdminCommandSucceeded), 1);
    assert_eq!(recorder.count_of(EventName::AdminCommandFailed), 0);

    // Total order: started precedes every poll, which precede the terminal.
    let names = recorder.names();
    assert_eq!(names.first(), Some(&EventName::AdminCommandStarted));
    assert_eq!(names.last(), Some(&EventName::AdminCommandSucceeded));
}

#[tokio::test]
async fn test_non_blocking_create_returns_after_initial_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("Location", "new-db-id"),
        )
        .mount(&mock_server)
        .await;
    let (sequence, polls) = StatusSequence::new(&["INITIALIZING"]);
    Mock::given(method("GET"))
        .and(path("/databases/new-db-id"))
        .respond_with(sequence)
        .mount(&mock_server)
        .await;

    let (admin, _) = admin_api(&mock_server.uri());
    let mut options = quick_create_options();
    options.blocking = false;

    let created = admin.create_database(&options).await.unwrap();
    assert_eq!(created.id, "new-db-id");
    assert_eq!(polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_location_header_is_http_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let (admin, _) = admin_api(&mock_server.uri());
    let err = admin
        .create_database(&quick_create_options())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);
}

#[tokio::test]
async fn test_illegal_status_aborts_polling() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("Location", "new-db-id"),
        )
        .mount(&mock_server)
        .await;
    let (sequence, _) = StatusSequence::new(&["INITIALIZING", "ERROR"]);
    Mock::given(method("GET"))
        .and(path("/databases/new-db-id"))
        .respond_with(sequence)
        .mount(&mock_server)
        .await;

    let (admin, emitter) = admin_api(&mock_server.uri());
    let recorder = EventRecorder::attach(&emitter);

    let err = admin
        .create_database(&quick_create_options())
        .await
        .unwrap_err();
    match err {
        Error::OperationNotAllowed { status, target, .. } => {
            assert_eq!(status, "ERROR");
            assert_eq!(target, "ACTIVE");
        }
        other => panic!("expected OperationNotAllowed, got {other:?}"),
    }
    assert_eq!(recorder.count_of(EventName::AdminCommandFailed), 1);
}

#[tokio::test]
async fn test_drop_database_polls_to_terminated() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases/old-db/terminate"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;
    let (sequence, polls) = StatusSequence::new(&["TERMINATING", "TERMINATED"]);
    Mock::given(method("GET"))
        .and(path("/databases/old-db"))
        .respond_with(sequence)
        .mount(&mock_server)
        .await;

    let (admin, _) = admin_api(&mock_server.uri());
    admin.drop_database("old-db").await.unwrap();
    assert_eq!(polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_find_databases_lists_all() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "status": "ACTIVE", "info": {"name": "one", "region": "us-east1", "cloudProvider": "GCP"}},
            {"id": "b", "status": "MAINTENANCE", "info": {"name": "two", "region": "eu-west-1", "cloudProvider": "AWS"}},
        ])))
        .mount(&mock_server)
        .await;

    let (admin, _) = admin_api(&mock_server.uri());
    let databases = admin.find_databases().await.unwrap();
    assert_eq!(databases.len(), 2);
    assert_eq!(databases[1].info.cloud_provider, "AWS");
}

#[tokio::test]
async fn test_find_available_regions_org_filters() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/regions/serverless"))
        .and(query_param("filter-by-org", "enabled"))
        .and(query_param("region-type", "vector"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "us-east1", "cloudProvider": "GCP", "displayName": "Moncks Corner", "enabled": true},
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/regions/serverless"))
        .and(query_param("filter-by-org", "disabled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "us-west4", "cloudProvider": "GCP", "displayName": "Las Vegas", "enabled": false},
            {"name": "eu-north-1", "cloudProvider": "AWS", "displayName": "Stockholm", "enabled": false},
        ])))
        .mount(&mock_server)
        .await;

    let (admin, _) = admin_api(&mock_server.uri());

    // Omitted → enabled.
    let enabled = admin
        .find_available_regions(FindRegionsOptions::default())
        .await
        .unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].name, "us-east1");

    // Explicit true → still enabled.
    let still_enabled = admin
        .find_available_regions(FindRegionsOptions {
            only_org_enabled_regions: Some(true),
        })
        .await
        .unwrap();
    assert_eq!(still_enabled.len(), 1);

    // Explicit false → disabled.
    let disabled = admin
        .find_available_regions(FindRegionsOptions {
            only_org_enabled_regions: Some(false),
        })
        .await
        .unwrap();
    assert_eq!(disabled.len(), 2);
}

#[tokio::test]
async fn test_provisioning_budget_expiry_names_category() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("Location", "slow-db"),
        )
        .mount(&mock_server)
        .await;
    let (sequence, _) = StatusSequence::new(&["INITIALIZING"]);
    Mock::given(method("GET"))
        .and(path("/databases/slow-db"))
        .respond_with(sequence)
        .mount(&mock_server)
        .await;

    let emitter = EventEmitter::root();
    let headers = HeaderStack {
        token: Some(Arc::new(
            StaticTokenProvider::new("AstraCS:test-token").unwrap(),
        )),
        providers: vec![],
    };
    let devops = Arc::new(DevopsHttpClient::new(
        Arc::new(DefaultFetcher::new().unwrap()),
        mock_server.uri(),
        headers,
        emitter,
        RetryConfig::default(),
    ));
    let timeouts = ResolvedTimeouts {
        database_admin_timeout_ms: 50,
        ..TimeoutDefaults::default().resolve()
    };
    let admin = AdminApi::new(devops, AstraEnvironment::Prod, timeouts);

    let err = admin
        .create_database(&quick_create_options())
        .await
        .unwrap_err();
    match err {
        Error::Timeout { category, .. } => {
            assert_eq!(category.as_str(), "provisioning");
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[test]
fn test_endpoint_matches_environment_suffixes() {
    assert_eq!(
        build_astra_endpoint("id", "us-east1", AstraEnvironment::Prod),
        "https://id-us-east1.apps.astra.datastax.com"
    );
    assert_eq!(
        build_astra_endpoint("id", "us-east1", AstraEnvironment::Dev),
        "https://id-us-east1.apps-dev.astra.datastax.com"
    );
}
