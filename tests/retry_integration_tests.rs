//! Retry-policy behavior for both API adapters.

mod common;

use astra_client::error::ErrorKind;
use astra_client::events::EventName;
use astra_client::http::retry::RetryConfig;
use astra_client::value::DocValue;
use common::{page, simple_documents, test_client_with_retry, test_database, EventRecorder};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn collection_path() -> String {
    format!("/api/json/v1/{}/users", common::TEST_KEYSPACE)
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 5,
        max_delay_ms: 50,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// A responder that fails N times with a given status code, then succeeds.
struct FailThenSucceed {
    fail_count: usize,
    fail_status: u16,
    success_body: serde_json::Value,
    call_count: Arc<AtomicUsize>,
}

impl FailThenSucceed {
    fn new(
        fail_count: usize,
        fail_status: u16,
        success_body: serde_json::Value,
    ) -> (Self, Arc<AtomicUsize>) {
        let call_count = Arc::new(AtomicUsize::new(0));
        (
            Self {
                fail_count,
                fail_status,
                success_body,
                call_count: Arc::clone(&call_count),
            },
            call_count,
        )
    }
}

impl Respond for FailThenSucceed {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        if count < self.fail_count {
            ResponseTemplate::new(self.fail_status).set_body_json(json!({
                "error": "service temporarily unavailable"
            }))
        } else {
            ResponseTemplate::new(200).set_body_json(self.success_body.clone())
        }
    }
}

#[tokio::test]
async fn test_retryable_read_recovers_from_transient_503() {
    let mock_server = MockServer::start().await;
    let (responder, calls) =
        FailThenSucceed::new(2, 503, page(simple_documents(0, 1), None));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(responder)
        .mount(&mock_server)
        .await;

    let (client, _) = test_client_with_retry(&mock_server.uri(), fast_retry());
    let db = test_database(client);
    let mut cursor = db.collection("users").find(DocValue::empty_object());

    let documents = cursor.to_array().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_share_one_started_and_one_terminal_event() {
    let mock_server = MockServer::start().await;
    let (responder, _) = FailThenSucceed::new(1, 503, page(vec![], None));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(responder)
        .mount(&mock_server)
        .await;

    let (client, emitter) = test_client_with_retry(&mock_server.uri(), fast_retry());
    let recorder = EventRecorder::attach(&emitter);
    let db = test_database(client);
    let mut cursor = db.collection("users").find(DocValue::empty_object());
    cursor.to_array().await.unwrap();

    // Two attempts, one logical command.
    assert_eq!(recorder.count_of(EventName::CommandStarted), 1);
    assert_eq!(recorder.count_of(EventName::CommandSucceeded), 1);
    let ids = recorder.request_ids();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_non_retryable_write_fails_on_first_503() {
    let mock_server = MockServer::start().await;
    let (responder, calls) = FailThenSucceed::new(2, 503, json!({"status": {}}));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(responder)
        .mount(&mock_server)
        .await;

    let (client, _) = test_client_with_retry(&mock_server.uri(), fast_retry());
    let db = test_database(client);

    let err = db
        .collection("users")
        .insert_one(&DocValue::from_json(json!({"x": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);
    // Non-idempotent writes never auto-retry.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;
    let (responder, calls) = FailThenSucceed::new(10, 503, page(vec![], None));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(responder)
        .mount(&mock_server)
        .await;

    let (client, _) = test_client_with_retry(&mock_server.uri(), fast_retry());
    let db = test_database(client);
    let mut cursor = db.collection("users").find(DocValue::empty_object());

    let err = cursor.to_array().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_non_retryable_status_is_not_retried_even_for_reads() {
    let mock_server = MockServer::start().await;
    let (responder, calls) = FailThenSucceed::new(2, 404, page(vec![], None));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(responder)
        .mount(&mock_server)
        .await;

    let (client, _) = test_client_with_retry(&mock_server.uri(), fast_retry());
    let db = test_database(client);
    let mut cursor = db.collection("users").find(DocValue::empty_object());

    let err = cursor.to_array().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_respects_retry_after_header() {
    let mock_server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));

    struct RetryAfterResponder {
        calls: Arc<AtomicUsize>,
    }
    impl Respond for RetryAfterResponder {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "0")
                    .set_body_json(json!({"error": "rate limited"}))
            } else {
                ResponseTemplate::new(200).set_body_json(page(vec![], None))
            }
        }
    }

    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(RetryAfterResponder {
            calls: Arc::clone(&calls),
        })
        .mount(&mock_server)
        .await;

    let (client, _) = test_client_with_retry(&mock_server.uri(), fast_retry());
    let db = test_database(client);
    let mut cursor = db.collection("users").find(DocValue::empty_object());
    cursor.to_array().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
