//! Vector-sort and sort-vector retrieval behavior.

mod common;

use astra_client::cursor::CursorState;
use astra_client::value::{DataApiVector, DocValue};
use common::{page, simple_documents, test_client, test_database};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn collection_path() -> String {
    format!("/api/json/v1/{}/vectors", common::TEST_KEYSPACE)
}

/// Echoes the sort vector on the first page only, counting calls and
/// recording whether `includeSortVector` was requested.
struct SortVectorResponder {
    calls: Arc<AtomicUsize>,
    include_flags: Arc<std::sync::Mutex<Vec<bool>>>,
}

impl Respond for SortVectorResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let include = body["find"]["options"]["includeSortVector"]
            .as_bool()
            .unwrap_or(false);
        self.include_flags.lock().unwrap().push(include);

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut response = if call == 0 {
            page(simple_documents(0, 2), Some("more"))
        } else {
            page(simple_documents(2, 2), None)
        };
        if include {
            response["status"] = json!({"sortVector": [1.0, 1.0, 1.0, 1.0, 1.0]});
        }
        ResponseTemplate::new(200).set_body_json(response)
    }
}

#[tokio::test]
async fn test_get_sort_vector_probes_once_and_caches() {
    let mock_server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(SortVectorResponder {
            calls: Arc::clone(&calls),
            include_flags: Arc::new(std::sync::Mutex::new(Vec::new())),
        })
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db
        .collection("vectors")
        .find(DocValue::empty_object())
        .sort(DocValue::from_json(json!({"$vector": [1, 1, 1, 1, 1]})))
        .unwrap()
        .include_sort_vector(true)
        .unwrap();

    let vector = cursor.get_sort_vector().await.unwrap().unwrap();
    assert_eq!(vector, DataApiVector::new(vec![1.0; 5]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Second call answers from the cache, no fetch.
    let again = cursor.get_sort_vector().await.unwrap().unwrap();
    assert_eq!(again, vector);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The probe restored an idle cursor to idle.
    assert_eq!(cursor.state(), CursorState::Idle);
}

#[tokio::test]
async fn test_include_sort_vector_cleared_after_first_page() {
    let mock_server = MockServer::start().await;
    let include_flags = Arc::new(std::sync::Mutex::new(Vec::new()));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(SortVectorResponder {
            calls: Arc::new(AtomicUsize::new(0)),
            include_flags: Arc::clone(&include_flags),
        })
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db
        .collection("vectors")
        .find(DocValue::empty_object())
        .include_sort_vector(true)
        .unwrap();
    cursor.to_array().await.unwrap();

    let flags = include_flags.lock().unwrap().clone();
    // First page asks; the second page must not repeat the work.
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_sort_vector_absent_without_request() {
    let mock_server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(SortVectorResponder {
            calls: Arc::clone(&calls),
            include_flags: Arc::new(std::sync::Mutex::new(Vec::new())),
        })
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db.collection("vectors").find(DocValue::empty_object());

    // includeSortVector was never set: no fetch, no vector.
    assert!(cursor.get_sort_vector().await.unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sort_vector_probe_populates_buffer() {
    let mock_server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(SortVectorResponder {
            calls: Arc::clone(&calls),
            include_flags: Arc::new(std::sync::Mutex::new(Vec::new())),
        })
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db
        .collection("vectors")
        .find(DocValue::empty_object())
        .include_sort_vector(true)
        .unwrap();

    cursor.get_sort_vector().await.unwrap();
    assert_eq!(cursor.buffered(), 2);

    // Iteration reuses the probe page rather than re-fetching it.
    assert!(cursor.next().await.unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_packed_sort_vector_form_decodes() {
    let mock_server = MockServer::start().await;
    let packed = DataApiVector::new(vec![0.5, -0.5]).to_base64();
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"documents": [], "nextPageState": null},
            "status": {"sortVector": {"$binary": packed}},
        })))
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db
        .collection("vectors")
        .find(DocValue::empty_object())
        .include_sort_vector(true)
        .unwrap();

    let vector = cursor.get_sort_vector().await.unwrap().unwrap();
    assert_eq!(vector, DataApiVector::new(vec![0.5, -0.5]));
}
