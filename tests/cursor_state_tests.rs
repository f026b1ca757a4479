//! Cursor state-machine and immutable-builder contracts.

mod common;

use astra_client::cursor::CursorState;
use astra_client::error::{Error, ErrorKind};
use astra_client::value::DocValue;
use common::{page, test_client, test_database};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn collection_path() -> String {
    format!("/api/json/v1/{}/items", common::TEST_KEYSPACE)
}

/// Answers with a single document echoing the `_id` the filter asked for.
struct FilterEcho;

impl Respond for FilterEcho {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let id = body["find"]["filter"]["_id"].clone();
        ResponseTemplate::new(200).set_body_json(page(vec![json!({"_id": id})], None))
    }
}

#[tokio::test]
async fn test_builders_throw_after_iteration_starts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(FilterEcho)
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db
        .collection("items")
        .find(DocValue::from_json(json!({"_id": "1"})));

    cursor.next().await.unwrap();
    assert_eq!(cursor.state(), CursorState::Started);

    let err = cursor
        .filter(DocValue::from_json(json!({"_id": "2"})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CursorState);
    assert!(matches!(cursor.limit(5), Err(Error::CursorState(_))));
    assert!(matches!(
        cursor.sort(DocValue::from_json(json!({"x": 1}))),
        Err(Error::CursorState(_))
    ));
}

#[tokio::test]
async fn test_rewound_cursor_builds_independent_cursors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(FilterEcho)
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut c1 = db
        .collection("items")
        .find(DocValue::from_json(json!({"_id": "1"})));

    c1.next().await.unwrap();
    c1.rewind();
    assert_eq!(c1.state(), CursorState::Idle);
    assert_eq!(c1.consumed(), 0);

    let mut c2 = c1.filter(DocValue::from_json(json!({"_id": "2"}))).unwrap();

    // c1 keeps its original filter; c2 got the new one.
    let d1 = c1.next().await.unwrap().unwrap();
    let d2 = c2.next().await.unwrap().unwrap();
    assert_eq!(d1.get("_id").and_then(DocValue::as_str), Some("1"));
    assert_eq!(d2.get("_id").and_then(DocValue::as_str), Some("2"));
}

#[tokio::test]
async fn test_closed_cursor_behavior() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![json!({"_id": 1})], None)))
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db.collection("items").find(DocValue::empty_object());
    cursor.to_array().await.unwrap();
    assert_eq!(cursor.state(), CursorState::Closed);

    // hasNext is false, next yields nothing, toArray raises.
    assert!(!cursor.has_next().await.unwrap());
    assert!(cursor.next().await.unwrap().is_none());
    let err = cursor.to_array().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CursorState);
}

#[tokio::test]
async fn test_clone_cursor_resets_iteration_but_keeps_shape() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(FilterEcho)
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut original = db
        .collection("items")
        .find(DocValue::from_json(json!({"_id": "42"})))
        .map(|doc| {
            doc.get("_id")
                .and_then(DocValue::as_str)
                .map(String::from)
                .unwrap_or_default()
        })
        .unwrap();

    original.next().await.unwrap();
    let mut copy = original.clone_cursor();
    assert_eq!(copy.state(), CursorState::Idle);
    assert_eq!(copy.consumed(), 0);

    // The copy kept both the filter and the mapping chain.
    assert_eq!(copy.next().await.unwrap().unwrap(), "42");
}

#[test]
fn test_skip_requires_sort() {
    let mock_uri = "http://localhost:1"; // never contacted
    let (client, _) = test_client(mock_uri);
    let db = test_database(client);
    let cursor = db.collection("items").find(DocValue::empty_object());

    let err = cursor.skip(10).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let sorted = cursor.sort(DocValue::from_json(json!({"name": 1}))).unwrap();
    assert!(sorted.skip(10).is_ok());
}

#[test]
fn test_projection_after_mapping_is_rejected() {
    let (client, _) = test_client("http://localhost:1");
    let db = test_database(client);
    let cursor = db.collection("items").find(DocValue::empty_object());

    let mapped = cursor.map(|doc| doc).unwrap();
    let err = mapped.project(json!({"name": 1})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CursorState);

    // The other way around is fine.
    let projected = cursor.project(json!({"name": 1})).unwrap();
    assert!(projected.map(|doc| doc).is_ok());
}

#[tokio::test]
async fn test_mapping_error_closes_cursor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![json!({"_id": {"$uuid": "not-a-valid-uuid"}})],
            None,
        )))
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db.collection("items").find(DocValue::empty_object());

    // The invalid tagged value fails deserialization; the cursor closes and
    // the error propagates.
    let err = cursor.next().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);
    assert_eq!(cursor.state(), CursorState::Closed);
}

#[tokio::test]
async fn test_for_each_early_break_closes() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(collection_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            common::simple_documents(0, 5),
            None,
        )))
        .mount(&mock_server)
        .await;

    let (client, _) = test_client(&mock_server.uri());
    let db = test_database(client);
    let mut cursor = db.collection("items").find(DocValue::empty_object());

    let mut seen = 0;
    cursor
        .for_each(|_| {
            seen += 1;
            seen < 2
        })
        .await
        .unwrap();
    assert_eq!(seen, 2);
    assert_eq!(cursor.state(), CursorState::Closed);
}
