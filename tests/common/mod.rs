//! Shared helpers for the wiremock-driven integration suites.

#![allow(dead_code)]

use astra_client::db::{BigNumberConfig, Database};
use astra_client::events::{EventEmitter, EventName};
use astra_client::http::data_api::DataApiHttpClient;
use astra_client::http::fetch::DefaultFetcher;
use astra_client::http::retry::RetryConfig;
use astra_client::options::timeouts::ResolvedTimeouts;
use astra_client::token::{HeaderStack, StaticTokenProvider};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub const TEST_KEYSPACE: &str = "default_keyspace";

/// A Data API client pointed at a mock server, with its root emitter.
pub fn test_client(mock_uri: &str) -> (Arc<DataApiHttpClient>, Arc<EventEmitter>) {
    test_client_with_retry(mock_uri, RetryConfig::default())
}

pub fn test_client_with_retry(
    mock_uri: &str,
    retry: RetryConfig,
) -> (Arc<DataApiHttpClient>, Arc<EventEmitter>) {
    let emitter = EventEmitter::root();
    let headers = HeaderStack {
        token: Some(Arc::new(
            StaticTokenProvider::new("AstraCS:test-token").unwrap(),
        )),
        providers: vec![],
    };
    let client = Arc::new(DataApiHttpClient::new(
        Arc::new(DefaultFetcher::new().unwrap()),
        format!("{mock_uri}/api/json/v1"),
        Some(TEST_KEYSPACE.to_string()),
        headers,
        Arc::clone(&emitter),
        &[],
        retry,
    ));
    (client, emitter)
}

pub fn test_database(client: Arc<DataApiHttpClient>) -> Database {
    Database::new(
        client,
        ResolvedTimeouts::default(),
        BigNumberConfig::default(),
    )
}

/// Records `(event name, request id)` pairs in emission order.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<(EventName, String)>>>,
}

impl EventRecorder {
    pub fn attach(emitter: &Arc<EventEmitter>) -> Self {
        let recorder = Self::default();
        for name in EventName::ALL {
            let events = Arc::clone(&recorder.events);
            emitter.on(*name, move |event| {
                events
                    .lock()
                    .unwrap()
                    .push((event.name, event.request_id.clone()));
            });
        }
        recorder
    }

    pub fn names(&self) -> Vec<EventName> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn count_of(&self, name: EventName) -> usize {
        self.names().iter().filter(|n| **n == name).count()
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, id)| id.clone())
            .collect()
    }
}

/// One `find` page payload.
pub fn page(documents: Vec<serde_json::Value>, next_page_state: Option<&str>) -> serde_json::Value {
    json!({
        "data": {
            "documents": documents,
            "nextPageState": next_page_state,
        }
    })
}

/// `count` simple documents with sequential integer `_id`s starting at
/// `first_id`.
pub fn simple_documents(first_id: i64, count: i64) -> Vec<serde_json::Value> {
    (first_id..first_id + count)
        .map(|i| json!({"_id": i, "value": format!("doc-{i}")}))
        .collect()
}
