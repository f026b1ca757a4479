//! Data API command execution.
//!
//! [`DataApiHttpClient`] turns a command envelope into a `POST` against
//! `<baseUrl>/<keyspace>/<collection-or-table>`, enforcing the operation's
//! timeout budget, applying the retry policy to safely-retryable commands,
//! emitting `command*` events, and mapping failures into the typed error
//! taxonomy. It never inspects command semantics beyond the envelope keys
//! (`errors`, `data`, `status`, `warnings`, `nextPageState`).

use super::fetch::{FetchRequest, FetchResponse, Fetcher, HttpMethod};
use super::retry::{
    is_transient_transport_error, next_delay, server_retry_hint, should_attempt_again,
    status_is_transient, RetryConfig,
};
use super::timeouts::TimeoutManager;
use crate::constants;
use crate::error::{Error, ErrorDescriptor, HttpSnapshot};
use crate::events::{
    CommandEvent, EventEmitter, EventFamily, EventName, EventPayload, EventRequestInfo,
};
use crate::token::HeaderStack;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use uuid::Uuid;

/// A single-operation command envelope: `{ <name>: <body> }` on the wire.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub body: serde_json::Value,
    /// Set by the SerDes pipeline when the body holds arbitrary-precision
    /// numbers, so the encoder must preserve numeric tokens verbatim.
    pub big_numbers_present: bool,
}

impl Command {
    #[must_use]
    pub fn new(name: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            body,
            big_numbers_present: false,
        }
    }

    #[must_use]
    pub const fn with_big_numbers(mut self, present: bool) -> Self {
        self.big_numbers_present = present;
        self
    }

    fn envelope(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(1);
        map.insert(self.name.clone(), self.body.clone());
        serde_json::Value::Object(map)
    }
}

/// Per-call execution options.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub timeout: TimeoutManager,
    /// Only caller-marked safely-retryable operations (idempotent reads) are
    /// ever re-attempted.
    pub retryable: bool,
    /// Collection/table path segment; also reifies `COLLECTION_NOT_EXIST`.
    pub collection: Option<String>,
    /// Admin-scoped commands post to the bare base URL, outside any
    /// keyspace.
    pub admin_scope: bool,
}

impl ExecuteOptions {
    /// Single-request options against a collection/table.
    #[must_use]
    pub fn for_target(timeout: TimeoutManager, collection: impl Into<String>) -> Self {
        Self {
            timeout,
            retryable: false,
            collection: Some(collection.into()),
            admin_scope: false,
        }
    }

    /// Keyspace-scoped options (schema commands).
    #[must_use]
    pub const fn for_keyspace(timeout: TimeoutManager) -> Self {
        Self {
            timeout,
            retryable: false,
            collection: None,
            admin_scope: false,
        }
    }

    /// Admin-scoped options (keyspace lifecycle).
    #[must_use]
    pub const fn for_admin(timeout: TimeoutManager) -> Self {
        Self {
            timeout,
            retryable: false,
            collection: None,
            admin_scope: true,
        }
    }

    #[must_use]
    pub const fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

/// The raw `{status?, data?, errors?}` envelope of a successful exchange.
#[derive(Debug, Clone)]
pub struct RawDataApiResponse {
    raw: serde_json::Value,
}

impl RawDataApiResponse {
    #[must_use]
    pub const fn new(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    #[must_use]
    pub const fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    #[must_use]
    pub fn status(&self) -> Option<&serde_json::Value> {
        self.raw.get(constants::KEY_STATUS)
    }

    #[must_use]
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.raw.get(constants::KEY_DATA)
    }

    /// `data.documents`, empty when absent.
    #[must_use]
    pub fn documents(&self) -> &[serde_json::Value] {
        self.data()
            .and_then(|d| d.get(constants::KEY_DOCUMENTS))
            .and_then(serde_json::Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// `data.document` for single-document reads.
    #[must_use]
    pub fn document(&self) -> Option<&serde_json::Value> {
        self.data().and_then(|d| d.get(constants::KEY_DOCUMENT))
    }

    /// The opaque continuation token, when more pages exist.
    #[must_use]
    pub fn next_page_state(&self) -> Option<&str> {
        self.data()
            .and_then(|d| d.get(constants::KEY_NEXT_PAGE_STATE))
            .and_then(serde_json::Value::as_str)
    }

    /// `status.sortVector` on the first page of a vector-sorted read.
    #[must_use]
    pub fn sort_vector(&self) -> Option<&serde_json::Value> {
        self.status().and_then(|s| s.get(constants::KEY_SORT_VECTOR))
    }

    /// `status.insertedIds` for write commands.
    #[must_use]
    pub fn inserted_ids(&self) -> Option<&serde_json::Value> {
        self.status()
            .and_then(|s| s.get(constants::KEY_INSERTED_IDS))
    }

    /// `status.primaryKeySchema` (table inserted-id tuples).
    #[must_use]
    pub fn primary_key_schema(&self) -> Option<&serde_json::Value> {
        self.status()
            .and_then(|s| s.get(constants::KEY_PRIMARY_KEY_SCHEMA))
    }

    /// `status.projectionSchema` (table reads).
    #[must_use]
    pub fn projection_schema(&self) -> Option<&serde_json::Value> {
        self.status()
            .and_then(|s| s.get(constants::KEY_PROJECTION_SCHEMA))
    }

    /// `status.warnings` as display strings.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.status()
            .and_then(|s| s.get(constants::KEY_WARNINGS))
            .and_then(serde_json::Value::as_array)
            .map(|warnings| {
                warnings
                    .iter()
                    .map(|w| {
                        w.get("message")
                            .and_then(serde_json::Value::as_str)
                            .map_or_else(|| w.to_string(), ToString::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The shared Data API HTTP client. Safe to share across concurrent
/// operations; all mutable per-operation state lives in the options.
pub struct DataApiHttpClient {
    fetcher: Arc<dyn Fetcher>,
    /// `https://<host>/api/json/v1`, no trailing slash.
    base_url: String,
    /// Mutable keyspace cell; written only through the owning database
    /// facade before cursors that read it are spawned. Shared across every
    /// scoped clone of this client.
    keyspace: Arc<RwLock<Option<String>>>,
    headers: HeaderStack,
    emitter: Arc<EventEmitter>,
    user_agent: String,
    retry: RetryConfig,
    closed: Arc<AtomicBool>,
}

impl DataApiHttpClient {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        base_url: String,
        keyspace: Option<String>,
        headers: HeaderStack,
        emitter: Arc<EventEmitter>,
        caller_chain: &[(String, Option<String>)],
        retry: RetryConfig,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            keyspace: Arc::new(RwLock::new(keyspace)),
            headers,
            emitter,
            user_agent: build_user_agent(caller_chain),
            retry,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone of this client narrating into `emitter` (a child node in the
    /// hierarchy). Transport, keyspace cell, and shutdown state stay shared.
    #[must_use]
    pub fn scoped(&self, emitter: Arc<EventEmitter>) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            base_url: self.base_url.clone(),
            keyspace: Arc::clone(&self.keyspace),
            headers: self.headers.clone(),
            emitter,
            user_agent: self.user_agent.clone(),
            retry: self.retry.clone(),
            closed: Arc::clone(&self.closed),
        }
    }

    /// The emitter this client narrates into.
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    /// The current working keyspace.
    ///
    /// # Panics
    ///
    /// Panics if the keyspace lock is poisoned.
    #[must_use]
    pub fn keyspace(&self) -> Option<String> {
        self.keyspace.read().expect("keyspace lock poisoned").clone()
    }

    /// Switches the working keyspace. Cursors spawned afterwards observe the
    /// new value; in-flight operations keep the URL they resolved.
    ///
    /// # Panics
    ///
    /// Panics if the keyspace lock is poisoned.
    pub fn use_keyspace(&self, keyspace: impl Into<String>) {
        *self.keyspace.write().expect("keyspace lock poisoned") = Some(keyspace.into());
    }

    /// True once [`Self::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shuts the client down; the fetch transport is closed exactly once and
    /// further requests fail with `ClientClosed`.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.fetcher.close().await;
        }
    }

    /// Executes one command envelope.
    ///
    /// Emission order is `commandStarted → commandWarnings* →
    /// (commandSucceeded | commandFailed)`, with one terminal event per
    /// logical command regardless of retry attempts, all sharing one request
    /// id.
    ///
    /// # Errors
    ///
    /// Every kind in the crate taxonomy may surface here; see [`Error`].
    pub async fn execute(
        &self,
        command: &Command,
        options: &ExecuteOptions,
    ) -> Result<RawDataApiResponse, Error> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let keyspace = if options.admin_scope {
            None
        } else {
            self.keyspace()
        };
        let url = self.build_url(keyspace.as_deref(), options.collection.as_deref());

        let request_id = if self.emitter.has_family_listeners(EventFamily::Command) {
            Uuid::new_v4().to_string()
        } else {
            String::new()
        };
        let request_info = EventRequestInfo {
            command_name: command.name.clone(),
            url: url.clone(),
            keyspace: keyspace.clone(),
            target: options.collection.clone(),
        };

        let started_at = Instant::now();
        self.emit(
            EventName::CommandStarted,
            &request_id,
            &request_info,
            EventPayload::Started,
        );

        let result = self
            .run(command, options, &url, keyspace.as_deref())
            .await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started_at.elapsed().as_millis() as u64;
        match result {
            Ok((response, warnings, extra_log_info)) => {
                if !warnings.is_empty() {
                    self.emit(
                        EventName::CommandWarnings,
                        &request_id,
                        &request_info,
                        EventPayload::Warnings { warnings },
                    );
                }
                self.emit_with_extra(
                    EventName::CommandSucceeded,
                    &request_id,
                    &request_info,
                    EventPayload::Succeeded { duration_ms },
                    extra_log_info,
                );
                Ok(response)
            }
            Err(error) => {
                self.emit(
                    EventName::CommandFailed,
                    &request_id,
                    &request_info,
                    EventPayload::Failed {
                        duration_ms,
                        error_kind: error.kind(),
                        message: error.to_string(),
                    },
                );
                Err(error)
            }
        }
    }

    fn build_url(&self, keyspace: Option<&str>, collection: Option<&str>) -> String {
        let mut url = self.base_url.clone();
        if let Some(ks) = keyspace {
            url.push('/');
            url.push_str(ks);
            if let Some(coll) = collection {
                url.push('/');
                url.push_str(coll);
            }
        }
        url
    }

    async fn run(
        &self,
        command: &Command,
        options: &ExecuteOptions,
        url: &str,
        keyspace: Option<&str>,
    ) -> Result<(RawDataApiResponse, Vec<String>, Option<serde_json::Value>), Error> {
        let body = serde_json::to_string(&command.envelope())?;

        // Header providers are awaited exactly once per logical command.
        let headers = self
            .headers
            .resolve(&[
                (
                    constants::HEADER_CONTENT_TYPE,
                    constants::CONTENT_TYPE_JSON.to_string(),
                ),
                (constants::HEADER_USER_AGENT, self.user_agent.clone()),
            ])
            .await?;

        let mut attempt = 0usize;
        let response = loop {
            let (budget, mk_timeout_error) = options.timeout.advance()?;
            let request = FetchRequest {
                url: url.to_string(),
                method: HttpMethod::Post,
                headers: headers.clone(),
                body: Some(body.clone()),
                force_http1: false,
                timeout: budget,
                mk_timeout_error,
            };

            match self.fetcher.fetch(request).await {
                Ok(response) => {
                    if options.retryable && status_is_transient(response.status) {
                        let retry_after = response
                            .header("retry-after")
                            .and_then(server_retry_hint);
                        let delay = next_delay(&self.retry, attempt, retry_after);
                        if should_attempt_again(
                            &self.retry,
                            attempt,
                            delay,
                            options.timeout.remaining(),
                        ) {
                            tracing::debug!(
                                status = response.status,
                                attempt,
                                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                "retrying transient server error"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    break response;
                }
                Err(error) => {
                    if options.retryable && is_transient_transport_error(&error) {
                        let delay = next_delay(&self.retry, attempt, None);
                        if should_attempt_again(
                            &self.retry,
                            attempt,
                            delay,
                            options.timeout.remaining(),
                        ) {
                            tracing::debug!(attempt, "retrying transient transport error");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    return Err(error);
                }
            }
        };

        self.interpret(response, keyspace, options.collection.as_deref())
    }

    fn interpret(
        &self,
        mut response: FetchResponse,
        keyspace: Option<&str>,
        collection: Option<&str>,
    ) -> Result<(RawDataApiResponse, Vec<String>, Option<serde_json::Value>), Error> {
        let extra_log_info = response.extra_log_info.take();
        if response.status == 401 {
            return Err(Error::Authentication {
                url: response.url,
                body: response.body,
            });
        }

        if !(200..300).contains(&response.status) {
            return Err(Error::Http(HttpSnapshot {
                status: response.status,
                status_text: response.status_text,
                body: response.body,
                url: response.url,
            }));
        }

        let raw: serde_json::Value = match &response.body {
            Some(body) => serde_json::from_str(body)?,
            None => serde_json::Value::Object(serde_json::Map::new()),
        };

        if let Some(errors) = raw
            .get(constants::KEY_ERRORS)
            .and_then(serde_json::Value::as_array)
        {
            if !errors.is_empty() {
                let descriptors: Vec<ErrorDescriptor> = errors
                    .iter()
                    .map(|e| {
                        serde_json::from_value(e.clone()).unwrap_or_else(|_| ErrorDescriptor {
                            error_code: None,
                            message: Some(e.to_string()),
                            attributes: serde_json::Map::new(),
                        })
                    })
                    .collect();
                return Err(Error::from_descriptors(
                    descriptors,
                    raw,
                    &response.url,
                    keyspace,
                    collection,
                ));
            }
        }

        let parsed = RawDataApiResponse::new(raw);
        let warnings = parsed.warnings();
        Ok((parsed, warnings, extra_log_info))
    }

    fn emit(
        &self,
        name: EventName,
        request_id: &str,
        request: &EventRequestInfo,
        payload: EventPayload,
    ) {
        self.emit_with_extra(name, request_id, request, payload, None);
    }

    fn emit_with_extra(
        &self,
        name: EventName,
        request_id: &str,
        request: &EventRequestInfo,
        payload: EventPayload,
        extra_log_info: Option<serde_json::Value>,
    ) {
        let mut event =
            CommandEvent::new(name, request_id.to_string(), request.clone(), payload);
        event.extra_log_info = extra_log_info;
        self.emitter.emit(&event);
    }
}

/// `{caller} {caller} astra-client/{version}` user-agent chain.
fn build_user_agent(caller_chain: &[(String, Option<String>)]) -> String {
    let mut parts: Vec<String> = caller_chain
        .iter()
        .map(|(name, version)| {
            version
                .as_ref()
                .map_or_else(|| name.clone(), |v| format!("{name}/{v}"))
        })
        .collect();
    parts.push(constants::CLIENT_USER_AGENT.to_string());
    parts.join(" ")
}
