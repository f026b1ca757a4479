//! DevOps API request execution and long-running poll loops.
//!
//! DevOps requests are plain REST exchanges against the control plane, always
//! pinned to HTTP/1.x (gateway limitation). Long-running operations perform
//! the initial request, extract the resource id from the `Location` header,
//! then poll `GET /databases/{id}` until the resource reaches the target
//! status; statuses outside the legal set are protocol violations.

use super::fetch::{FetchRequest, Fetcher, HttpMethod};
use super::retry::{
    is_transient_transport_error, next_delay, server_retry_hint, should_attempt_again,
    status_is_transient, RetryConfig,
};
use super::timeouts::TimeoutManager;
use crate::constants;
use crate::error::{Error, HttpSnapshot};
use crate::events::{
    CommandEvent, EventEmitter, EventFamily, EventName, EventPayload, EventRequestInfo,
};
use crate::token::HeaderStack;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One DevOps exchange to perform.
#[derive(Debug, Clone)]
pub struct DevopsRequest {
    pub method: HttpMethod,
    /// Path below the DevOps base URL, e.g. `/databases`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl DevopsRequest {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// The raw outcome of a DevOps exchange.
#[derive(Debug, Clone)]
pub struct RawDevopsResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub data: Option<serde_json::Value>,
}

impl RawDevopsResponse {
    /// Case-insensitive `Location` header lookup.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(constants::HEADER_LOCATION))
            .map(|(_, v)| v.as_str())
    }
}

/// Poll-loop parameters for a long-running operation.
#[derive(Debug, Clone)]
pub struct LongRunningInfo {
    /// Known resource id; `None` extracts it from the initial response's
    /// `Location` header (missing id is an HTTP error).
    pub resource_id: Option<String>,
    /// Terminal status ending the loop successfully.
    pub target: String,
    /// Statuses that keep the loop polling; anything else is fatal.
    pub legal_states: Vec<String>,
    pub poll_interval: Duration,
    /// `false` returns right after the initial request, without polling.
    pub blocking: bool,
}

impl LongRunningInfo {
    #[must_use]
    pub fn new(target: impl Into<String>, legal_states: &[&str]) -> Self {
        Self {
            resource_id: None,
            target: target.into(),
            legal_states: legal_states.iter().map(ToString::to_string).collect(),
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
            blocking: true,
        }
    }
}

/// Outcome of a long-running operation.
#[derive(Debug, Clone)]
pub struct LongRunningResult {
    pub initial: RawDevopsResponse,
    pub resource_id: String,
}

/// The shared DevOps HTTP client.
pub struct DevopsHttpClient {
    fetcher: Arc<dyn Fetcher>,
    /// `https://api.astra.datastax.com/v2`, no trailing slash.
    base_url: String,
    headers: HeaderStack,
    emitter: Arc<EventEmitter>,
    retry: RetryConfig,
    closed: AtomicBool,
}

impl DevopsHttpClient {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        base_url: String,
        headers: HeaderStack,
        emitter: Arc<EventEmitter>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            emitter,
            retry,
            closed: AtomicBool::new(false),
        }
    }

    /// True once [`Self::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shuts the client down; further requests fail with `ClientClosed`.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.fetcher.close().await;
        }
    }

    /// Performs one DevOps exchange with admin-event narration.
    ///
    /// # Errors
    ///
    /// `Error::Http` on non-2xx, `Error::Authentication` on 401, plus the
    /// transport/timeout kinds.
    pub async fn request(
        &self,
        request: &DevopsRequest,
        timeout: &TimeoutManager,
    ) -> Result<RawDevopsResponse, Error> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let (request_id, request_info) = self.narration(request);
        let started_at = Instant::now();
        self.emit(
            EventName::AdminCommandStarted,
            &request_id,
            &request_info,
            EventPayload::Started,
        );

        let result = self.raw_request(request, timeout).await;
        self.finish(&request_id, &request_info, started_at, result)
    }

    /// Performs the initial request of a long-running operation, then drives
    /// the poll loop until the resource reaches `info.target`.
    ///
    /// Emission order: one `adminCommandStarted`, zero or more
    /// `adminCommandPolling`, one terminal event.
    ///
    /// # Errors
    ///
    /// `Error::OperationNotAllowed` when polling observes a status outside
    /// `info.legal_states`; `Error::Http` when the resource id cannot be
    /// extracted; plus everything [`Self::request`] can raise.
    pub async fn request_long_running(
        &self,
        request: &DevopsRequest,
        info: &LongRunningInfo,
        timeout: &TimeoutManager,
    ) -> Result<LongRunningResult, Error> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let (request_id, request_info) = self.narration(request);
        let started_at = Instant::now();
        self.emit(
            EventName::AdminCommandStarted,
            &request_id,
            &request_info,
            EventPayload::Started,
        );

        let result = self
            .drive_long_running(request, info, timeout, &request_id, &request_info, started_at)
            .await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started_at.elapsed().as_millis() as u64;
        match result {
            Ok(outcome) => {
                self.emit(
                    EventName::AdminCommandSucceeded,
                    &request_id,
                    &request_info,
                    EventPayload::Succeeded { duration_ms },
                );
                Ok(outcome)
            }
            Err(error) => {
                self.emit(
                    EventName::AdminCommandFailed,
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

    async fn drive_long_running(
        &self,
        request: &DevopsRequest,
        info: &LongRunningInfo,
        timeout: &TimeoutManager,
        request_id: &str,
        request_info: &EventRequestInfo,
        started_at: Instant,
    ) -> Result<LongRunningResult, Error> {
        let initial = self.raw_request(request, timeout).await?;

        let resource_id = match &info.resource_id {
            Some(id) => id.clone(),
            None => initial
                .location()
                .map(ToString::to_string)
                .ok_or_else(|| {
                    // The control plane promised an async resource but did
                    // not say where it lives.
                    Error::Http(HttpSnapshot {
                        status: initial.status,
                        status_text: "missing Location header".to_string(),
                        body: initial.data.as_ref().map(ToString::to_string),
                        url: format!("{}{}", self.base_url, request.path),
                    })
                })?,
        };

        if !info.blocking {
            return Ok(LongRunningResult {
                initial,
                resource_id,
            });
        }

        let poll = DevopsRequest::new(HttpMethod::Get, format!("/databases/{resource_id}"));
        let mut iteration: u32 = 0;
        loop {
            tokio::time::sleep(info.poll_interval).await;
            iteration += 1;

            #[allow(clippy::cast_possible_truncation)]
            let elapsed_ms = started_at.elapsed().as_millis() as u64;
            self.emit(
                EventName::AdminCommandPolling,
                request_id,
                request_info,
                EventPayload::Polling {
                    elapsed_ms,
                    iteration,
                },
            );

            let response = self.raw_request(&poll, timeout).await?;
            let status = response
                .data
                .as_ref()
                .and_then(|d| d.get(constants::KEY_STATUS))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            tracing::debug!(resource = %resource_id, %status, iteration, "long-running poll");

            if status == info.target {
                return Ok(LongRunningResult {
                    initial,
                    resource_id,
                });
            }
            if !info.legal_states.iter().any(|s| s == &status) {
                return Err(Error::OperationNotAllowed {
                    resource: resource_id,
                    status,
                    target: info.target.clone(),
                    legal_states: info.legal_states.clone(),
                });
            }
        }
    }

    /// One exchange with DevOps retry policy: transient 5xx and connection
    /// resets re-attempt with capped exponential backoff plus jitter, never
    /// past the remaining budget.
    async fn raw_request(
        &self,
        request: &DevopsRequest,
        timeout: &TimeoutManager,
    ) -> Result<RawDevopsResponse, Error> {
        let url = self.build_url(request);
        let body = request
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let headers = self
            .headers
            .resolve(&[(
                constants::HEADER_CONTENT_TYPE,
                constants::CONTENT_TYPE_JSON.to_string(),
            )])
            .await?;

        let mut attempt = 0usize;
        let response = loop {
            let (budget, mk_timeout_error) = timeout.advance()?;
            let fetch_request = FetchRequest {
                url: url.clone(),
                method: request.method,
                headers: headers.clone(),
                body: body.clone(),
                // The DevOps gateway only speaks HTTP/1.x.
                force_http1: true,
                timeout: budget,
                mk_timeout_error,
            };

            match self.fetcher.fetch(fetch_request).await {
                Ok(response) => {
                    if status_is_transient(response.status) {
                        let retry_after = response
                            .header("retry-after")
                            .and_then(server_retry_hint);
                        let delay = next_delay(&self.retry, attempt, retry_after);
                        if should_attempt_again(&self.retry, attempt, delay, timeout.remaining()) {
                            tracing::debug!(
                                status = response.status,
                                attempt,
                                "retrying transient DevOps error"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    break response;
                }
                Err(error) => {
                    if is_transient_transport_error(&error) {
                        let delay = next_delay(&self.retry, attempt, None);
                        if should_attempt_again(&self.retry, attempt, delay, timeout.remaining()) {
                            tracing::debug!(attempt, "retrying DevOps connection failure");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    return Err(error);
                }
            }
        };

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

        let data = response
            .body
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(RawDevopsResponse {
            status: response.status,
            headers: response.headers,
            data,
        })
    }

    fn build_url(&self, request: &DevopsRequest) -> String {
        let mut url = format!("{}{}", self.base_url, request.path);
        for (i, (name, value)) in request.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&urlencoding::encode(name));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    fn narration(&self, request: &DevopsRequest) -> (String, EventRequestInfo) {
        let request_id = if self
            .emitter
            .has_family_listeners(EventFamily::AdminCommand)
        {
            Uuid::new_v4().to_string()
        } else {
            String::new()
        };
        let request_info = EventRequestInfo {
            command_name: format!("{} {}", request.method.as_str(), request.path),
            url: format!("{}{}", self.base_url, request.path),
            keyspace: None,
            target: None,
        };
        (request_id, request_info)
    }

    fn finish(
        &self,
        request_id: &str,
        request_info: &EventRequestInfo,
        started_at: Instant,
        result: Result<RawDevopsResponse, Error>,
    ) -> Result<RawDevopsResponse, Error> {
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started_at.elapsed().as_millis() as u64;
        match result {
            Ok(response) => {
                self.emit(
                    EventName::AdminCommandSucceeded,
                    request_id,
                    request_info,
                    EventPayload::Succeeded { duration_ms },
                );
                Ok(response)
            }
            Err(error) => {
                self.emit(
                    EventName::AdminCommandFailed,
                    request_id,
                    request_info,
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

    fn emit(
        &self,
        name: EventName,
        request_id: &str,
        request: &EventRequestInfo,
        payload: EventPayload,
    ) {
        self.emitter.emit(&CommandEvent::new(
            name,
            request_id.to_string(),
            request.clone(),
            payload,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_with_query() {
        let client = DevopsHttpClient::new(
            Arc::new(NoopFetcher),
            "https://api.astra.datastax.com/v2/".to_string(),
            HeaderStack::default(),
            EventEmitter::root(),
            RetryConfig::default(),
        );
        let request = DevopsRequest::new(HttpMethod::Get, "/regions/serverless")
            .with_query("filter-by-org", "enabled")
            .with_query("region-type", "vector");
        assert_eq!(
            client.build_url(&request),
            "https://api.astra.datastax.com/v2/regions/serverless?filter-by-org=enabled&region-type=vector"
        );
    }

    #[test]
    fn test_location_lookup() {
        let response = RawDevopsResponse {
            status: 201,
            headers: [("Location".to_string(), "db-id-123".to_string())]
                .into_iter()
                .collect(),
            data: None,
        };
        assert_eq!(response.location(), Some("db-id-123"));
    }

    struct NoopFetcher;

    #[async_trait::async_trait]
    impl Fetcher for NoopFetcher {
        async fn fetch(
            &self,
            _request: FetchRequest,
        ) -> Result<super::super::fetch::FetchResponse, Error> {
            unimplemented!("not exercised")
        }
    }
}
