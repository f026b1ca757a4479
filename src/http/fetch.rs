//! Pluggable fetch transport.
//!
//! The execution core describes each exchange as a [`FetchRequest`] and hands
//! it to a [`Fetcher`]. Transports must translate their native timeout into
//! the request's typed timeout error, must *not* raise on non-2xx statuses,
//! and must honor `force_http1` (the DevOps gateway rejects HTTP/2).

use crate::error::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Builds the typed timeout error for the operation a request belongs to,
/// given the elapsed time at expiry.
pub type MkTimeoutError = Arc<dyn Fn(Duration) -> Error + Send + Sync>;

/// HTTP methods the Data API and DevOps API use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// One fully resolved exchange to perform.
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    /// Pin the exchange to HTTP/1.x regardless of what the transport could
    /// negotiate.
    pub force_http1: bool,
    pub timeout: Duration,
    pub mk_timeout_error: MkTimeoutError,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("force_http1", &self.force_http1)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// The transport's view of the response; statuses are reported, never raised.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Option<String>,
    pub headers: HashMap<String, String>,
    /// Negotiated major version, 1 or 2.
    pub http_version: u8,
    pub url: String,
    /// Free-form transport diagnostics forwarded into command events.
    pub extra_log_info: Option<serde_json::Value>,
}

impl FetchResponse {
    /// Case-insensitive header lookup (transports report flat name→value
    /// maps, but casing differs between HTTP/1 and HTTP/2).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A concrete HTTP transport.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs one exchange.
    ///
    /// # Errors
    ///
    /// `Error::Timeout` (via the request's maker) when the native timeout
    /// fires; `Error::Network` when no response could be obtained at all.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error>;

    /// Releases held sockets. Invoked exactly once on client shutdown.
    async fn close(&self) {}
}

/// reqwest-backed transport. Two underlying clients: the default one may
/// negotiate HTTP/2; the second is pinned to HTTP/1 for `force_http1`
/// requests.
pub struct DefaultFetcher {
    client: reqwest::Client,
    http1_client: reqwest::Client,
}

/// Installs the process-wide rustls crypto provider on first use. The
/// `rustls-no-provider` reqwest feature requires one to be installed
/// explicitly; see the provider choice rationale in `Cargo.toml`.
fn install_rustls_crypto_provider() {
    static INSTALLED: std::sync::Once = std::sync::Once::new();
    INSTALLED.call_once(|| {
        #[cfg(not(windows))]
        let provider = rustls::crypto::ring::default_provider();
        #[cfg(windows)]
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        let _ = provider.install_default();
    });
}

impl DefaultFetcher {
    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Fails when the underlying HTTP client cannot be initialized.
    pub fn new() -> Result<Self, Error> {
        install_rustls_crypto_provider();
        let client = reqwest::Client::builder().build()?;
        let http1_client = reqwest::Client::builder().http1_only().build()?;
        Ok(Self {
            client,
            http1_client,
        })
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        let client = if request.force_http1 {
            &self.http1_client
        } else {
            &self.client
        };

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err((request.mk_timeout_error)(started.elapsed()));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let http_version = match response.version() {
            reqwest::Version::HTTP_2 => 2,
            _ => 1,
        };
        let url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|value| (k.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = match response.text().await {
            Ok(text) if text.is_empty() => None,
            Ok(text) => Some(text),
            Err(e) if e.is_timeout() => {
                return Err((request.mk_timeout_error)(started.elapsed()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
            body,
            headers,
            http_version,
            url,
            extra_log_info: None,
        })
    }
}
