//! Authentication tokens and layered header providers.
//!
//! The execution core assembles request headers from a stack of providers:
//! the token provider (`Token` header), optional embedding-service
//! credentials (single-key or AWS-style two-header form), optional reranking
//! credentials, and caller-supplied static headers. Providers may resolve
//! asynchronously; the resolver awaits each exactly once per request.

use crate::constants;
use crate::error::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Supplies the `Token` header value for Data API / DevOps requests.
///
/// Implementations may fetch or refresh the token asynchronously; the HTTP
/// core calls [`TokenProvider::token`] once per request.
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug {
    /// The current token, or `None` to send the request unauthenticated.
    async fn token(&self) -> Result<Option<String>, Error>;
}

/// A fixed token known at construction.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wraps a literal token string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::invalid_config("token", "token must not be empty"));
        }
        Ok(Self { token })
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never leak the token through Debug output.
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<Option<String>, Error> {
        Ok(Some(self.token.clone()))
    }
}

/// Supplies additional headers (embedding keys, reranking keys, custom
/// statics) resolved once per request.
#[async_trait]
pub trait HeadersProvider: Send + Sync + fmt::Debug {
    /// Header name/value pairs to add to the request.
    async fn headers(&self) -> Result<Vec<(String, String)>, Error>;
}

/// Credentials for a vectorize embedding service.
#[derive(Debug, Clone)]
pub enum EmbeddingHeadersProvider {
    /// Single `x-embedding-api-key` header.
    ApiKey(String),
    /// AWS-style two-header form.
    Aws { access_id: String, secret_id: String },
}

#[async_trait]
impl HeadersProvider for EmbeddingHeadersProvider {
    async fn headers(&self) -> Result<Vec<(String, String)>, Error> {
        Ok(match self {
            Self::ApiKey(key) => vec![(
                constants::HEADER_EMBEDDING_API_KEY.to_string(),
                key.clone(),
            )],
            Self::Aws {
                access_id,
                secret_id,
            } => vec![
                (
                    constants::HEADER_EMBEDDING_ACCESS_ID.to_string(),
                    access_id.clone(),
                ),
                (
                    constants::HEADER_EMBEDDING_SECRET_ID.to_string(),
                    secret_id.clone(),
                ),
            ],
        })
    }
}

/// Credentials for a reranking service.
#[derive(Debug, Clone)]
pub struct RerankingHeadersProvider {
    api_key: String,
}

impl RerankingHeadersProvider {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl HeadersProvider for RerankingHeadersProvider {
    async fn headers(&self) -> Result<Vec<(String, String)>, Error> {
        Ok(vec![(
            constants::HEADER_RERANKING_API_KEY.to_string(),
            self.api_key.clone(),
        )])
    }
}

/// Fixed caller-supplied headers.
#[derive(Debug, Clone, Default)]
pub struct StaticHeadersProvider {
    headers: Vec<(String, String)>,
}

impl StaticHeadersProvider {
    #[must_use]
    pub fn new(headers: Vec<(String, String)>) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl HeadersProvider for StaticHeadersProvider {
    async fn headers(&self) -> Result<Vec<(String, String)>, Error> {
        Ok(self.headers.clone())
    }
}

/// The resolved header stack for one client scope.
#[derive(Debug, Clone, Default)]
pub struct HeaderStack {
    pub token: Option<Arc<dyn TokenProvider>>,
    pub providers: Vec<Arc<dyn HeadersProvider>>,
}

impl HeaderStack {
    /// Resolves the full header map for one request: base headers, then the
    /// token, then each provider in registration order (later providers win
    /// on name collisions). Each provider is awaited exactly once.
    ///
    /// # Errors
    ///
    /// Propagates the first provider failure.
    pub async fn resolve(&self, base: &[(&str, String)]) -> Result<HashMap<String, String>, Error> {
        let mut headers: HashMap<String, String> = base
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();

        if let Some(provider) = &self.token {
            if let Some(token) = provider.token().await? {
                headers.insert(constants::HEADER_TOKEN.to_string(), token);
            }
        }

        for provider in &self.providers {
            for (name, value) in provider.headers().await? {
                headers.insert(name, value);
            }
        }

        Ok(headers)
    }
}
