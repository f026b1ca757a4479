//! Centralized string constants for the Astra client
//!
//! This module contains commonly used string literals to:
//! - Reduce string duplication
//! - Improve maintainability
//! - Ensure consistency across the codebase

// HTTP Headers
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_TOKEN: &str = "Token";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_EMBEDDING_API_KEY: &str = "x-embedding-api-key";
pub const HEADER_EMBEDDING_ACCESS_ID: &str = "x-embedding-access-id";
pub const HEADER_EMBEDDING_SECRET_ID: &str = "x-embedding-secret-id";
pub const HEADER_RERANKING_API_KEY: &str = "reranking-api-key";
pub const HEADER_LOCATION: &str = "location";

// Content Types
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Data API wire tags (collection mode)
pub const TAG_DATE: &str = "$date";
pub const TAG_UUID: &str = "$uuid";
pub const TAG_OBJECT_ID: &str = "$objectId";
pub const TAG_BINARY: &str = "$binary";
pub const TAG_VECTOR: &str = "$vector";
pub const TAG_VECTORIZE: &str = "$vectorize";

// Response envelope keys the execution core extracts
pub const KEY_ERRORS: &str = "errors";
pub const KEY_DATA: &str = "data";
pub const KEY_STATUS: &str = "status";
pub const KEY_WARNINGS: &str = "warnings";
pub const KEY_DOCUMENTS: &str = "documents";
pub const KEY_DOCUMENT: &str = "document";
pub const KEY_NEXT_PAGE_STATE: &str = "nextPageState";
pub const KEY_INSERTED_IDS: &str = "insertedIds";
pub const KEY_SORT_VECTOR: &str = "sortVector";
pub const KEY_PRIMARY_KEY_SCHEMA: &str = "primaryKeySchema";
pub const KEY_PROJECTION_SCHEMA: &str = "projectionSchema";

// Data API error codes the core reifies
pub const ERROR_CODE_COLLECTION_NOT_EXIST: &str = "COLLECTION_NOT_EXIST";

// Body sentinel that forces an authentication error regardless of HTTP status
pub const SENTINEL_UNAUTHENTICATED: &str = "UNAUTHENTICATED: Invalid token";

// DevOps API
pub const DEVOPS_PROD_URL: &str = "https://api.astra.datastax.com/v2";
pub const DEVOPS_DEV_URL: &str = "https://api.dev.cloud.datastax.com/v2";
pub const DEVOPS_TEST_URL: &str = "https://api.test.cloud.datastax.com/v2";

// Defaults
pub const DEFAULT_KEYSPACE: &str = "default_keyspace";
pub const DEFAULT_DATA_API_PATH: &str = "api/json/v1";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
pub const CLIENT_USER_AGENT: &str = concat!("astra-client/", env!("CARGO_PKG_VERSION"));

// SerDes traversal guard. Subtrees deeper than this are passed through
// untouched rather than recursed into.
pub const MAX_SERDES_DEPTH: usize = 250;

// Timeout defaults (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_GENERAL_METHOD_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_COLLECTION_ADMIN_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_TABLE_ADMIN_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_DATABASE_ADMIN_TIMEOUT_MS: u64 = 600_000;
pub const DEFAULT_KEYSPACE_ADMIN_TIMEOUT_MS: u64 = 30_000;
