//! Typed client for the Astra Data API and DevOps API.
//!
//! The crate is built around four subsystems:
//!
//! - the **HTTP execution core** ([`http`]): timeouts, retries, long-running
//!   poll loops, header resolution, and command-event emission over a
//!   pluggable fetch transport
//! - the **SerDes pipeline** ([`serdes`]): a recursive, codec-driven
//!   transformer between in-memory [`value::DocValue`] trees and wire JSON,
//!   with collection-mode and table-mode parameterizations
//! - the **cursor engine** ([`cursor`]): lazy, immutable-builder iteration
//!   over server-paginated `find` streams
//! - the **options algebra** ([`options`]): monoid-based layered merging of
//!   client/database/handle/per-call configuration
//!
//! [`db::Database`], [`db::Collection`], [`db::Table`], and
//! [`admin::AdminApi`] are thin handles wiring those subsystems together.
//!
//! ```no_run
//! use astra_client::db::{BigNumberConfig, Database};
//! use astra_client::events::EventEmitter;
//! use astra_client::http::{DataApiHttpClient, DefaultFetcher};
//! use astra_client::http::retry::RetryConfig;
//! use astra_client::options::timeouts::ResolvedTimeouts;
//! use astra_client::token::{HeaderStack, StaticTokenProvider};
//! use astra_client::value::DocValue;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), astra_client::error::Error> {
//! let headers = HeaderStack {
//!     token: Some(Arc::new(StaticTokenProvider::new("AstraCS:...")?)),
//!     providers: vec![],
//! };
//! let client = Arc::new(DataApiHttpClient::new(
//!     Arc::new(DefaultFetcher::new()?),
//!     "https://01234567-aaaa-bbbb-cccc-0123456789ab-us-east1.apps.astra.datastax.com/api/json/v1".into(),
//!     Some("default_keyspace".into()),
//!     headers,
//!     EventEmitter::root(),
//!     &[],
//!     RetryConfig::default(),
//! ));
//! let db = Database::new(client, ResolvedTimeouts::default(), BigNumberConfig::default());
//! let mut cursor = db.collection("users").find(DocValue::empty_object());
//! while let Some(doc) = cursor.next().await? {
//!     println!("{doc:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod constants;
pub mod cursor;
pub mod db;
pub mod duration;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod options;
pub mod serdes;
pub mod token;
pub mod value;

pub use cursor::{CursorState, FindCursor};
pub use error::{Error, ErrorKind};
pub use value::DocValue;
