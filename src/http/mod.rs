//! HTTP execution core.
//!
//! Turns abstract operation requests into JSON HTTP exchanges: header
//! resolution, timeout enforcement, retry policy, long-running poll loops,
//! and hierarchical command-event emission. The concrete transport is
//! pluggable through [`fetch::Fetcher`].

pub mod data_api;
pub mod devops;
pub mod fetch;
pub mod retry;
pub mod timeouts;

pub use data_api::{Command, DataApiHttpClient, RawDataApiResponse};
pub use devops::{DevopsHttpClient, DevopsRequest, LongRunningInfo, RawDevopsResponse};
pub use fetch::{DefaultFetcher, FetchRequest, FetchResponse, Fetcher, HttpMethod};
pub use timeouts::TimeoutManager;
