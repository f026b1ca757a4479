//! The composite per-scope options record.
//!
//! One [`OptionsLayer`] exists per configuration scope (client, database,
//! collection/table, per-call). Merging the stack is a field-wise monoid
//! fold: scalars override rightmost-wins, provider lists append, logging
//! layers prepend so inner scopes run first.

use super::{Appending, Monoid, Prepending, Rightmost, TimeoutDefaults};
use crate::error::Error;
use crate::logging::{LoggingConfig, LoggingLayer};
use crate::options::timeouts::ResolvedTimeouts;
use crate::token::{HeaderStack, HeadersProvider, TokenProvider};
use std::sync::Arc;

/// All options one scope may contribute.
#[derive(Clone, Default)]
pub struct OptionsLayer {
    /// Data API endpoint override.
    pub endpoint: Rightmost<String>,
    /// Working-keyspace override.
    pub keyspace: Rightmost<String>,
    pub token: Rightmost<Arc<dyn TokenProvider>>,
    pub header_providers: Appending<Arc<dyn HeadersProvider>>,
    /// `(name, version)` entries prepended to the user-agent chain.
    pub caller_chain: Appending<(String, Option<String>)>,
    pub logging: Prepending<LoggingLayer>,
    pub timeouts: TimeoutDefaults,
}

impl Monoid for OptionsLayer {
    fn empty() -> Self {
        Self::default()
    }

    fn combine(self, other: Self) -> Self {
        Self {
            endpoint: self.endpoint.combine(other.endpoint),
            keyspace: self.keyspace.combine(other.keyspace),
            token: self.token.combine(other.token),
            header_providers: self.header_providers.combine(other.header_providers),
            caller_chain: self.caller_chain.combine(other.caller_chain),
            logging: self.logging.combine(other.logging),
            timeouts: self.timeouts.combine(other.timeouts),
        }
    }
}

impl OptionsLayer {
    /// The header stack the merged layers describe.
    #[must_use]
    pub fn header_stack(&self) -> HeaderStack {
        HeaderStack {
            token: self.token.0.clone(),
            providers: self.header_providers.0.clone(),
        }
    }

    /// Validated, fully defaulted timeout configuration.
    ///
    /// # Errors
    ///
    /// Configuration error naming the offending timeout field.
    pub fn resolved_timeouts(&self) -> Result<ResolvedTimeouts, Error> {
        Ok(self.timeouts.parse()?.resolve())
    }

    /// Validated logging configuration over the merged layers.
    ///
    /// # Errors
    ///
    /// Configuration error on conflicting stdout/stderr routing.
    pub fn logging_config(&self) -> Result<LoggingConfig, Error> {
        LoggingConfig::parse(&self.logging.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LoggingEvents, LoggingOutput};
    use crate::token::StaticTokenProvider;

    fn layer_with_token(token: &str) -> OptionsLayer {
        OptionsLayer {
            token: Rightmost(Some(Arc::new(
                StaticTokenProvider::new(token).unwrap(),
            ))),
            ..OptionsLayer::default()
        }
    }

    #[test]
    fn test_scoped_token_overrides_client_token() {
        let client = layer_with_token("AstraCS:client");
        let per_call = layer_with_token("AstraCS:per-call");
        let merged = OptionsLayer::concat([client, OptionsLayer::default(), per_call]);
        assert!(merged.token.0.is_some());

        let stack = merged.header_stack();
        let resolved = futures::executor::block_on(stack.resolve(&[])).unwrap();
        assert_eq!(
            resolved.get("Token").map(String::as_str),
            Some("AstraCS:per-call")
        );
    }

    #[test]
    fn test_caller_chain_appends_in_scope_order() {
        let outer = OptionsLayer {
            caller_chain: Appending(vec![("app".to_string(), None)]),
            ..OptionsLayer::default()
        };
        let inner = OptionsLayer {
            caller_chain: Appending(vec![("plugin".to_string(), Some("1.0".to_string()))]),
            ..OptionsLayer::default()
        };
        let merged = OptionsLayer::concat([outer, inner]);
        assert_eq!(merged.caller_chain.0.len(), 2);
        assert_eq!(merged.caller_chain.0[0].0, "app");
    }

    #[test]
    fn test_logging_layers_prepend_inner_first() {
        let client = OptionsLayer {
            logging: Prepending(vec![LoggingLayer {
                events: LoggingEvents::All,
                emits: vec![LoggingOutput::Stderr],
            }]),
            ..OptionsLayer::default()
        };
        let collection = OptionsLayer {
            logging: Prepending(vec![LoggingLayer {
                events: LoggingEvents::Named(vec![crate::events::EventName::CommandFailed]),
                emits: vec![LoggingOutput::Event],
            }]),
            ..OptionsLayer::default()
        };
        let merged = OptionsLayer::concat([client, collection]);
        // The inner (collection) layer sits first.
        assert_eq!(
            merged.logging.0[0].events,
            LoggingEvents::Named(vec![crate::events::EventName::CommandFailed])
        );
        assert!(merged.logging_config().is_ok());
    }

    #[test]
    fn test_timeout_fields_merge_through_the_composite() {
        let client = OptionsLayer {
            timeouts: TimeoutDefaults {
                request_timeout_ms: Some(2_000),
                ..TimeoutDefaults::default()
            },
            ..OptionsLayer::default()
        };
        let call = OptionsLayer {
            timeouts: TimeoutDefaults {
                request_timeout_ms: Some(250),
                ..TimeoutDefaults::default()
            },
            ..OptionsLayer::default()
        };
        let merged = OptionsLayer::concat([client, call]);
        let resolved = merged.resolved_timeouts().unwrap();
        assert_eq!(resolved.request_timeout_ms, 250);
    }

    #[test]
    fn test_empty_layer_is_identity_for_endpoint() {
        let layer = OptionsLayer {
            endpoint: Rightmost(Some("https://db.example.com".to_string())),
            ..OptionsLayer::default()
        };
        let merged = OptionsLayer::concat([OptionsLayer::empty(), layer, OptionsLayer::empty()]);
        assert_eq!(
            merged.endpoint.0.as_deref(),
            Some("https://db.example.com")
        );
    }
}
