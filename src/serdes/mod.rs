//! Serialization/deserialization pipeline.
//!
//! A single recursive traversal maps between in-memory [`DocValue`] trees and
//! wire JSON, driven by the codec registry. The same engine serves both
//! collection mode (document-style `$`-tagged wire forms) and table mode
//! (schema-informed column parsing); the modes differ only in the codecs they
//! register and in how wire type tags are resolved.

pub mod codec;
pub mod collection;
pub mod table;

pub use collection::collection_serdes;
pub use table::{table_serdes, TableSchema};

use crate::constants::MAX_SERDES_DEPTH;
use crate::error::Error;
use crate::value::{DocKind, DocValue};
use bigdecimal::BigDecimal;
pub use codec::PathSpec;
use codec::{
    DesCodec, DesCtx, DesRegistry, DesResult, SerCodec, SerCtx, SerRegistry, SerResult,
};
use indexmap::IndexMap;
use std::str::FromStr;
use std::sync::Arc;

/// How wire numbers rehydrate, configurable per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BigNumberPolicy {
    /// `i64` when the token fits, `f64` otherwise (may round).
    #[default]
    Never,
    /// Integral tokens become `Int`; tokens too wide for `i64` fall back to
    /// `BigNumber` rather than rounding.
    AlwaysBigInt,
    /// Every numeric token becomes an arbitrary-precision `BigNumber`.
    AlwaysBigNumber,
    /// `Int`/`Double` when the token round-trips exactly, `BigNumber` when it
    /// would lose precision.
    OnlyWhenLossy,
}

/// Resolves the wire type tag for a node (mode-specific).
pub type TypeResolver =
    Arc<dyn Fn(&[String], &serde_json::Value) -> Option<String> + Send + Sync>;

/// Raw configuration a [`SerDes`] instance is built from.
pub struct SerdesConfig {
    pub serialize: Vec<SerCodec>,
    pub deserialize: Vec<DesCodec>,
    /// Per-path number policies; first exact match wins, [`BigNumberPolicy::Never`]
    /// when nothing matches.
    pub big_numbers: Vec<(PathSpec, BigNumberPolicy)>,
    pub default_big_number_policy: BigNumberPolicy,
    pub type_resolver: Option<TypeResolver>,
}

impl Default for SerdesConfig {
    fn default() -> Self {
        Self {
            serialize: Vec::new(),
            deserialize: Vec::new(),
            big_numbers: Vec::new(),
            default_big_number_policy: BigNumberPolicy::default(),
            type_resolver: None,
        }
    }
}

/// An immutable serialization pipeline, owned by the enclosing collection or
/// table handle. Safe to share across concurrent operations.
pub struct SerDes {
    ser: SerRegistry,
    des: DesRegistry,
    big_numbers: Vec<(PathSpec, BigNumberPolicy)>,
    default_policy: BigNumberPolicy,
    type_resolver: Option<TypeResolver>,
}

/// Output of [`SerDes::serialize`]: the wire tree plus whether any
/// arbitrary-precision numbers are present (so the HTTP layer can keep a
/// precision-preserving encoder).
pub struct Serialized {
    pub wire: serde_json::Value,
    pub big_numbers_present: bool,
}

impl SerDes {
    /// Builds the registry once from raw declarations.
    #[must_use]
    pub fn new(config: SerdesConfig) -> Self {
        Self {
            ser: SerRegistry::build(config.serialize),
            des: DesRegistry::build(config.deserialize),
            big_numbers: config.big_numbers,
            default_policy: config.default_big_number_policy,
            type_resolver: config.type_resolver,
        }
    }

    /// Serializes an in-memory tree to its wire form.
    ///
    /// # Errors
    ///
    /// Fails on invalid tagged values (non-finite doubles, typed scalars with
    /// no registered codec) — never silently coerces.
    pub fn serialize(&self, value: &DocValue) -> Result<Serialized, Error> {
        let mut path = Vec::new();
        let mut big_numbers_present = false;
        let wire = self.serialize_node(value, &mut path, 0, &mut big_numbers_present)?;
        Ok(Serialized {
            wire,
            big_numbers_present,
        })
    }

    /// Rehydrates a wire tree into in-memory values.
    ///
    /// # Errors
    ///
    /// Fails on structurally invalid tagged values (bad UUID hex, invalid
    /// calendar dates, ...).
    pub fn deserialize(&self, wire: &serde_json::Value) -> Result<DocValue, Error> {
        let mut path = Vec::new();
        self.deserialize_node(wire, &mut path, 0)
    }

    fn policy_for(&self, path: &[String]) -> BigNumberPolicy {
        self.big_numbers
            .iter()
            .find(|(spec, _)| codec::path_matches(spec, path))
            .map_or(self.default_policy, |(_, policy)| *policy)
    }

    fn serialize_node(
        &self,
        value: &DocValue,
        path: &mut Vec<String>,
        depth: usize,
        big_numbers_present: &mut bool,
    ) -> Result<serde_json::Value, Error> {
        // Pathologically deep trees pass through as leaves rather than
        // blowing the stack.
        if depth >= MAX_SERDES_DEPTH {
            if matches!(value.kind(), DocKind::BigNumber) {
                *big_numbers_present = true;
            }
            return Ok(value.to_json_lossy());
        }

        let candidates = self.ser.candidates(path, value);
        let mut replacement: Option<DocValue> = None;
        let mut after_hooks: Vec<codec::SerAfterFn> = Vec::new();

        for transform in candidates {
            let current = replacement.as_ref().unwrap_or(value);
            let ctx = SerCtx { path };
            match transform(&ctx, current)? {
                SerResult::Replace(wire) => {
                    let mut wire = wire;
                    for hook in &after_hooks {
                        wire = hook(wire)?;
                    }
                    return Ok(wire);
                }
                SerResult::Recurse { value, map_after } => {
                    replacement = Some(value);
                    if let Some(hook) = map_after {
                        after_hooks.push(hook);
                    }
                }
                SerResult::Nevermind => {}
            }
        }

        let effective = replacement.as_ref().unwrap_or(value);
        let mut wire = self.serialize_default(effective, path, depth, big_numbers_present)?;
        for hook in &after_hooks {
            wire = hook(wire)?;
        }
        Ok(wire)
    }

    fn serialize_default(
        &self,
        value: &DocValue,
        path: &mut Vec<String>,
        depth: usize,
        big_numbers_present: &mut bool,
    ) -> Result<serde_json::Value, Error> {
        match value {
            DocValue::Null => Ok(serde_json::Value::Null),
            DocValue::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            DocValue::Int(i) => Ok(serde_json::Value::from(*i)),
            DocValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    Error::serialization("non-finite double cannot be serialized", path)
                }),
            DocValue::BigNumber(n) => {
                *big_numbers_present = true;
                Ok(serde_json::Value::Number(big_decimal_to_number(n)))
            }
            DocValue::String(s) => Ok(serde_json::Value::String(s.clone())),
            DocValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(i.to_string());
                    let wire = self.serialize_node(item, path, depth + 1, big_numbers_present);
                    path.pop();
                    out.push(wire?);
                }
                Ok(serde_json::Value::Array(out))
            }
            DocValue::Object(map) => {
                // Entries are visited in key-reverse order (deletion-safe for
                // mutating hooks); the wire map is rebuilt in original order.
                let mut processed: Vec<(String, serde_json::Value)> =
                    Vec::with_capacity(map.len());
                for (key, child) in map.iter().rev() {
                    path.push(key.clone());
                    let wire = self.serialize_node(child, path, depth + 1, big_numbers_present);
                    path.pop();
                    processed.push((key.clone(), wire?));
                }
                processed.reverse();
                Ok(serde_json::Value::Object(processed.into_iter().collect()))
            }
            other => Err(Error::serialization(
                format!("no codec registered for {:?} value", other.kind()),
                path,
            )),
        }
    }

    fn deserialize_node(
        &self,
        wire: &serde_json::Value,
        path: &mut Vec<String>,
        depth: usize,
    ) -> Result<DocValue, Error> {
        if depth >= MAX_SERDES_DEPTH {
            return Ok(DocValue::from_json(wire.clone()));
        }

        let tag = self
            .type_resolver
            .as_ref()
            .and_then(|resolver| resolver(path, wire));
        let candidates = self.des.candidates(path, tag.as_deref());
        let mut replacement: Option<serde_json::Value> = None;
        let mut after_hooks: Vec<codec::DesAfterFn> = Vec::new();

        for transform in candidates {
            let current = replacement.as_ref().unwrap_or(wire);
            let ctx = DesCtx {
                path,
                type_tag: tag.as_deref(),
            };
            match transform(&ctx, current)? {
                DesResult::Replace(value) => {
                    let mut value = value;
                    for hook in &after_hooks {
                        value = hook(value)?;
                    }
                    return Ok(value);
                }
                DesResult::Recurse { value, map_after } => {
                    replacement = Some(value);
                    if let Some(hook) = map_after {
                        after_hooks.push(hook);
                    }
                }
                DesResult::Nevermind => {}
            }
        }

        let effective = replacement.as_ref().unwrap_or(wire);
        let mut value = self.deserialize_default(effective, path, depth)?;
        for hook in &after_hooks {
            value = hook(value)?;
        }
        Ok(value)
    }

    fn deserialize_default(
        &self,
        wire: &serde_json::Value,
        path: &mut Vec<String>,
        depth: usize,
    ) -> Result<DocValue, Error> {
        match wire {
            serde_json::Value::Null => Ok(DocValue::Null),
            serde_json::Value::Bool(b) => Ok(DocValue::Bool(*b)),
            serde_json::Value::String(s) => Ok(DocValue::String(s.clone())),
            serde_json::Value::Number(n) => Ok(rehydrate_number(n, self.policy_for(path))),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(i.to_string());
                    let value = self.deserialize_node(item, path, depth + 1);
                    path.pop();
                    out.push(value?);
                }
                Ok(DocValue::Array(out))
            }
            serde_json::Value::Object(map) => {
                let mut processed: Vec<(String, DocValue)> = Vec::with_capacity(map.len());
                for (key, child) in map.iter().rev() {
                    path.push(key.clone());
                    let value = self.deserialize_node(child, path, depth + 1);
                    path.pop();
                    processed.push((key.clone(), value?));
                }
                processed.reverse();
                Ok(DocValue::Object(
                    processed.into_iter().collect::<IndexMap<_, _>>(),
                ))
            }
        }
    }
}

fn big_decimal_to_number(n: &BigDecimal) -> serde_json::Number {
    // BigDecimal's plain-decimal rendering is always a valid JSON number
    // token; arbitrary_precision keeps it verbatim.
    serde_json::Number::from_string_unchecked(n.to_plain_string())
}

fn rehydrate_number(n: &serde_json::Number, policy: BigNumberPolicy) -> DocValue {
    let token = n.to_string();
    let integral = !token.contains(['.', 'e', 'E']);
    match policy {
        BigNumberPolicy::Never => n.as_i64().map_or_else(
            || DocValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            DocValue::Int,
        ),
        BigNumberPolicy::AlwaysBigInt => {
            if integral {
                n.as_i64().map_or_else(
                    || big_number_from_token(&token),
                    DocValue::Int,
                )
            } else {
                DocValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        BigNumberPolicy::AlwaysBigNumber => big_number_from_token(&token),
        BigNumberPolicy::OnlyWhenLossy => {
            if integral {
                n.as_i64()
                    .map_or_else(|| big_number_from_token(&token), DocValue::Int)
            } else if f64_round_trips(&token) {
                DocValue::Double(n.as_f64().unwrap_or(f64::NAN))
            } else {
                big_number_from_token(&token)
            }
        }
    }
}

fn big_number_from_token(token: &str) -> DocValue {
    BigDecimal::from_str(token).map_or(DocValue::Null, DocValue::BigNumber)
}

/// True when parsing the token through f64 and back loses nothing.
fn f64_round_trips(token: &str) -> bool {
    let Ok(parsed) = token.parse::<f64>() else {
        return false;
    };
    if !parsed.is_finite() {
        return false;
    }
    let (Ok(original), Ok(round_tripped)) = (
        BigDecimal::from_str(token),
        BigDecimal::from_str(&format!("{parsed}")),
    ) else {
        return false;
    };
    // BigDecimal equality is scale-insensitive, so 0.50 == 0.5 holds.
    original == round_tripped
}
