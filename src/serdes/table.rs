//! Table-mode SerDes: schema-informed row transformation.
//!
//! Tables are typed; the server ships column definitions alongside results
//! (`projectionSchema` for read rows, `primaryKeySchema` for inserted-id
//! tuples). The schema both resolves the wire type of every node and drives
//! parameterized `map`/`list`/`set`/`vector` element parsing. Inserted-id
//! tuples arrive as bare sequences and are zipped against the primary-key
//! schema into keyed records before traversal.

use super::codec::{DesCodec, DesCtx, DesResult, DesSelector, SerCodec, SerResult, SerSelector};
use super::{BigNumberPolicy, PathSpec, SerDes, SerdesConfig};
use crate::constants;
use crate::error::Error;
use crate::value::{DataApiBlob, DataApiVector, DocKind, DocValue};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// One column definition as shipped by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDesc {
    #[serde(rename = "type")]
    pub col_type: String,
    /// Key type for `map` columns.
    #[serde(default, rename = "keyType")]
    pub key_type: Option<String>,
    /// Element type for `map`/`list`/`set`/`vector` columns.
    #[serde(default, rename = "valueType")]
    pub value_type: Option<String>,
    /// Dimension for `vector` columns.
    #[serde(default)]
    pub dimension: Option<usize>,
}

/// The column layout of a result set, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    pub columns: IndexMap<String, ColumnDesc>,
}

impl TableSchema {
    /// Parses a `primaryKeySchema`/`projectionSchema` status payload.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the payload is not an object of
    /// column definitions.
    pub fn from_wire(wire: &serde_json::Value) -> Result<Self, Error> {
        let map = wire.as_object().ok_or_else(|| {
            Error::serialization("table schema payload must be an object", &[])
        })?;
        let mut columns = IndexMap::with_capacity(map.len());
        for (name, desc) in map {
            let desc: ColumnDesc = serde_json::from_value(desc.clone()).map_err(|e| {
                Error::serialization(
                    format!("invalid column definition for '{name}': {e}"),
                    &[],
                )
            })?;
            columns.insert(name.clone(), desc);
        }
        Ok(Self { columns })
    }

    /// Zips a bare value sequence (one inserted-id tuple) against this
    /// schema, producing the keyed row the traversal expects.
    ///
    /// # Errors
    ///
    /// Returns a serialization error on arity mismatch.
    pub fn zip_row(&self, values: &[serde_json::Value]) -> Result<serde_json::Value, Error> {
        if values.len() != self.columns.len() {
            return Err(Error::serialization(
                format!(
                    "row arity mismatch: {} values for {} schema columns",
                    values.len(),
                    self.columns.len()
                ),
                &[],
            ));
        }
        let mut row = serde_json::Map::with_capacity(values.len());
        for (name, value) in self.columns.keys().zip(values.iter()) {
            row.insert(name.clone(), value.clone());
        }
        Ok(serde_json::Value::Object(row))
    }

    /// Resolves the wire type for a node at `path` inside a row.
    ///
    /// The first segment names the column; deeper segments resolve to the
    /// column's parameterized element type (`valueType`), or the `keyType`
    /// is irrelevant since map keys are object keys on the wire.
    #[must_use]
    pub fn type_at(&self, path: &[String]) -> Option<String> {
        let column = self.columns.get(path.first()?)?;
        if path.len() == 1 {
            return Some(column.col_type.clone());
        }
        // One level of nesting: map values, list/set/vector elements.
        column.value_type.clone()
    }
}

/// Builds a table-mode pipeline for one result schema.
#[must_use]
pub fn table_serdes(
    schema: &TableSchema,
    big_numbers: Vec<(PathSpec, BigNumberPolicy)>,
    default_policy: BigNumberPolicy,
) -> SerDes {
    let resolver_schema = schema.clone();
    SerDes::new(SerdesConfig {
        serialize: serialize_codecs(),
        deserialize: deserialize_codecs(),
        big_numbers,
        default_big_number_policy: default_policy,
        type_resolver: Some(Arc::new(move |path, _wire| resolver_schema.type_at(path))),
    })
}

/// Serialize-side: typed scalars take their table column forms (plain
/// strings for calendar/inet values, `$binary` packing for vectors/blobs).
fn serialize_codecs() -> Vec<SerCodec> {
    vec![
        kind_codec(DocKind::Timestamp, |value, path| match value {
            DocValue::Timestamp(ts) => {
                Ok(json!(ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)))
            }
            _ => Err(Error::serialization("expected timestamp", path)),
        }),
        kind_codec(DocKind::Date, |value, path| match value {
            DocValue::Date(d) => Ok(json!(d.to_string())),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
        kind_codec(DocKind::Time, |value, path| match value {
            DocValue::Time(t) => Ok(json!(t.to_string())),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
        kind_codec(DocKind::Duration, |value, path| match value {
            DocValue::Duration(d) => Ok(json!(d.to_string())),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
        kind_codec(DocKind::Uuid, |value, path| match value {
            DocValue::Uuid(u) => Ok(json!(u.to_string())),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
        kind_codec(DocKind::Inet, |value, path| match value {
            DocValue::Inet(ip) => Ok(json!(ip.to_string())),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
        kind_codec(DocKind::Vector, |value, path| match value {
            DocValue::Vector(v) => Ok(json!({constants::TAG_BINARY: v.to_base64()})),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
        kind_codec(DocKind::Blob, |value, path| match value {
            DocValue::Blob(b) => Ok(json!({constants::TAG_BINARY: b.as_base64()})),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
        kind_codec(DocKind::ObjectId, |value, path| match value {
            DocValue::ObjectId(o) => Ok(json!(o.to_hex())),
            _ => Err(Error::serialization("unexpected value kind", path)),
        }),
    ]
}

fn kind_codec(
    kind: DocKind,
    f: impl Fn(&DocValue, &[String]) -> Result<serde_json::Value, Error> + Send + Sync + 'static,
) -> SerCodec {
    SerCodec {
        selector: SerSelector::Kind(kind),
        transform: Arc::new(move |ctx, value| f(value, ctx.path).map(SerResult::Replace)),
    }
}

fn deserialize_codecs() -> Vec<DesCodec> {
    vec![
        scalar_codec("timestamp", |wire, _, path| {
            let s = expect_str(wire, "timestamp", path)?;
            let ts = DateTime::parse_from_rfc3339(s)
                .map_err(|e| Error::serialization(format!("invalid timestamp '{s}': {e}"), path))?;
            Ok(DocValue::Timestamp(ts.with_timezone(&Utc)))
        }),
        scalar_codec("date", |wire, _, path| {
            let s = expect_str(wire, "date", path)?;
            let d = NaiveDate::from_str(s)
                .map_err(|e| Error::serialization(format!("invalid date '{s}': {e}"), path))?;
            Ok(DocValue::Date(d))
        }),
        scalar_codec("time", |wire, _, path| {
            let s = expect_str(wire, "time", path)?;
            let t = NaiveTime::from_str(s)
                .map_err(|e| Error::serialization(format!("invalid time '{s}': {e}"), path))?;
            Ok(DocValue::Time(t))
        }),
        scalar_codec("duration", |wire, _, path| {
            let s = expect_str(wire, "duration", path)?;
            Ok(DocValue::Duration(s.parse()?))
        }),
        scalar_codec("uuid", parse_uuid),
        scalar_codec("timeuuid", parse_uuid),
        scalar_codec("inet", |wire, _, path| {
            let s = expect_str(wire, "inet", path)?;
            let ip = IpAddr::from_str(s)
                .map_err(|e| Error::serialization(format!("invalid inet '{s}': {e}"), path))?;
            Ok(DocValue::Inet(ip))
        }),
        scalar_codec("blob", |wire, _, path| {
            let b64 = wire
                .get(constants::TAG_BINARY)
                .and_then(serde_json::Value::as_str)
                .or_else(|| wire.as_str())
                .ok_or_else(|| Error::serialization("invalid blob payload", path))?;
            Ok(DocValue::Blob(DataApiBlob::from_base64(b64)?))
        }),
        scalar_codec("vector", |wire, _, path| match wire {
            serde_json::Value::String(b64) => {
                Ok(DocValue::Vector(DataApiVector::from_base64(b64)?))
            }
            serde_json::Value::Object(map) => {
                let b64 = map
                    .get(constants::TAG_BINARY)
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| Error::serialization("invalid vector payload", path))?;
                Ok(DocValue::Vector(DataApiVector::from_base64(b64)?))
            }
            serde_json::Value::Array(items) => {
                let mut components = Vec::with_capacity(items.len());
                for item in items {
                    let f = item.as_f64().ok_or_else(|| {
                        Error::serialization("non-numeric vector component", path)
                    })?;
                    #[allow(clippy::cast_possible_truncation)]
                    components.push(f as f32);
                }
                Ok(DocValue::Vector(DataApiVector::new(components)))
            }
            _ => Err(Error::serialization("invalid vector payload", path)),
        }),
        scalar_codec("varint", parse_big_number),
        scalar_codec("decimal", parse_big_number),
        scalar_codec("bigint", |wire, _, path| {
            wire.as_i64().map(DocValue::Int).map_or_else(
                || parse_big_number(wire, None, path),
                Ok,
            )
        }),
        scalar_codec("float", parse_floating),
        scalar_codec("double", parse_floating),
        // Map columns may arrive as an array of [key, value] pairs when keys
        // are not strings; normalize to an object before recursion.
        DesCodec {
            selector: DesSelector::Type("map".to_string()),
            transform: Arc::new(|ctx, wire| {
                let Some(pairs) = wire.as_array() else {
                    return Ok(DesResult::Nevermind);
                };
                let mut map = serde_json::Map::with_capacity(pairs.len());
                for pair in pairs {
                    let (Some(key), Some(value)) = (
                        pair.get(0).and_then(serde_json::Value::as_str),
                        pair.get(1),
                    ) else {
                        return Err(Error::serialization(
                            "malformed map entry pair",
                            ctx.path,
                        ));
                    };
                    map.insert(key.to_string(), value.clone());
                }
                Ok(DesResult::Recurse {
                    value: serde_json::Value::Object(map),
                    map_after: None,
                })
            }),
        },
    ]
}

fn parse_uuid(
    wire: &serde_json::Value,
    _ctx: Option<&DesCtx<'_>>,
    path: &[String],
) -> Result<DocValue, Error> {
    let s = expect_str(wire, "uuid", path)?;
    let uuid = Uuid::parse_str(s)
        .map_err(|e| Error::serialization(format!("invalid uuid '{s}': {e}"), path))?;
    Ok(DocValue::Uuid(uuid))
}

fn parse_big_number(
    wire: &serde_json::Value,
    _ctx: Option<&DesCtx<'_>>,
    path: &[String],
) -> Result<DocValue, Error> {
    let token = match wire {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => {
            return Err(Error::serialization(
                "expected numeric token for varint/decimal column",
                path,
            ))
        }
    };
    let n = BigDecimal::from_str(&token)
        .map_err(|e| Error::serialization(format!("invalid numeric token '{token}': {e}"), path))?;
    Ok(DocValue::BigNumber(n))
}

fn parse_floating(
    wire: &serde_json::Value,
    _ctx: Option<&DesCtx<'_>>,
    path: &[String],
) -> Result<DocValue, Error> {
    match wire {
        serde_json::Value::Number(n) => Ok(DocValue::Double(n.as_f64().unwrap_or(f64::NAN))),
        // Tables encode non-finite floats as strings.
        serde_json::Value::String(s) => match s.as_str() {
            "NaN" => Ok(DocValue::Double(f64::NAN)),
            "Infinity" => Ok(DocValue::Double(f64::INFINITY)),
            "-Infinity" => Ok(DocValue::Double(f64::NEG_INFINITY)),
            other => Err(Error::serialization(
                format!("invalid float token '{other}'"),
                path,
            )),
        },
        _ => Err(Error::serialization("invalid float payload", path)),
    }
}

fn expect_str<'a>(
    wire: &'a serde_json::Value,
    what: &str,
    path: &[String],
) -> Result<&'a str, Error> {
    wire.as_str()
        .ok_or_else(|| Error::serialization(format!("expected string for {what} column"), path))
}

fn scalar_codec(
    col_type: &'static str,
    f: impl Fn(&serde_json::Value, Option<&DesCtx<'_>>, &[String]) -> Result<DocValue, Error>
        + Send
        + Sync
        + 'static,
) -> DesCodec {
    DesCodec {
        selector: DesSelector::Type(col_type.to_string()),
        transform: Arc::new(move |ctx, wire| f(wire, Some(ctx), ctx.path).map(DesResult::Replace)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(columns: &[(&str, &str)]) -> TableSchema {
        TableSchema {
            columns: columns
                .iter()
                .map(|(name, ty)| {
                    (
                        (*name).to_string(),
                        ColumnDesc {
                            col_type: (*ty).to_string(),
                            key_type: None,
                            value_type: None,
                            dimension: None,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_schema_from_wire() {
        let parsed = TableSchema::from_wire(&json!({
            "id": {"type": "uuid"},
            "scores": {"type": "list", "valueType": "int"},
        }))
        .unwrap();
        assert_eq!(parsed.columns["id"].col_type, "uuid");
        assert_eq!(parsed.columns["scores"].value_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_zip_row_arity() {
        let s = schema(&[("id", "int"), ("name", "text")]);
        let zipped = s.zip_row(&[json!(1), json!("a")]).unwrap();
        assert_eq!(zipped, json!({"id": 1, "name": "a"}));
        assert!(s.zip_row(&[json!(1)]).is_err());
    }

    #[test]
    fn test_scalar_columns_rehydrate() {
        let s = schema(&[
            ("id", "uuid"),
            ("when", "timestamp"),
            ("day", "date"),
            ("addr", "inet"),
            ("amount", "decimal"),
        ]);
        let serdes = table_serdes(&s, Vec::new(), BigNumberPolicy::default());
        let id = Uuid::new_v4();
        let row = serdes
            .deserialize(&json!({
                "id": id.to_string(),
                "when": "2000-01-01T00:00:00.000Z",
                "day": "2000-01-01",
                "addr": "127.0.0.1",
                "amount": "123.456",
            }))
            .unwrap();
        assert_eq!(row.get("id"), Some(&DocValue::Uuid(id)));
        assert_eq!(
            row.get("when"),
            Some(&DocValue::Timestamp(
                DateTime::from_timestamp_millis(946_684_800_000).unwrap()
            ))
        );
        assert_eq!(
            row.get("day"),
            Some(&DocValue::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()))
        );
        assert_eq!(
            row.get("amount"),
            Some(&DocValue::BigNumber(BigDecimal::from_str("123.456").unwrap()))
        );
    }

    #[test]
    fn test_parameterized_list_elements() {
        let mut s = schema(&[]);
        s.columns.insert(
            "ids".to_string(),
            ColumnDesc {
                col_type: "list".to_string(),
                key_type: None,
                value_type: Some("uuid".to_string()),
                dimension: None,
            },
        );
        let serdes = table_serdes(&s, Vec::new(), BigNumberPolicy::default());
        let id = Uuid::new_v4();
        let row = serdes
            .deserialize(&json!({"ids": [id.to_string()]}))
            .unwrap();
        assert_eq!(
            row.get("ids").and_then(DocValue::as_array).unwrap()[0],
            DocValue::Uuid(id)
        );
    }

    #[test]
    fn test_map_pair_form_normalizes() {
        let mut s = schema(&[]);
        s.columns.insert(
            "tags".to_string(),
            ColumnDesc {
                col_type: "map".to_string(),
                key_type: Some("text".to_string()),
                value_type: Some("int".to_string()),
                dimension: None,
            },
        );
        let serdes = table_serdes(&s, Vec::new(), BigNumberPolicy::default());
        let row = serdes
            .deserialize(&json!({"tags": [["a", 1], ["b", 2]]}))
            .unwrap();
        let tags = row.get("tags").and_then(DocValue::as_object).unwrap();
        assert_eq!(tags.get("a"), Some(&DocValue::Int(1)));
        assert_eq!(tags.get("b"), Some(&DocValue::Int(2)));
    }

    #[test]
    fn test_row_round_trip() {
        let s = schema(&[("id", "uuid"), ("day", "date")]);
        let serdes = table_serdes(&s, Vec::new(), BigNumberPolicy::default());
        let id = Uuid::new_v4();
        let row = DocValue::Object(
            [
                ("id".to_string(), DocValue::Uuid(id)),
                (
                    "day".to_string(),
                    DocValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
                ),
            ]
            .into_iter()
            .collect(),
        );
        let out = serdes.serialize(&row).unwrap();
        assert_eq!(out.wire, json!({"id": id.to_string(), "day": "2024-02-29"}));
        assert_eq!(serdes.deserialize(&out.wire).unwrap(), row);
    }

    #[test]
    fn test_non_finite_float_tokens() {
        let s = schema(&[("x", "double")]);
        let serdes = table_serdes(&s, Vec::new(), BigNumberPolicy::default());
        let row = serdes.deserialize(&json!({"x": "NaN"})).unwrap();
        match row.get("x") {
            Some(DocValue::Double(d)) => assert!(d.is_nan()),
            other => panic!("expected Double, got {other:?}"),
        }
    }
}
