//! In-memory document values and the scalar types the Data API understands.
//!
//! [`DocValue`] is the tree the SerDes pipeline transforms to and from wire
//! JSON. It extends the plain JSON model with the typed scalars a collection
//! or table can hold: vectors, blobs, UUIDs, object ids, calendar values,
//! Cassandra durations, inet addresses, and arbitrary-precision numbers.

pub mod blob;
pub mod duration;
pub mod object_id;
pub mod vector;

pub use blob::DataApiBlob;
pub use duration::DataApiDuration;
pub use object_id::ObjectId;
pub use vector::DataApiVector;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use indexmap::IndexMap;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

/// A single in-memory value inside a document or row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DocValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    /// Arbitrary-precision decimal, preserved end-to-end when the big-number
    /// policy asks for it.
    BigNumber(BigDecimal),
    String(String),
    Array(Vec<DocValue>),
    Object(IndexMap<String, DocValue>),
    Vector(DataApiVector),
    Blob(DataApiBlob),
    Uuid(Uuid),
    ObjectId(ObjectId),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    Duration(DataApiDuration),
    Inet(IpAddr),
}

/// Runtime kind of a [`DocValue`], used for serialize-side codec dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
    Null,
    Bool,
    Int,
    Double,
    BigNumber,
    String,
    Array,
    Object,
    Vector,
    Blob,
    Uuid,
    ObjectId,
    Date,
    Time,
    Timestamp,
    Duration,
    Inet,
}

impl DocValue {
    /// The runtime kind of this value.
    #[must_use]
    pub const fn kind(&self) -> DocKind {
        match self {
            Self::Null => DocKind::Null,
            Self::Bool(_) => DocKind::Bool,
            Self::Int(_) => DocKind::Int,
            Self::Double(_) => DocKind::Double,
            Self::BigNumber(_) => DocKind::BigNumber,
            Self::String(_) => DocKind::String,
            Self::Array(_) => DocKind::Array,
            Self::Object(_) => DocKind::Object,
            Self::Vector(_) => DocKind::Vector,
            Self::Blob(_) => DocKind::Blob,
            Self::Uuid(_) => DocKind::Uuid,
            Self::ObjectId(_) => DocKind::ObjectId,
            Self::Date(_) => DocKind::Date,
            Self::Time(_) => DocKind::Time,
            Self::Timestamp(_) => DocKind::Timestamp,
            Self::Duration(_) => DocKind::Duration,
            Self::Inet(_) => DocKind::Inet,
        }
    }

    /// True for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow as an object map, if this is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&IndexMap<String, Self>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as an array, if this is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Field lookup on objects; `None` elsewhere.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// An empty object value.
    #[must_use]
    pub fn empty_object() -> Self {
        Self::Object(IndexMap::new())
    }

    /// Converts plain JSON into a value tree without running any codecs.
    ///
    /// Numbers become `Int` when they fit `i64`, `BigNumber` when they are
    /// integral but too wide, and `Double` otherwise. Tagged wire forms
    /// (`$uuid`, `$date`, ...) are *not* interpreted here; that is the SerDes
    /// pipeline's job.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::from_number(&n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts a JSON number token, preserving wide integers as
    /// `BigNumber` rather than rounding through `f64`.
    #[must_use]
    pub fn from_number(n: &serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            return Self::Int(i);
        }
        if let Some(f) = n.as_f64() {
            // A fractional token that fits f64 exactly enough; wide integral
            // tokens fall through to BigNumber below.
            if n.to_string().contains(['.', 'e', 'E']) {
                return Self::Double(f);
            }
        }
        BigDecimal::from_str(&n.to_string())
            .map_or(Self::Null, Self::BigNumber)
    }

    /// Converts back to plain JSON without running any codecs. Typed scalars
    /// take their canonical wire-adjacent form (hex/string renderings); used
    /// for diagnostics, not for command bodies.
    #[must_use]
    pub fn to_json_lossy(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Double(d) => serde_json::Number::from_f64(*d)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::BigNumber(n) => serde_json::Value::String(n.to_string()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json_lossy).collect())
            }
            Self::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_lossy()))
                    .collect(),
            ),
            Self::Vector(v) => {
                serde_json::Value::Array(items_from_f32(v.as_slice()))
            }
            Self::Blob(b) => serde_json::Value::String(b.as_base64()),
            Self::Uuid(u) => serde_json::Value::String(u.to_string()),
            Self::ObjectId(o) => serde_json::Value::String(o.to_hex()),
            Self::Date(d) => serde_json::Value::String(d.to_string()),
            Self::Time(t) => serde_json::Value::String(t.to_string()),
            Self::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Self::Duration(d) => serde_json::Value::String(d.to_string()),
            Self::Inet(ip) => serde_json::Value::String(ip.to_string()),
        }
    }
}

fn items_from_f32(components: &[f32]) -> Vec<serde_json::Value> {
    components
        .iter()
        .map(|c| {
            serde_json::Number::from_f64(f64::from(*c))
                .map_or(serde_json::Value::Null, serde_json::Value::Number)
        })
        .collect()
}

impl From<bool> for DocValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DocValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for DocValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for DocValue {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<&str> for DocValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for DocValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Uuid> for DocValue {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<ObjectId> for DocValue {
    fn from(o: ObjectId) -> Self {
        Self::ObjectId(o)
    }
}

impl From<DataApiVector> for DocValue {
    fn from(v: DataApiVector) -> Self {
        Self::Vector(v)
    }
}

impl From<DataApiBlob> for DocValue {
    fn from(b: DataApiBlob) -> Self {
        Self::Blob(b)
    }
}

impl From<BigDecimal> for DocValue {
    fn from(n: BigDecimal) -> Self {
        Self::BigNumber(n)
    }
}

impl From<NaiveDate> for DocValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<Utc>> for DocValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<serde_json::Value> for DocValue {
    fn from(v: serde_json::Value) -> Self {
        Self::from_json(v)
    }
}

impl<V: Into<DocValue>> FromIterator<(String, V)> for DocValue {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_number_classification() {
        assert_eq!(DocValue::from_json(json!(7)), DocValue::Int(7));
        assert_eq!(DocValue::from_json(json!(1.5)), DocValue::Double(1.5));
        let wide: serde_json::Value = serde_json::from_str("92233720368547758070").unwrap();
        assert_eq!(DocValue::from_json(wide).kind(), DocKind::BigNumber);
    }

    #[test]
    fn test_from_json_containers() {
        let value = DocValue::from_json(json!({"a": [1, "x", null]}));
        let arr = value.get("a").and_then(DocValue::as_array).unwrap();
        assert_eq!(arr.len(), 3);
        assert!(arr[2].is_null());
    }

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(DocValue::Uuid(Uuid::nil()).kind(), DocKind::Uuid);
        assert_eq!(DocValue::Null.kind(), DocKind::Null);
        assert_eq!(
            DocValue::Vector(DataApiVector::new(vec![1.0])).kind(),
            DocKind::Vector
        );
    }

    #[test]
    fn test_object_get() {
        let doc: DocValue = vec![("name".to_string(), DocValue::from("astra"))]
            .into_iter()
            .collect();
        assert_eq!(doc.get("name").and_then(DocValue::as_str), Some("astra"));
        assert!(doc.get("missing").is_none());
    }
}
