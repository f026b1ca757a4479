//! Collection-mode SerDes: document-style, MongoDB-shaped wire tags.
//!
//! Typed scalars serialize to single-key tagged objects (`{"$date": millis}`,
//! `{"$uuid": "..."}`, ...). Deserialization recognizes the tags wherever
//! they appear; the `$vector` field name additionally steers `$binary`
//! payloads into [`DataApiVector`] instead of [`DataApiBlob`].

use super::codec::{
    DesCodec, DesResult, DesSelector, SerCodec, SerResult, SerSelector,
};
use super::{BigNumberPolicy, PathSpec, SerDes, SerdesConfig};
use crate::constants;
use crate::error::Error;
use crate::value::{DataApiBlob, DataApiVector, DocKind, DocValue, ObjectId};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Builds the default collection-mode pipeline.
#[must_use]
pub fn collection_serdes(
    big_numbers: Vec<(PathSpec, BigNumberPolicy)>,
    default_policy: BigNumberPolicy,
) -> SerDes {
    SerDes::new(SerdesConfig {
        serialize: serialize_codecs(),
        deserialize: deserialize_codecs(),
        big_numbers,
        default_big_number_policy: default_policy,
        type_resolver: Some(Arc::new(|_path, wire| resolve_dollar_tag(wire))),
    })
}

/// A single-entry object whose key starts with `$` is a tagged wire value.
fn resolve_dollar_tag(wire: &serde_json::Value) -> Option<String> {
    let map = wire.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let key = map.keys().next()?;
    key.starts_with('$').then(|| key.clone())
}

fn serialize_codecs() -> Vec<SerCodec> {
    vec![
        kind_codec(DocKind::Timestamp, |value, path| match value {
            DocValue::Timestamp(ts) => Ok(json!({constants::TAG_DATE: ts.timestamp_millis()})),
            _ => Err(Error::serialization("expected timestamp", path)),
        }),
        kind_codec(DocKind::Date, |value, path| match value {
            DocValue::Date(d) => {
                let midnight = d
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| Error::serialization("invalid calendar date", path))?;
                Ok(json!({constants::TAG_DATE: midnight.and_utc().timestamp_millis()}))
            }
            _ => Err(Error::serialization("expected date", path)),
        }),
        kind_codec(DocKind::Uuid, |value, path| match value {
            DocValue::Uuid(u) => Ok(json!({constants::TAG_UUID: u.to_string()})),
            _ => Err(Error::serialization("expected uuid", path)),
        }),
        kind_codec(DocKind::ObjectId, |value, path| match value {
            DocValue::ObjectId(o) => Ok(json!({constants::TAG_OBJECT_ID: o.to_hex()})),
            _ => Err(Error::serialization("expected objectId", path)),
        }),
        kind_codec(DocKind::Vector, |value, path| match value {
            DocValue::Vector(v) => Ok(json!({constants::TAG_BINARY: v.to_base64()})),
            _ => Err(Error::serialization("expected vector", path)),
        }),
        kind_codec(DocKind::Blob, |value, path| match value {
            DocValue::Blob(b) => Ok(json!({constants::TAG_BINARY: b.as_base64()})),
            _ => Err(Error::serialization("expected blob", path)),
        }),
        // Collections have no native time/duration/inet columns; their
        // canonical string forms are stored instead.
        kind_codec(DocKind::Time, |value, path| match value {
            DocValue::Time(t) => Ok(json!(t.to_string())),
            _ => Err(Error::serialization("expected time", path)),
        }),
        kind_codec(DocKind::Duration, |value, path| match value {
            DocValue::Duration(d) => Ok(json!(d.to_string())),
            _ => Err(Error::serialization("expected duration", path)),
        }),
        kind_codec(DocKind::Inet, |value, path| match value {
            DocValue::Inet(ip) => Ok(json!(ip.to_string())),
            _ => Err(Error::serialization("expected inet address", path)),
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
        type_codec(constants::TAG_DATE, |wire, path| {
            let millis = wire
                .get(constants::TAG_DATE)
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| Error::serialization("invalid $date payload", path))?;
            let ts: DateTime<Utc> = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| Error::serialization("$date out of range", path))?;
            Ok(DocValue::Timestamp(ts))
        }),
        type_codec(constants::TAG_UUID, |wire, path| {
            let s = wire
                .get(constants::TAG_UUID)
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::serialization("invalid $uuid payload", path))?;
            let uuid = Uuid::parse_str(s)
                .map_err(|e| Error::serialization(format!("invalid $uuid '{s}': {e}"), path))?;
            Ok(DocValue::Uuid(uuid))
        }),
        type_codec(constants::TAG_OBJECT_ID, |wire, path| {
            let s = wire
                .get(constants::TAG_OBJECT_ID)
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::serialization("invalid $objectId payload", path))?;
            let oid = ObjectId::from_str(s).map_err(|_| {
                Error::serialization(format!("invalid $objectId '{s}'"), path)
            })?;
            Ok(DocValue::ObjectId(oid))
        }),
        type_codec_with_name(constants::TAG_BINARY, |wire, field_name, path| {
            let b64 = wire
                .get(constants::TAG_BINARY)
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::serialization("invalid $binary payload", path))?;
            if field_name == Some(constants::TAG_VECTOR) {
                Ok(DocValue::Vector(DataApiVector::from_base64(b64)?))
            } else {
                Ok(DocValue::Blob(DataApiBlob::from_base64(b64)?))
            }
        }),
        // A plain numeric array under "$vector" is the unpacked vector form.
        DesCodec {
            selector: DesSelector::Name(constants::TAG_VECTOR.to_string()),
            transform: Arc::new(|_ctx, wire| {
                let Some(items) = wire.as_array() else {
                    return Ok(DesResult::Nevermind);
                };
                let mut components = Vec::with_capacity(items.len());
                for item in items {
                    let Some(f) = item.as_f64() else {
                        return Ok(DesResult::Nevermind);
                    };
                    #[allow(clippy::cast_possible_truncation)]
                    components.push(f as f32);
                }
                Ok(DesResult::Replace(DocValue::Vector(DataApiVector::new(
                    components,
                ))))
            }),
        },
    ]
}

fn type_codec(
    tag: &'static str,
    f: impl Fn(&serde_json::Value, &[String]) -> Result<DocValue, Error> + Send + Sync + 'static,
) -> DesCodec {
    DesCodec {
        selector: DesSelector::Type(tag.to_string()),
        transform: Arc::new(move |ctx, wire| f(wire, ctx.path).map(DesResult::Replace)),
    }
}

fn type_codec_with_name(
    tag: &'static str,
    f: impl Fn(&serde_json::Value, Option<&str>, &[String]) -> Result<DocValue, Error>
        + Send
        + Sync
        + 'static,
) -> DesCodec {
    DesCodec {
        selector: DesSelector::Type(tag.to_string()),
        transform: Arc::new(move |ctx, wire| {
            f(wire, ctx.field_name(), ctx.path).map(DesResult::Replace)
        }),
    }
}
