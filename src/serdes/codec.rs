//! Codec declarations and the per-instance codec registry.
//!
//! A codec is a (serialize, deserialize) transformer pair selectable by field
//! name, exact field path, wire type tag, or runtime kind. Raw declarations
//! are partitioned into the two directions when a [`SerDes`] instance is
//! built; after that the registry is immutable and lock-free.
//!
//! [`SerDes`]: super::SerDes

use crate::error::Error;
use crate::value::{DocKind, DocValue};
use std::collections::HashMap;
use std::sync::Arc;

/// One segment of a registered codec path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Matches exactly this field name (array indices match their decimal
    /// string form).
    Field(String),
    /// `*`: matches any single segment, including stringified array indices.
    Wildcard,
}

impl PathSegment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Field(name) => name == segment,
            Self::Wildcard => true,
        }
    }
}

/// A registered path. The empty path matches the root document.
pub type PathSpec = Vec<PathSegment>;

/// Builds a [`PathSpec`] from `&["a", "*", "b"]`-style literals.
#[must_use]
pub fn path_spec(segments: &[&str]) -> PathSpec {
    segments
        .iter()
        .map(|s| {
            if *s == "*" {
                PathSegment::Wildcard
            } else {
                PathSegment::Field((*s).to_string())
            }
        })
        .collect()
}

/// Exact-length match of a concrete path against a spec.
#[must_use]
pub fn path_matches(spec: &[PathSegment], path: &[String]) -> bool {
    spec.len() == path.len()
        && spec
            .iter()
            .zip(path.iter())
            .all(|(seg, concrete)| seg.matches(concrete))
}

/// Outcome of one serialize-direction codec.
pub enum SerResult {
    /// Final wire value for this node; no further codecs, no recursion.
    Replace(serde_json::Value),
    /// Swap the in-memory node and keep going: later codecs observe the
    /// replacement, and default container recursion still runs.
    Recurse {
        value: DocValue,
        /// Post-processing hook applied to the fully serialized subtree.
        /// Hooks fire deepest-first in registration order.
        map_after: Option<SerAfterFn>,
    },
    /// This codec declines; delegate to the next one in order.
    Nevermind,
}

/// Outcome of one deserialize-direction codec.
pub enum DesResult {
    /// Final in-memory value for this node.
    Replace(DocValue),
    /// Swap the wire node and keep going.
    Recurse {
        value: serde_json::Value,
        /// Post-processing hook applied to the fully deserialized subtree.
        map_after: Option<DesAfterFn>,
    },
    /// Delegate to the next codec in order.
    Nevermind,
}

pub type SerializeFn =
    Arc<dyn Fn(&SerCtx<'_>, &DocValue) -> Result<SerResult, Error> + Send + Sync>;
pub type DeserializeFn =
    Arc<dyn Fn(&DesCtx<'_>, &serde_json::Value) -> Result<DesResult, Error> + Send + Sync>;
pub type SerAfterFn =
    Arc<dyn Fn(serde_json::Value) -> Result<serde_json::Value, Error> + Send + Sync>;
pub type DesAfterFn = Arc<dyn Fn(DocValue) -> Result<DocValue, Error> + Send + Sync>;
pub type GuardFn = Arc<dyn Fn(&DocValue) -> bool + Send + Sync>;

/// Traversal context handed to serialize codecs.
pub struct SerCtx<'a> {
    /// Concrete path from the root to the current node.
    pub path: &'a [String],
}

impl SerCtx<'_> {
    /// The field name of the current node (last path segment).
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

/// Traversal context handed to deserialize codecs.
pub struct DesCtx<'a> {
    pub path: &'a [String],
    /// The wire type tag resolved for this node, when any (`$date`-style
    /// single-key tags in collection mode, column types in table mode).
    pub type_tag: Option<&'a str>,
}

impl DesCtx<'_> {
    /// The field name of the current node (last path segment).
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

/// How a serialize codec is selected.
pub enum SerSelector {
    /// Field name (last path segment).
    Name(String),
    /// Exact field path; `*` matches one segment, `[]` matches the root.
    Path(PathSpec),
    /// Runtime kind of the value.
    Kind(DocKind),
    /// Arbitrary predicate; first matching guard wins.
    Guard(GuardFn),
}

/// How a deserialize codec is selected.
pub enum DesSelector {
    Name(String),
    Path(PathSpec),
    /// Wire type tag (collection mode) or column type (table mode).
    Type(String),
}

/// A raw serialize-direction declaration.
pub struct SerCodec {
    pub selector: SerSelector,
    pub transform: SerializeFn,
}

/// A raw deserialize-direction declaration.
pub struct DesCodec {
    pub selector: DesSelector,
    pub transform: DeserializeFn,
}

/// Immutable serialize-direction registry.
#[derive(Default)]
pub(crate) struct SerRegistry {
    for_name: HashMap<String, Vec<SerializeFn>>,
    /// Indexed by path length for O(1) candidate lookup.
    for_path: Vec<Vec<(PathSpec, SerializeFn)>>,
    for_kind: HashMap<DocKind, Vec<SerializeFn>>,
    for_guard: Vec<(GuardFn, SerializeFn)>,
}

impl SerRegistry {
    pub(crate) fn build(declarations: Vec<SerCodec>) -> Self {
        let mut registry = Self::default();
        for decl in declarations {
            match decl.selector {
                SerSelector::Name(name) => registry
                    .for_name
                    .entry(name)
                    .or_default()
                    .push(decl.transform),
                SerSelector::Path(spec) => {
                    let len = spec.len();
                    if registry.for_path.len() <= len {
                        registry.for_path.resize_with(len + 1, Vec::new);
                    }
                    registry.for_path[len].push((spec, decl.transform));
                }
                SerSelector::Kind(kind) => registry
                    .for_kind
                    .entry(kind)
                    .or_default()
                    .push(decl.transform),
                SerSelector::Guard(guard) => registry.for_guard.push((guard, decl.transform)),
            }
        }
        registry
    }

    /// All codecs applicable at `path` for `value`, in resolution order:
    /// exact path, then field name, then kind dispatch, then guards.
    pub(crate) fn candidates(&self, path: &[String], value: &DocValue) -> Vec<SerializeFn> {
        let mut out = Vec::new();
        if let Some(by_len) = self.for_path.get(path.len()) {
            for (spec, f) in by_len {
                if path_matches(spec, path) {
                    out.push(Arc::clone(f));
                }
            }
        }
        if let Some(name) = path.last() {
            if let Some(list) = self.for_name.get(name) {
                out.extend(list.iter().map(Arc::clone));
            }
        }
        if let Some(list) = self.for_kind.get(&value.kind()) {
            out.extend(list.iter().map(Arc::clone));
        }
        for (guard, f) in &self.for_guard {
            if guard(value) {
                out.push(Arc::clone(f));
                break;
            }
        }
        out
    }
}

/// Immutable deserialize-direction registry.
#[derive(Default)]
pub(crate) struct DesRegistry {
    for_name: HashMap<String, Vec<DeserializeFn>>,
    for_path: Vec<Vec<(PathSpec, DeserializeFn)>>,
    for_type: HashMap<String, Vec<DeserializeFn>>,
}

impl DesRegistry {
    pub(crate) fn build(declarations: Vec<DesCodec>) -> Self {
        let mut registry = Self::default();
        for decl in declarations {
            match decl.selector {
                DesSelector::Name(name) => registry
                    .for_name
                    .entry(name)
                    .or_default()
                    .push(decl.transform),
                DesSelector::Path(spec) => {
                    let len = spec.len();
                    if registry.for_path.len() <= len {
                        registry.for_path.resize_with(len + 1, Vec::new);
                    }
                    registry.for_path[len].push((spec, decl.transform));
                }
                DesSelector::Type(tag) => registry
                    .for_type
                    .entry(tag)
                    .or_default()
                    .push(decl.transform),
            }
        }
        registry
    }

    /// All codecs applicable at `path`, in resolution order: exact path,
    /// then field name, then wire type tag.
    pub(crate) fn candidates(&self, path: &[String], type_tag: Option<&str>) -> Vec<DeserializeFn> {
        let mut out = Vec::new();
        if let Some(by_len) = self.for_path.get(path.len()) {
            for (spec, f) in by_len {
                if path_matches(spec, path) {
                    out.push(Arc::clone(f));
                }
            }
        }
        if let Some(name) = path.last() {
            if let Some(list) = self.for_name.get(name) {
                out.extend(list.iter().map(Arc::clone));
            }
        }
        if let Some(tag) = type_tag {
            if let Some(list) = self.for_type.get(tag) {
                out.extend(list.iter().map(Arc::clone));
            }
        }
        out
    }
}
