//! Document data model: trees, key paths, source locations and pending writes.

use crate::error::{DocumentError, DocumentResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// An ordered mapping of key segments to scalars or nested mappings.
///
/// Insertion order is preserved, so a parsed document dumps back in its
/// original key order unless sorting is requested.
pub type Tree = Map<String, Value>;

pub(crate) const SCALAR_PARENT: &str = "an intermediate segment holds a scalar";
pub(crate) const CONTAINER_TARGET: &str = "the target holds an object or array";
pub(crate) const ARRAY_INDEX: &str = "array index is out of range";

/// How a dotted key string maps to segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStyle {
    /// `a.b.c` addresses `{"a": {"b": {"c": ..}}}`.
    #[default]
    Nested,
    /// `a.b.c` is a single top-level key.
    Flat,
}

/// A sequence of segments addressing a leaf or subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Split a dotted key according to `style`.
    pub fn parse(raw: &str, style: KeyStyle) -> DocumentResult<Self> {
        match style {
            KeyStyle::Flat => Self::from_segments(vec![raw.to_string()]),
            KeyStyle::Nested => Self::from_segments(raw.split('.').map(str::to_string).collect()),
        }
    }

    /// Build a key path from explicit segments. Segments may contain dots.
    pub fn from_segments(segments: Vec<String>) -> DocumentResult<Self> {
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(DocumentError::InvalidKeyPath(segments.join(".")));
        }
        Ok(Self { segments })
    }

    /// Parse an RFC 6901 pointer such as `/a~1b/c` (`~1` is `/`, `~0` is `~`).
    pub fn from_pointer(pointer: &str) -> DocumentResult<Self> {
        let Some(body) = pointer.strip_prefix('/') else {
            return Err(DocumentError::InvalidKeyPath(pointer.to_string()));
        };
        let segments = body
            .split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect();
        Self::from_segments(segments)
    }

    /// Render as an RFC 6901 pointer.
    pub fn to_pointer(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("/{}", s.replace('~', "~0").replace('/', "~1")))
            .collect()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Span of a leaf value in the original text.
///
/// `start..end` are byte offsets with `end` exclusive. For strings the span
/// covers the content between the quotes and `quoted` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLocation {
    pub key: String,
    pub start: usize,
    pub end: usize,
    pub quoted: bool,
}

/// A leaf value that can be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// Interpret command-line style input: JSON literals and numbers keep their
    /// type, quoted input is a JSON string, anything else is a plain string.
    pub fn infer(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(value).unwrap_or_else(|| Scalar::String(raw.to_string())),
            Err(_) => Scalar::String(raw.to_string()),
        }
    }

    /// Convert a JSON value, rejecting objects and arrays.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(b)),
            Value::Number(n) => Some(Scalar::Number(n)),
            Value::String(s) => Some(Scalar::String(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) => Value::Number(n.clone()),
            Scalar::String(s) => Value::String(s.clone()),
        }
    }

    /// Compact JSON text for this value.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

/// Non-finite floats have no JSON form and become `null`.
impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Scalar::Null, Scalar::Number)
    }
}

/// An uncommitted write of `value` at `keypath`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub keypath: KeyPath,
    pub value: Scalar,
}

impl PendingWrite {
    pub fn new(keypath: KeyPath, value: impl Into<Scalar>) -> Self {
        Self {
            keypath,
            value: value.into(),
        }
    }
}

/// Look up the value at `keypath`.
pub fn get_path<'a>(tree: &'a Tree, keypath: &KeyPath) -> Option<&'a Value> {
    let (head, rest) = keypath.segments().split_first()?;
    let mut node = tree.get(head)?;
    for segment in rest {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Apply `writes` to a copy of `tree`; the original is untouched on error.
pub fn merge_writes(tree: &Tree, writes: &[PendingWrite]) -> DocumentResult<Tree> {
    let mut merged = tree.clone();
    for write in writes {
        set_path(&mut merged, &write.keypath, write.value.to_value())?;
    }
    Ok(merged)
}

/// Set the value at `keypath`, creating missing intermediate objects.
///
/// A scalar intermediate, an out-of-range array index, or an existing object
/// or array at the target is a [`DocumentError::PathConflict`]. The tree may
/// be partially modified when an error is returned; use [`merge_writes`] for
/// all-or-nothing batches.
pub fn set_path(tree: &mut Tree, keypath: &KeyPath, value: Value) -> DocumentResult<()> {
    set_in_map(tree, keypath.segments(), value, keypath)
}

fn set_in_map(
    map: &mut Tree,
    segments: &[String],
    value: Value,
    keypath: &KeyPath,
) -> DocumentResult<()> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(DocumentError::InvalidKeyPath(keypath.to_string()));
    };
    if rest.is_empty() {
        if map.get(head).is_some_and(is_container) {
            return Err(DocumentError::path_conflict(keypath.to_string(), CONTAINER_TARGET));
        }
        map.insert(head.clone(), value);
        return Ok(());
    }
    let child = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    set_in_value(child, rest, value, keypath)
}

fn set_in_value(
    node: &mut Value,
    segments: &[String],
    value: Value,
    keypath: &KeyPath,
) -> DocumentResult<()> {
    match node {
        Value::Object(map) => set_in_map(map, segments, value, keypath),
        Value::Array(items) => {
            let Some((head, rest)) = segments.split_first() else {
                return Err(DocumentError::InvalidKeyPath(keypath.to_string()));
            };
            let item = head
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get_mut(index))
                .ok_or_else(|| DocumentError::path_conflict(keypath.to_string(), ARRAY_INDEX))?;
            if rest.is_empty() {
                if is_container(item) {
                    return Err(DocumentError::path_conflict(
                        keypath.to_string(),
                        CONTAINER_TARGET,
                    ));
                }
                *item = value;
                Ok(())
            } else {
                set_in_value(item, rest, value, keypath)
            }
        }
        _ => Err(DocumentError::path_conflict(keypath.to_string(), SCALAR_PARENT)),
    }
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> Tree {
        match value {
            Value::Object(map) => map,
            _ => panic!("test tree must be an object"),
        }
    }

    #[test]
    fn test_keypath_styles() {
        let nested = KeyPath::parse("a.b.c", KeyStyle::Nested).unwrap();
        assert_eq!(nested.segments(), &["a", "b", "c"]);

        let flat = KeyPath::parse("a.b.c", KeyStyle::Flat).unwrap();
        assert_eq!(flat.segments(), &["a.b.c"]);
        assert_eq!(flat.to_string(), "a.b.c");
    }

    #[test]
    fn test_keypath_rejects_empty_segments() {
        assert!(KeyPath::parse("", KeyStyle::Nested).is_err());
        assert!(KeyPath::parse("a..b", KeyStyle::Nested).is_err());
        assert!(KeyPath::parse("", KeyStyle::Flat).is_err());
    }

    #[test]
    fn test_pointer_escapes_are_literal_characters() {
        let path = KeyPath::from_pointer("/a~1b/c~0d").unwrap();
        assert_eq!(path.segments(), &["a/b", "c~d"]);
        assert_eq!(path.to_pointer(), "/a~1b/c~0d");
        assert!(KeyPath::from_pointer("a/b").is_err());
    }

    #[test]
    fn test_scalar_infer() {
        assert_eq!(Scalar::infer("42"), Scalar::from(42));
        assert_eq!(Scalar::infer("true"), Scalar::Bool(true));
        assert_eq!(Scalar::infer("null"), Scalar::Null);
        assert_eq!(Scalar::infer("\"7\""), Scalar::from("7"));
        assert_eq!(Scalar::infer("hello world"), Scalar::from("hello world"));
        assert_eq!(Scalar::infer("[1]"), Scalar::from("[1]"));
    }

    #[test]
    fn test_get_path_walks_objects_and_arrays() {
        let t = tree(json!({"a": {"b": [10, {"c": "x"}]}}));
        let path = KeyPath::parse("a.b.1.c", KeyStyle::Nested).unwrap();
        assert_eq!(get_path(&t, &path), Some(&json!("x")));
        let missing = KeyPath::parse("a.z", KeyStyle::Nested).unwrap();
        assert_eq!(get_path(&t, &missing), None);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut t = Tree::new();
        let path = KeyPath::parse("a.b.c", KeyStyle::Nested).unwrap();
        set_path(&mut t, &path, json!(1)).unwrap();
        assert_eq!(Value::Object(t), json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_path_conflicts_on_scalar_parent() {
        let mut t = tree(json!({"a": "leaf"}));
        let path = KeyPath::parse("a.b", KeyStyle::Nested).unwrap();
        let err = set_path(&mut t, &path, json!(1)).unwrap_err();
        assert!(matches!(err, DocumentError::PathConflict { .. }));
    }

    #[test]
    fn test_set_path_conflicts_on_container_target() {
        let mut t = tree(json!({"a": {"b": 1}}));
        let path = KeyPath::parse("a", KeyStyle::Nested).unwrap();
        assert!(set_path(&mut t, &path, json!(1)).is_err());
    }

    #[test]
    fn test_merge_writes_is_all_or_nothing() {
        let t = tree(json!({"a": "leaf", "b": 1}));
        let writes = vec![
            PendingWrite::new(KeyPath::parse("b", KeyStyle::Nested).unwrap(), 2),
            PendingWrite::new(KeyPath::parse("a.x", KeyStyle::Nested).unwrap(), 3),
        ];
        assert!(merge_writes(&t, &writes).is_err());
        assert_eq!(t.get("b"), Some(&json!(1)));
    }

    #[test]
    fn test_merge_writes_preserves_order() {
        let t = tree(json!({"z": 1, "a": 2}));
        let writes = vec![PendingWrite::new(
            KeyPath::parse("m", KeyStyle::Nested).unwrap(),
            "new",
        )];
        let merged = merge_writes(&t, &writes).unwrap();
        let keys: Vec<_> = merged.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
