//! Ordered nested mappings: the data model shared by every style layer,
//! palette, and the composed theme document.
//!
//! - [`merge`] deep-merges layers and expands `from_global` references
//! - [`template`] evaluates `{{ expr }}` expressions against a mapping
//! - [`resolve`] drives expression evaluation to a fixpoint
//! - [`compose`] assembles the final document from a theme library
//! - [`color`] parses color strings for palettes and template color forms
pub mod color;
pub mod compose;
pub mod merge;
pub mod resolve;
pub mod template;

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered string-keyed mapping of JSON-like values.
///
/// Keys keep their insertion order for display. Values are accessed either
/// by key (`get`, `get_mut`) or field-style through [`Index`], which yields
/// [`Value::Null`] for missing keys so lookups chain:
/// `doc["wallpaper"]["path"]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(Map<String, Value>);

static NULL: Value = Value::Null;

impl Mapping {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Look up a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a top-level key mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a key, preserving the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Whether a top-level key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a dotted path such as `term.color0` or `items.1`.
    ///
    /// Numeric segments index into lists.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = step(current, segment)?;
        }
        Some(current)
    }

    /// Replace the value at a dotted path, creating intermediate mappings.
    ///
    /// Returns `false` when the path crosses a non-container value or an
    /// out-of-range list index.
    pub fn set_path(&mut self, path: &str, value: Value) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        set_in_map(&mut self.0, &segments, value)
    }

    /// Return a new mapping with `other` deep-merged over `self`.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        merge::merge(self, &[other])
    }

    /// Consume the mapping into a [`Value::Object`].
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Borrow the underlying map mutably.
    pub const fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }
}

/// Follow one path segment from `value`.
fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn set_in_map(map: &mut Map<String, Value>, segments: &[&str], value: Value) -> bool {
    match segments {
        [] => false,
        [last] => {
            map.insert((*last).to_string(), value);
            true
        }
        [first, rest @ ..] => {
            let slot = map
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_in_value(slot, rest, value)
        }
    }
}

fn set_in_value(slot: &mut Value, segments: &[&str], value: Value) -> bool {
    match slot {
        Value::Object(map) => set_in_map(map, segments, value),
        Value::Array(items) => {
            let Some((first, rest)) = segments.split_first() else {
                return false;
            };
            let Some(item) = first.parse::<usize>().ok().and_then(|i| items.get_mut(i)) else {
                return false;
            };
            if rest.is_empty() {
                *item = value;
                true
            } else {
                set_in_value(item, rest, value)
            }
        }
        _ => false,
    }
}

impl Index<&str> for Mapping {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.0.get(key).unwrap_or(&NULL)
    }
}

impl From<Map<String, Value>> for Mapping {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Mapping> for Value {
    fn from(mapping: Mapping) -> Self {
        mapping.into_value()
    }
}

impl TryFrom<Value> for Mapping {
    type Error = Value;

    /// Succeeds for [`Value::Object`]; any other value is handed back.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Build a [`Mapping`] from a `serde_json::json!` object literal.
///
/// Non-object literals produce an empty mapping.
#[macro_export]
macro_rules! mapping {
    ($($json:tt)+) => {
        $crate::document::Mapping::try_from(::serde_json::json!($($json)+)).unwrap_or_default()
    };
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_style_access_chains_through_missing_keys() {
        let doc = mapping!({"wallpaper": {"path": "/img.png"}});
        assert_eq!(doc["wallpaper"]["path"], json!("/img.png"));
        assert_eq!(doc["missing"]["path"], Value::Null);
    }

    #[test]
    fn get_path_walks_mappings_and_lists() {
        let doc = mapping!({"term": {"color0": "#000000"}, "items": [1, {"x": 2}]});
        assert_eq!(doc.get_path("term.color0"), Some(&json!("#000000")));
        assert_eq!(doc.get_path("items.1.x"), Some(&json!(2)));
        assert_eq!(doc.get_path("items.5"), None);
        assert_eq!(doc.get_path("term.color0.deeper"), None);
    }

    #[test]
    fn set_path_creates_intermediate_mappings() {
        let mut doc = Mapping::new();
        assert!(doc.set_path("a.b.c", json!(1)));
        assert_eq!(doc, mapping!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn set_path_replaces_list_element() {
        let mut doc = mapping!({"l": [1, {"k": "old"}]});
        assert!(doc.set_path("l.0", json!(9)));
        assert!(doc.set_path("l.1.k", json!("new")));
        assert_eq!(doc, mapping!({"l": [9, {"k": "new"}]}));
    }

    #[test]
    fn set_path_rejects_scalar_parent() {
        let mut doc = mapping!({"a": 1});
        assert!(!doc.set_path("a.b", json!(2)));
        assert_eq!(doc, mapping!({"a": 1}));
    }

    #[test]
    fn remove_keeps_order() {
        let mut doc = mapping!({"a": 1, "b": 2, "c": 3});
        doc.remove("b");
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn try_from_rejects_non_objects() {
        assert!(Mapping::try_from(json!([1, 2])).is_err());
        assert!(Mapping::try_from(json!({"a": 1})).is_ok());
    }

    #[test]
    fn display_is_pretty_json() {
        let doc = mapping!({"mode": "dark"});
        assert_eq!(doc.to_string(), "{\n  \"mode\": \"dark\"\n}");
    }
}
