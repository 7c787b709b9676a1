//! Layer composition: deep merge and `from_global` style expansion.
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::Mapping;
use crate::error::ComposeError;

/// Key marking a layer that extends a named global style.
pub const FROM_GLOBAL: &str = "from_global";

/// A style layer tagged with the name of the source it came from.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Where the layer came from (`base_style`, `theme`, `mode:dark`, ...).
    pub source: String,
    /// The layer content.
    pub mapping: Mapping,
}

impl Layer {
    /// Create a layer from a source name and its content.
    #[must_use]
    pub fn new(source: impl Into<String>, mapping: Mapping) -> Self {
        Self {
            source: source.into(),
            mapping,
        }
    }
}

/// Deep-merge `layers` over `base` from left to right.
///
/// Nested mappings merge recursively; every other value, lists included,
/// is replaced wholesale by the later layer. Inputs are left untouched.
#[must_use]
pub fn merge(base: &Mapping, layers: &[&Mapping]) -> Mapping {
    let mut out = base.as_map().clone();
    for layer in layers {
        merge_into(&mut out, layer.as_map());
    }
    Mapping::from(out)
}

fn merge_into(target: &mut Map<String, Value>, layer: &Map<String, Value>) {
    for (key, value) in layer {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Expand a layer carrying `from_global = "<name>"` into the named global
/// style with the rest of the layer merged on top.
///
/// Layers without the marker are returned as a plain copy.
///
/// # Errors
///
/// Returns [`ComposeError::UnknownStyle`] if the named style does not exist,
/// listing every known style.
pub fn expand_global(
    layer: &Mapping,
    styles: &BTreeMap<String, Mapping>,
) -> Result<Mapping, ComposeError> {
    let Some(name) = layer.get(FROM_GLOBAL) else {
        return Ok(layer.clone());
    };
    let name = match name {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let global = styles.get(&name).ok_or_else(|| ComposeError::UnknownStyle {
        name: name.clone(),
        known: styles.keys().cloned().collect(),
    })?;
    let mut rest = layer.clone();
    rest.remove(FROM_GLOBAL);
    Ok(merge(global, &[&rest]))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mapping;

    #[test]
    fn single_layer_is_identity() {
        let layer = mapping!({"a": {"x": 1}, "l": [1, 2]});
        assert_eq!(merge(&layer, &[]), layer);
        assert_eq!(merge(&Mapping::new(), &[&layer]), layer);
    }

    #[test]
    fn nested_mappings_merge() {
        let merged = merge(&mapping!({"a": {"x": 1}}), &[&mapping!({"a": {"y": 2}})]);
        assert_eq!(merged, mapping!({"a": {"x": 1, "y": 2}}));
    }

    #[test]
    fn scalars_are_overridden() {
        let merged = merge(&mapping!({"c": "red"}), &[&mapping!({"c": "blue"})]);
        assert_eq!(merged, mapping!({"c": "blue"}));
    }

    #[test]
    fn lists_are_replaced_wholesale() {
        let merged = merge(&mapping!({"l": [1, 2]}), &[&mapping!({"l": [3]})]);
        assert_eq!(merged, mapping!({"l": [3]}));
    }

    #[test]
    fn mapping_replaces_scalar_and_back() {
        let merged = merge(&mapping!({"a": 1}), &[&mapping!({"a": {"b": 2}})]);
        assert_eq!(merged, mapping!({"a": {"b": 2}}));
        let merged = merge(&mapping!({"a": {"b": 2}}), &[&mapping!({"a": 1})]);
        assert_eq!(merged, mapping!({"a": 1}));
    }

    #[test]
    fn merge_is_associative_in_application_order() {
        let a = mapping!({"x": {"p": 1, "q": [1]}, "y": 1});
        let b = mapping!({"x": {"q": [2], "r": 3}});
        let c = mapping!({"x": {"p": 9}, "z": true});
        assert_eq!(merge(&merge(&a, &[&b]), &[&c]), merge(&a, &[&b, &c]));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let base = mapping!({"a": {"x": 1}});
        let layer = mapping!({"a": {"y": 2}});
        let _ = merge(&base, &[&layer]);
        assert_eq!(base, mapping!({"a": {"x": 1}}));
        assert_eq!(layer, mapping!({"a": {"y": 2}}));
    }

    #[test]
    fn expand_global_layer_keys_win() {
        let mut styles = BTreeMap::new();
        styles.insert(
            "rounded".to_string(),
            mapping!({"border": {"radius": 8, "width": 1}}),
        );
        let layer = mapping!({"from_global": "rounded", "border": {"width": 2}});
        let expanded = expand_global(&layer, &styles).unwrap();
        assert_eq!(expanded, mapping!({"border": {"radius": 8, "width": 2}}));
    }

    #[test]
    fn expand_global_without_marker_is_copy() {
        let layer = mapping!({"a": 1});
        assert_eq!(expand_global(&layer, &BTreeMap::new()).unwrap(), layer);
    }

    #[test]
    fn expand_global_unknown_style_lists_known() {
        let mut styles = BTreeMap::new();
        styles.insert("compact".to_string(), Mapping::new());
        let err = expand_global(&mapping!({"from_global": "nord"}), &styles).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @r#"global style "nord" not found in ["compact"]"#);
    }
}
