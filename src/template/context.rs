//! Rendering context built from a Kubernetes resource
//!
//! The context exposes the resource exactly as it serialises
//! (`apiVersion`, `kind`, `metadata`, `spec`, `status`) plus the Go field
//! names a Go template would see on the typed object:
//!
//! | Alias | Source |
//! |---|---|
//! | `TypeMeta`, `APIVersion`, `Kind` | `apiVersion`, `kind` |
//! | `ObjectMeta` | `metadata`, keys in Go form |
//! | `Name`, `Namespace`, `UID`, `CreationTimestamp`, ... | promoted from `ObjectMeta` |
//! | `Labels`, `Annotations` | `metadata.labels`/`annotations` (empty map when unset) |
//! | `Spec`, `Status` | `spec`, `status`, keys in Go form at every level |
//!
//! Go form capitalises the JSON key (`etcdUrl` becomes `EtcdUrl`), except for
//! the acronyms in [`GO_FIELD_NAMES`]. Keys of map-typed fields such as labels
//! are data and keep their spelling.
//!
//! Aliases for fields the resource does not carry are left undefined, so a
//! template that needs them fails instead of rendering an empty segment.

use minijinja::Value;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::error::TemplateError;

/// JSON keys whose Go field name is not a plain capitalisation
const GO_FIELD_NAMES: &[(&str, &str)] = &[
    ("apiVersion", "APIVersion"),
    ("uid", "UID"),
    ("oss", "OSS"),
];

/// Map-typed fields; their keys are left untouched
const MAP_FIELDS: &[&str] = &["labels", "annotations", "fieldsV1"];

/// Values available to a path template
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    root: Map<String, JsonValue>,
}

impl TemplateContext {
    /// Build the context for a resource
    pub fn from_resource<K: Serialize>(resource: &K) -> Result<Self, TemplateError> {
        let value = serde_json::to_value(resource)
            .map_err(|e| TemplateError::Context(e.to_string()))?;
        let JsonValue::Object(mut root) = value else {
            return Err(TemplateError::Context(
                "resource did not serialise to an object".to_string(),
            ));
        };

        let mut aliases = Map::new();

        let type_meta: Map<String, JsonValue> = ["apiVersion", "kind"]
            .into_iter()
            .filter_map(|key| present(root.get(key)).map(|v| (go_field_name(key), v.clone())))
            .collect();
        if !type_meta.is_empty() {
            aliases.extend(type_meta.clone());
            aliases.insert("TypeMeta".to_string(), JsonValue::Object(type_meta));
        }

        if let Some(JsonValue::Object(object_meta)) = present(root.get("metadata")).map(go_fields) {
            for (key, value) in &object_meta {
                if !value.is_null() {
                    aliases.insert(key.clone(), value.clone());
                }
            }
            aliases.insert("ObjectMeta".to_string(), JsonValue::Object(object_meta));
        }

        for alias in ["Labels", "Annotations"] {
            if !aliases.get(alias).is_some_and(JsonValue::is_object) {
                aliases.insert(alias.to_string(), JsonValue::Object(Map::new()));
            }
        }

        for key in ["spec", "status"] {
            if let Some(value) = present(root.get(key)) {
                aliases.insert(go_field_name(key), go_fields(value));
            }
        }

        for (alias, value) in aliases {
            root.entry(alias).or_insert(value);
        }

        Ok(Self { root })
    }

    /// Look up a top-level entry
    #[cfg(test)]
    pub(crate) fn get(&self, key: &str) -> Option<&JsonValue> {
        self.root.get(key)
    }

    /// Convert to minijinja Value for rendering
    pub fn to_value(&self) -> Value {
        Value::from_serialize(&self.root)
    }
}

fn present(value: Option<&JsonValue>) -> Option<&JsonValue> {
    value.filter(|v| !v.is_null())
}

/// Go struct field name for a JSON key
fn go_field_name(key: &str) -> String {
    if let Some((_, go)) = GO_FIELD_NAMES.iter().find(|(json, _)| *json == key) {
        return (*go).to_string();
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rename object keys to Go field names, recursing through nested values
fn go_fields(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = if MAP_FIELDS.contains(&key.as_str()) {
                        value.clone()
                    } else {
                        go_fields(value)
                    };
                    (go_field_name(key), value)
                })
                .collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(go_fields).collect()),
        other => other.clone(),
    }
}
