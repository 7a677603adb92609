use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Domain entity collections served by every adapter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Palettes,
    Collections,
}

impl EntityKind {
    /// Collection / table name on the backend
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Palettes => "palettes",
            Self::Collections => "collections",
        }
    }

    /// Singular label for messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Palettes => "Palette",
            Self::Collections => "Collection",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Opaque stored entity: identifier, attributes and backend-assigned timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: String,
    pub attributes: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Partial update. A field set to [`None`] is the absent sentinel and is never written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: BTreeMap<String, Option<Value>>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), Some(value.into()));
        self
    }

    pub fn absent(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), None);
        self
    }

    /// Fields that will actually be written; absent entries are dropped, explicit nulls kept
    pub fn write_set(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Option::is_none)
    }
}

impl From<Map<String, Value>> for Patch {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, Some(v))).collect(),
        }
    }
}

impl FromIterator<(String, Option<Value>)> for Patch {
    fn from_iter<I: IntoIterator<Item = (String, Option<Value>)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_set_drops_absent_keeps_null() {
        let patch = Patch::new()
            .set("name", "Sunset")
            .set("description", Value::Null)
            .absent("category");

        let written = patch.write_set();
        assert_eq!(written.len(), 2);
        assert_eq!(written.get("name"), Some(&json!("Sunset")));
        assert_eq!(written.get("description"), Some(&Value::Null));
        assert!(!written.contains_key("category"));
    }

    #[test]
    fn test_patch_of_only_absent_fields_is_empty() {
        assert!(Patch::new().absent("name").is_empty());
        assert!(!Patch::new().set("name", "x").is_empty());
    }

    #[test]
    fn test_entity_kind_collection_names() {
        assert_eq!(EntityKind::Palettes.collection(), "palettes");
        assert_eq!(EntityKind::Collections.to_string(), "collections");
    }
}
