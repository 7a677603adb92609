use crate::{EntityKind, EntityRecord, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entity with a typed attribute shape
pub trait Entity: Sized {
    const KIND: EntityKind;

    /// Attributes sent on create, with defaults filled in
    fn to_attributes(&self) -> Result<Map<String, Value>>;

    fn from_record(record: EntityRecord) -> Result<Self>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    pub id: String,
    pub name: String,
    pub hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub colors: Vec<Color>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub palette_ids: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_category() -> String {
    "Uncategorized".to_string()
}

const ANONYMOUS: &str = "anonymous";

fn attributes_of<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        _ => Err(Error::Configuration("entity must serialize to an object".to_string())),
    }
}

fn fill_create_defaults(attrs: &mut Map<String, Value>) {
    if let Some(v) = attrs.get_mut("description") {
        if v.is_null() {
            *v = Value::String(String::new());
        }
    }
    if attrs.get("createdBy").map_or(true, Value::is_null) {
        attrs.insert("createdBy".to_string(), Value::String(ANONYMOUS.to_string()));
    }
}

fn decode<T: for<'de> Deserialize<'de>>(record: EntityRecord) -> Result<(T, EntityRecord)> {
    let mut map = record.attributes.clone();
    map.insert("id".to_string(), Value::String(record.id.clone()));
    let value = serde_json::from_value(Value::Object(map))?;
    Ok((value, record))
}

impl Entity for Palette {
    const KIND: EntityKind = EntityKind::Palettes;

    fn to_attributes(&self) -> Result<Map<String, Value>> {
        let mut attrs = attributes_of(self)?;
        fill_create_defaults(&mut attrs);
        Ok(attrs)
    }

    fn from_record(record: EntityRecord) -> Result<Self> {
        let (mut palette, record): (Palette, _) = decode(record)?;
        palette.created_at = record.created_at;
        palette.updated_at = record.updated_at;
        Ok(palette)
    }
}

impl Entity for Collection {
    const KIND: EntityKind = EntityKind::Collections;

    fn to_attributes(&self) -> Result<Map<String, Value>> {
        let mut attrs = attributes_of(self)?;
        fill_create_defaults(&mut attrs);
        Ok(attrs)
    }

    fn from_record(record: EntityRecord) -> Result<Self> {
        let (mut collection, record): (Collection, _) = decode(record)?;
        collection.created_at = record.created_at;
        collection.updated_at = record.updated_at;
        Ok(collection)
    }
}
