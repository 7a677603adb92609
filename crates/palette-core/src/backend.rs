use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Cloud Firestore (document service)
    Firebase,
    /// Supabase / PostgREST (relational API service)
    Supabase,
    #[serde(rename = "mongodb")]
    MongoDb,
    #[serde(rename = "postgresql")]
    PostgreSql,
    #[serde(rename = "mysql")]
    MySql,
    Sqlite,
    Airtable,
    Notion,
}

impl BackendType {
    pub const ALL: [BackendType; 8] = [
        Self::Firebase,
        Self::Supabase,
        Self::MongoDb,
        Self::PostgreSql,
        Self::MySql,
        Self::Sqlite,
        Self::Airtable,
        Self::Notion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firebase => "firebase",
            Self::Supabase => "supabase",
            Self::MongoDb => "mongodb",
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Airtable => "airtable",
            Self::Notion => "notion",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Configuration(format!("Unknown backend type '{}'", s)))
    }
}

/// Backend-specific connection settings, as entered by the operator.
///
/// Values are strings or numbers; the shape depends on the [`BackendType`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendConfig(Map<String, Value>);

impl BackendConfig {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field rendered as text; numbers are formatted, empty strings count as absent
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => match n.as_f64() {
                // `5432.0` from a JSON editor still means port 5432
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    Some(format!("{}", f as i64))
                }
                _ => Some(n.to_string()),
            },
            _ => None,
        }
    }

    /// Required field for adapters that already passed validation
    pub fn require(&self, key: &str) -> crate::Result<String> {
        self.text(key)
            .ok_or_else(|| Error::Configuration(format!("{} is required", key)))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for BackendConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for BackendConfig {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Configuration(format!(
                "Backend configuration must be an object, got {}",
                other
            ))),
        }
    }
}
