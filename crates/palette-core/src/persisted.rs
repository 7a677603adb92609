use crate::{BackendConfig, BackendType, KeyValueStore, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Key under which the record list is stored
pub const CONNECTIONS_KEY: &str = "palette_database_connections";

/// Remembered connection configuration, independent of any live connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedConnectionRecord {
    #[serde(rename = "type")]
    pub backend_type: BackendType,

    /// Unique name for this configuration
    pub name: String,

    pub config: BackendConfig,

    #[serde(default)]
    pub is_active: bool,

    #[serde(with = "chrono::serde::ts_milliseconds", default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds", default = "Utc::now")]
    pub last_used: DateTime<Utc>,
}

impl PersistedConnectionRecord {
    pub fn new(backend_type: BackendType, name: impl Into<String>, config: BackendConfig) -> Self {
        let now = Utc::now();
        Self {
            backend_type,
            name: name.into(),
            config,
            is_active: false,
            created_at: now,
            last_used: now,
        }
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }
}

/// Persisted connection records, kept as one JSON blob in a [`KeyValueStore`].
///
/// At most one record is active after any write made through this type.
#[derive(Clone)]
pub struct ConnectionStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl ConnectionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(kv, CONNECTIONS_KEY)
    }

    pub fn with_key(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    async fn load(&self) -> Result<Vec<PersistedConnectionRecord>> {
        let Some(blob) = self.kv.get(&self.key).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&blob) {
            Ok(records) => Ok(records),
            Err(e) => {
                // preserved before any save can replace it
                let backup = self.corrupt_key();
                self.kv.set(&backup, blob).await?;
                error!(
                    "Unreadable connection list under '{}' ({}); copied to '{}' and starting empty",
                    self.key, e, backup
                );
                Ok(Vec::new())
            }
        }
    }

    fn corrupt_key(&self) -> String {
        format!("{}.corrupt", self.key)
    }

    async fn save(&self, records: &[PersistedConnectionRecord]) -> Result<()> {
        let blob = serde_json::to_string(records)?;
        self.kv.set(&self.key, blob).await?;
        debug!("Saved {} connection record(s)", records.len());
        Ok(())
    }

    /// Insert or replace the record with the same name.
    ///
    /// An existing record keeps its `created_at`; `last_used` is refreshed.
    /// Upserting an active record deactivates every other one.
    pub async fn upsert(&self, mut record: PersistedConnectionRecord) -> Result<()> {
        let mut records = self.load().await?;
        record.last_used = Utc::now();

        if record.is_active {
            for other in records.iter_mut() {
                other.is_active = false;
            }
        }

        match records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => {
                record.created_at = existing.created_at;
                *existing = record;
            }
            None => records.push(record),
        }

        self.save(&records).await
    }

    pub async fn list_all(&self) -> Result<Vec<PersistedConnectionRecord>> {
        self.load().await
    }

    pub async fn get(&self, name: &str) -> Result<Option<PersistedConnectionRecord>> {
        Ok(self.load().await?.into_iter().find(|r| r.name == name))
    }

    /// Make `name` the only active record. Returns false, writing nothing, if unknown
    pub async fn mark_active(&self, name: &str) -> Result<bool> {
        let mut records = self.load().await?;
        if !records.iter().any(|r| r.name == name) {
            return Ok(false);
        }

        let now = Utc::now();
        for record in records.iter_mut() {
            record.is_active = record.name == name;
            if record.is_active {
                record.last_used = now;
            }
        }

        self.save(&records).await?;
        Ok(true)
    }

    pub async fn get_active(&self) -> Result<Option<PersistedConnectionRecord>> {
        Ok(self.load().await?.into_iter().find(|r| r.is_active))
    }

    /// Forget a record on explicit request
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.name != name);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records).await?;
        Ok(true)
    }
}
