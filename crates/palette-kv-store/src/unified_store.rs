use crate::{FileKeyValueStore, PgKeyValueStore};
use anyhow::Result;
use async_trait::async_trait;
use palette_core::{KeyValueStore, MemoryKeyValueStore};
use std::path::Path;
use std::sync::Arc;

/// Key-value storage that can live in memory, in files or in PostgreSQL
pub enum UnifiedKeyValueStore {
    Memory(MemoryKeyValueStore),
    File(FileKeyValueStore),
    Postgres(Arc<PgKeyValueStore>),
}

impl UnifiedKeyValueStore {
    pub fn in_memory() -> Self {
        Self::Memory(MemoryKeyValueStore::new())
    }

    /// Create from a storage directory
    pub fn from_dir(storage_dir: impl AsRef<Path>) -> Self {
        Self::File(FileKeyValueStore::new(storage_dir.as_ref()))
    }

    /// Create from PostgreSQL
    pub async fn from_postgres(database_url: &str) -> Result<Self> {
        Ok(Self::Postgres(Arc::new(
            PgKeyValueStore::new(database_url).await?,
        )))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            Self::Postgres(_) => "postgres",
        }
    }
}

#[async_trait]
impl KeyValueStore for UnifiedKeyValueStore {
    async fn get(&self, key: &str) -> palette_core::Result<Option<String>> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::File(store) => store.get(key).await,
            Self::Postgres(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, blob: String) -> palette_core::Result<()> {
        match self {
            Self::Memory(store) => store.set(key, blob).await,
            Self::File(store) => store.set(key, blob).await,
            Self::Postgres(store) => store.set(key, blob).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palette_core::{BackendConfig, BackendType, ConnectionStore, PersistedConnectionRecord};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connection_store_over_file_backend() {
        let dir = TempDir::new().unwrap();
        let record = PersistedConnectionRecord::new(
            BackendType::Supabase,
            "prod",
            BackendConfig::new()
                .with("url", "https://demo.supabase.co")
                .with("anonKey", "anon"),
        )
        .active();

        let store = ConnectionStore::new(Arc::new(UnifiedKeyValueStore::from_dir(dir.path())));
        store.upsert(record).await.unwrap();

        // a fresh process sees the same active record
        let reopened = ConnectionStore::new(Arc::new(UnifiedKeyValueStore::from_dir(dir.path())));
        let active = reopened.get_active().await.unwrap().unwrap();
        assert_eq!(active.name, "prod");
        assert_eq!(active.backend_type, BackendType::Supabase);
    }

    #[tokio::test]
    async fn test_memory_variant() {
        let store = UnifiedKeyValueStore::in_memory();
        assert_eq!(store.kind(), "memory");
        store.set("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
