use anyhow::Context;
use async_trait::async_trait;
use palette_core::{KeyValueStore, Result};
use sqlx::PgPool;
use tracing::{debug, info};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_blobs (
    key TEXT PRIMARY KEY,
    blob TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const SELECT_BLOB: &str = "SELECT blob FROM kv_blobs WHERE key = $1";

const UPSERT_BLOB: &str = "INSERT INTO kv_blobs (key, blob, updated_at)
     VALUES ($1, $2, now())
     ON CONFLICT (key) DO UPDATE SET blob = EXCLUDED.blob, updated_at = now()";

/// Key-value store backed by a single PostgreSQL table
pub struct PgKeyValueStore {
    pool: PgPool,
}

impl PgKeyValueStore {
    /// Connect and make sure the `kv_blobs` table exists
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .context("Failed to create kv_blobs table")?;
        info!("PostgreSQL key-value table ready");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let blob = sqlx::query_scalar::<_, String>(SELECT_BLOB)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read key '{}'", key))?;
        Ok(blob)
    }

    async fn set(&self, key: &str, blob: String) -> Result<()> {
        sqlx::query(UPSERT_BLOB)
            .bind(key)
            .bind(blob)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to write key '{}'", key))?;
        debug!("Stored key '{}' in PostgreSQL", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_existing_key() {
        assert!(UPSERT_BLOB.contains("ON CONFLICT (key) DO UPDATE"));
        assert!(UPSERT_BLOB.contains("blob = EXCLUDED.blob"));
    }

    #[test]
    fn test_statements_target_same_table() {
        for sql in [CREATE_TABLE, SELECT_BLOB, UPSERT_BLOB] {
            assert!(sql.contains("kv_blobs"), "{}", sql);
        }
        assert!(CREATE_TABLE.contains("key TEXT PRIMARY KEY"));
    }
}
