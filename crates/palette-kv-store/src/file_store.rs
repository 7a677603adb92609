use anyhow::{anyhow, Context};
use async_trait::async_trait;
use palette_core::{KeyValueStore, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key-value store keeping one `<key>.json` file per key in a directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    storage_dir: PathBuf,
}

impl FileKeyValueStore {
    /// The directory is created on first write
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(anyhow!("Key '{}' cannot be used as a file name", key));
        }
        Ok(self.storage_dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}", path.display()))
                .into()),
        }
    }

    async fn set(&self, key: &str, blob: String) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .context("Failed to create storage directory")?;

        // readers never observe a partially written blob
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        debug!("Stored key '{}' at {}", key, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path());
        assert_eq!(store.get("palette_database_connections").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("state");

        FileKeyValueStore::new(&nested)
            .set("connections", "[1,2]".to_string())
            .await
            .unwrap();
        FileKeyValueStore::new(&nested)
            .set("connections", "[3]".to_string())
            .await
            .unwrap();

        let reopened = FileKeyValueStore::new(&nested);
        assert_eq!(
            reopened.get("connections").await.unwrap().as_deref(),
            Some("[3]")
        );
        assert!(nested.join("connections.json").exists());
        assert!(!nested.join("connections.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path());

        for key in ["../escape", "a/b", "", ".hidden"] {
            assert!(store.set(key, "x".to_string()).await.is_err(), "{}", key);
        }
    }
}
