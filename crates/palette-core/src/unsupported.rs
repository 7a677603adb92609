use crate::{
    AdapterFactory, BackendConfig, BackendType, ConnectionError, ConnectionId, EntityKind,
    EntityRecord, Error, Patch, ProbeOutcome, Result, StorageAdapter,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

/// Stand-in for reserved backend types; never gets past `connect`
pub struct UnsupportedAdapter {
    backend_type: BackendType,
}

impl UnsupportedAdapter {
    pub fn new(backend_type: BackendType) -> Self {
        Self { backend_type }
    }
}

#[async_trait]
impl StorageAdapter for UnsupportedAdapter {
    fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    async fn connect(&self, _config: &BackendConfig) -> Result<ProbeOutcome> {
        info!("Rejecting connect for unsupported backend {}", self.backend_type);
        Err(ConnectionError::unsupported(format!(
            "{} backend is not yet supported",
            self.backend_type
        ))
        .into())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        false
    }

    async fn create(&self, _kind: EntityKind, _attributes: Map<String, Value>) -> Result<String> {
        Err(Error::NotConnected)
    }

    async fn get_by_id(&self, _kind: EntityKind, _id: &str) -> Result<Option<EntityRecord>> {
        Err(Error::NotConnected)
    }

    async fn get_all(&self, _kind: EntityKind) -> Result<Vec<EntityRecord>> {
        Err(Error::NotConnected)
    }

    async fn update(&self, _kind: EntityKind, _id: &str, _patch: &Patch) -> Result<()> {
        Err(Error::NotConnected)
    }

    async fn delete(&self, _kind: EntityKind, _id: &str) -> Result<()> {
        Err(Error::NotConnected)
    }
}

pub struct UnsupportedAdapterFactory {
    backend_type: BackendType,
}

impl UnsupportedAdapterFactory {
    pub fn new(backend_type: BackendType) -> Self {
        Self { backend_type }
    }
}

impl AdapterFactory for UnsupportedAdapterFactory {
    fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    fn create(&self, _connection_id: &ConnectionId) -> Result<Arc<dyn StorageAdapter>> {
        Ok(Arc::new(UnsupportedAdapter::new(self.backend_type)))
    }
}
