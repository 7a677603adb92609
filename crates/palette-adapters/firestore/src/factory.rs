use crate::FirestoreAdapter;
use palette_core::{AdapterFactory, BackendType, ConnectionId, Result, StorageAdapter};
use std::sync::Arc;

pub struct FirestoreAdapterFactory;

impl AdapterFactory for FirestoreAdapterFactory {
    fn backend_type(&self) -> BackendType {
        BackendType::Firebase
    }

    fn create(&self, connection_id: &ConnectionId) -> Result<Arc<dyn StorageAdapter>> {
        Ok(Arc::new(FirestoreAdapter::new(connection_id)))
    }
}
