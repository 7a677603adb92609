use crate::SupabaseAdapter;
use palette_core::{AdapterFactory, BackendType, ConnectionId, Result, StorageAdapter};
use std::sync::Arc;

pub struct SupabaseAdapterFactory;

impl AdapterFactory for SupabaseAdapterFactory {
    fn backend_type(&self) -> BackendType {
        BackendType::Supabase
    }

    fn create(&self, connection_id: &ConnectionId) -> Result<Arc<dyn StorageAdapter>> {
        Ok(Arc::new(SupabaseAdapter::new(connection_id)))
    }
}
