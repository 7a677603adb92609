use crate::{BackendType, ConnectionId, Result, StorageAdapter};
use std::sync::Arc;

/// Factory trait for creating storage adapters
pub trait AdapterFactory: Send + Sync {
    /// Backend type this factory builds adapters for
    fn backend_type(&self) -> BackendType;

    /// Create a fresh, unconnected adapter owned by one connection
    fn create(&self, connection_id: &ConnectionId) -> Result<Arc<dyn StorageAdapter>>;
}
