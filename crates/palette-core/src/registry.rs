use crate::{AdapterFactory, BackendType, UnsupportedAdapterFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of adapter factories keyed by backend type
pub struct AdapterRegistry {
    factories: HashMap<BackendType, Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an adapter factory, replacing any previous one for the same type
    pub fn register(&mut self, factory: Arc<dyn AdapterFactory>) {
        self.factories.insert(factory.backend_type(), factory);
    }

    /// Get the factory for a backend type.
    ///
    /// Types without a registered factory get one whose adapters refuse to connect.
    pub fn factory(&self, backend_type: BackendType) -> Arc<dyn AdapterFactory> {
        self.factories
            .get(&backend_type)
            .cloned()
            .unwrap_or_else(|| Arc::new(UnsupportedAdapterFactory::new(backend_type)))
    }

    pub fn is_supported(&self, backend_type: BackendType) -> bool {
        self.factories.contains_key(&backend_type)
    }

    /// List all registered backend types
    pub fn list_supported(&self) -> Vec<BackendType> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendConfig, ConnectionErrorKind, ConnectionId};

    #[tokio::test]
    async fn test_unregistered_type_falls_back_to_unsupported() {
        let registry = AdapterRegistry::new();
        assert!(!registry.is_supported(BackendType::Notion));

        let factory = registry.factory(BackendType::Notion);
        assert_eq!(factory.backend_type(), BackendType::Notion);

        let adapter = factory.create(&ConnectionId::new()).unwrap();
        let err = adapter.connect(&BackendConfig::new()).await.unwrap_err();
        assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Unsupported));
    }

    #[test]
    fn test_register_and_list() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(UnsupportedAdapterFactory::new(BackendType::Sqlite)));
        registry.register(Arc::new(UnsupportedAdapterFactory::new(BackendType::Airtable)));

        assert_eq!(
            registry.list_supported(),
            vec![BackendType::Airtable, BackendType::Sqlite]
        );
    }
}
