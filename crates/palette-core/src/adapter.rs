use crate::{BackendConfig, BackendType, ConnectionId, EntityKind, EntityRecord, Patch, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

/// Uniform storage contract every backend implements.
///
/// Data operations are only valid between a successful [`connect`](Self::connect)
/// and [`disconnect`](Self::disconnect); outside that window they fail with
/// [`Error::NotConnected`](crate::Error::NotConnected).
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Backend this adapter speaks to
    fn backend_type(&self) -> BackendType;

    /// Open a session and probe the palettes collection with one round-trip read
    async fn connect(&self, config: &BackendConfig) -> Result<ProbeOutcome>;

    /// Drop the session. Idempotent; errors are informational only
    async fn disconnect(&self) -> Result<()>;

    /// Check if a session is open
    async fn is_connected(&self) -> bool;

    /// Create an entity and return the backend-assigned id
    async fn create(&self, kind: EntityKind, attributes: Map<String, Value>) -> Result<String>;

    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>>;

    /// Load the whole collection
    async fn get_all(&self, kind: EntityKind) -> Result<Vec<EntityRecord>>;

    /// Merge the patch's write set into an existing entity
    async fn update(&self, kind: EntityKind, id: &str, patch: &Patch) -> Result<()>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()>;
}

/// What the connect probe saw on the palettes collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeOutcome {
    Accessible,
    /// Backend reachable but rules/policies deny the read
    PermissionDenied,
    /// Backend reachable, collection not provisioned yet
    CollectionMissing,
}

impl ProbeOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Accessible)
    }
}

/// Per-connect session name, unique across adapters of the same backend type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    name: String,
}

impl SessionHandle {
    pub fn new(connection_id: &ConnectionId) -> Self {
        Self {
            name: format!(
                "palette-{}-{}",
                connection_id,
                Utc::now().timestamp_millis()
            ),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_names_are_distinct_per_connection() {
        let a = SessionHandle::new(&ConnectionId::new());
        let b = SessionHandle::new(&ConnectionId::new());
        assert_ne!(a, b);
        assert!(a.name().starts_with("palette-"));
    }

    #[test]
    fn test_probe_degraded() {
        assert!(!ProbeOutcome::Accessible.is_degraded());
        assert!(ProbeOutcome::PermissionDenied.is_degraded());
        assert!(ProbeOutcome::CollectionMissing.is_degraded());
    }
}
