use crate::{
    ConnectionId, EntityKind, EntityRecord, Patch, Result, StorageAdapter, StorageError,
};
use crate::models::Entity;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Caller-side view of the current adapter.
///
/// Every call is bounded by the optional timeout and cancellation token; when
/// either fires the in-flight request future is dropped and the call fails as
/// `Unreachable`.
#[derive(Clone)]
pub struct StorageHandle {
    connection_id: ConnectionId,
    adapter: Arc<dyn StorageAdapter>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl StorageHandle {
    pub(crate) fn new(
        connection_id: ConnectionId,
        adapter: Arc<dyn StorageAdapter>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            connection_id,
            adapter,
            timeout,
            cancel: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timed = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                    StorageError::unreachable(format!("{} timed out after {:?}", op, limit))
                })?,
                None => fut.await,
            }
        };

        match &self.cancel {
            Some(token) => tokio::select! {
                res = timed => res,
                _ = token.cancelled() => {
                    Err(StorageError::unreachable(format!("{} cancelled", op)).into())
                }
            },
            None => timed.await,
        }
    }

    pub async fn create(&self, kind: EntityKind, attributes: Map<String, Value>) -> Result<String> {
        self.bounded("create", self.adapter.create(kind, attributes))
            .await
    }

    pub async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>> {
        self.bounded("get", self.adapter.get_by_id(kind, id)).await
    }

    pub async fn get_all(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        self.bounded("list", self.adapter.get_all(kind)).await
    }

    pub async fn update(&self, kind: EntityKind, id: &str, patch: &Patch) -> Result<()> {
        self.bounded("update", self.adapter.update(kind, id, patch))
            .await
    }

    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        self.bounded("delete", self.adapter.delete(kind, id)).await
    }

    /// Typed create for [`Entity`] models
    pub async fn insert<E: Entity>(&self, entity: &E) -> Result<String> {
        self.create(E::KIND, entity.to_attributes()?).await
    }

    /// Typed full-collection load for [`Entity`] models
    pub async fn load_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.get_all(E::KIND)
            .await?
            .into_iter()
            .map(E::from_record)
            .collect()
    }
}
