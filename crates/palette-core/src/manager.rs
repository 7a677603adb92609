use crate::{
    validate_config, AdapterRegistry, BackendConfig, BackendType, Connection, ConnectionError,
    ConnectionId, ConnectionInfo, ConnectionState, ConnectionStore, Error,
    PersistedConnectionRecord, ProbeOutcome, Result, StorageAdapter, StorageHandle,
};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Tunables for [`ConnectionManager`]
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Bound on adapter connect and data calls; `None` waits forever
    pub operation_timeout: Option<Duration>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Result of trying to bring back the previously active configuration
#[derive(Debug)]
pub enum RestoreOutcome {
    Restored(ConnectionId),
    NoActiveRecord,
    Failed { name: String, error: Error },
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Connection>,
    connecting: HashSet<ConnectionId>,
    current: Option<ConnectionId>,
}

/// Owns live connections, the current-connection pointer, and keeps the
/// persisted connection records in step.
///
/// Constructed once per process and shared by reference. Bookkeeping is
/// serialized by one async mutex; adapter I/O always runs outside it.
pub struct ConnectionManager {
    adapters: Arc<AdapterRegistry>,
    store: ConnectionStore,
    settings: ManagerSettings,
    state: Mutex<RegistryState>,
}

impl ConnectionManager {
    pub fn new(adapters: Arc<AdapterRegistry>, store: ConnectionStore) -> Self {
        Self::with_settings(adapters, store, ManagerSettings::default())
    }

    pub fn with_settings(
        adapters: Arc<AdapterRegistry>,
        store: ConnectionStore,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            adapters,
            store,
            settings,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Saved configurations in stored order
    pub async fn saved_connections(&self) -> Result<Vec<PersistedConnectionRecord>> {
        self.store.list_all().await
    }

    /// Validate, connect, register, make current and persist as active.
    ///
    /// Nothing is registered or persisted unless every step succeeds.
    pub async fn connect_to_backend(
        &self,
        config: BackendConfig,
        backend_type: BackendType,
        name: &str,
    ) -> Result<ConnectionId> {
        let report = validate_config(backend_type, &config);
        if !report.valid {
            return Err(Error::Validation(report.errors));
        }

        let id = ConnectionId::new();
        let adapter = self.adapters.factory(backend_type).create(&id)?;

        self.state.lock().await.connecting.insert(id);
        let connected = self.connect_adapter(adapter.as_ref(), &config).await;
        self.state.lock().await.connecting.remove(&id);

        let probe = match connected {
            Ok(probe) => probe,
            Err(e) => {
                error!("Connection '{}' ({}) failed: {}", name, backend_type, e);
                discard_adapter(adapter.as_ref(), name).await;
                return Err(e);
            }
        };

        if probe.is_degraded() {
            warn!(
                "Connected to '{}' ({}) but palettes are not readable yet: {:?}",
                name, backend_type, probe
            );
        }

        let committed = {
            let mut state = self.state.lock().await;
            let record =
                PersistedConnectionRecord::new(backend_type, name, config.clone()).active();
            match self.store.upsert(record).await {
                Ok(()) => {
                    state.connections.insert(
                        id,
                        Connection {
                            id,
                            backend_type,
                            name: name.to_string(),
                            config,
                            adapter: Arc::clone(&adapter),
                            state: ConnectionState::Connected,
                        },
                    );
                    state.current = Some(id);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        if let Err(e) = committed {
            error!("Could not persist connection '{}': {}", name, e);
            discard_adapter(adapter.as_ref(), name).await;
            return Err(e);
        }

        info!("Connected to {} backend '{}' as {}", backend_type, name, id);
        Ok(id)
    }

    async fn connect_adapter(
        &self,
        adapter: &dyn StorageAdapter,
        config: &BackendConfig,
    ) -> Result<ProbeOutcome> {
        match self.settings.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, adapter.connect(config))
                .await
                .map_err(|_| {
                    ConnectionError::unreachable(format!("connect timed out after {:?}", limit))
                })?,
            None => adapter.connect(config).await,
        }
    }

    /// The current connection, if any
    pub async fn current(&self) -> Option<Connection> {
        let mut state = self.state.lock().await;
        let id = state.current?;
        if !state.connections.contains_key(&id) {
            state.current = None;
            return None;
        }
        state.connections.get(&id).cloned()
    }

    /// Handle for data operations on the current connection
    pub async fn current_adapter(&self) -> Result<StorageHandle> {
        let conn = self.current().await.ok_or(Error::NotConnected)?;
        Ok(StorageHandle::new(
            conn.id,
            conn.adapter(),
            self.settings.operation_timeout,
        ))
    }

    /// Point "current" at another live connection. Connection states are untouched
    pub async fn switch_to(&self, id: &ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        if state.connections.contains_key(id) {
            state.current = Some(*id);
            info!("Switched current connection to {}", id);
            true
        } else {
            false
        }
    }

    /// Remove a connection and close its adapter. Never fails; unknown ids are ignored
    pub async fn disconnect(&self, id: &ConnectionId) {
        let removed = {
            let mut state = self.state.lock().await;
            let removed = state.connections.remove(id);
            if state.current == Some(*id) {
                state.current = None;
            }
            removed
        };

        if let Some(mut conn) = removed {
            discard_adapter(conn.adapter.as_ref(), &conn.name).await;
            conn.state = ConnectionState::Disconnected;
            info!("Disconnected '{}' ({})", conn.name, id);
        }
    }

    /// Disconnect every live connection
    pub async fn disconnect_all(&self) {
        let ids: Vec<ConnectionId> = self.state.lock().await.connections.keys().copied().collect();
        join_all(ids.iter().map(|id| self.disconnect(id))).await;
    }

    /// Try a configuration on a throwaway adapter; registry and store stay untouched
    pub async fn test_connection(
        &self,
        backend_type: BackendType,
        config: &BackendConfig,
    ) -> Result<ProbeOutcome> {
        let report = validate_config(backend_type, config);
        if !report.valid {
            return Err(Error::Validation(report.errors));
        }

        let adapter = self
            .adapters
            .factory(backend_type)
            .create(&ConnectionId::new())?;
        let outcome = self.connect_adapter(adapter.as_ref(), config).await;
        discard_adapter(adapter.as_ref(), "connection test").await;
        outcome
    }

    pub async fn list_connections(&self) -> Vec<ConnectionInfo> {
        let state = self.state.lock().await;
        let mut list: Vec<_> = state
            .connections
            .values()
            .map(|c| c.info(state.current == Some(c.id)))
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// `None` once disconnected (or never seen)
    pub async fn state_of(&self, id: &ConnectionId) -> Option<ConnectionState> {
        let state = self.state.lock().await;
        if state.connecting.contains(id) {
            Some(ConnectionState::Connecting)
        } else {
            state.connections.get(id).map(|c| c.state)
        }
    }

    /// Mark a saved configuration active without connecting to it
    pub async fn activate_saved(&self, name: &str) -> Result<bool> {
        let _guard = self.state.lock().await;
        self.store.mark_active(name).await
    }

    /// Drop a saved configuration; live connections using it stay up
    pub async fn forget_saved(&self, name: &str) -> Result<bool> {
        let _guard = self.state.lock().await;
        self.store.remove(name).await
    }

    /// Startup routine: reconnect to the persisted active configuration
    pub async fn restore_active(&self) -> RestoreOutcome {
        let record = match self.store.get_active().await {
            Ok(Some(record)) => record,
            Ok(None) => return RestoreOutcome::NoActiveRecord,
            Err(e) => {
                return RestoreOutcome::Failed {
                    name: String::new(),
                    error: e,
                }
            }
        };

        info!("Restoring connection '{}' ({})", record.name, record.backend_type);
        match self
            .connect_to_backend(record.config, record.backend_type, &record.name)
            .await
        {
            Ok(id) => RestoreOutcome::Restored(id),
            Err(error) => RestoreOutcome::Failed {
                name: record.name,
                error,
            },
        }
    }
}

async fn discard_adapter(adapter: &dyn StorageAdapter, name: &str) {
    if let Err(e) = adapter.disconnect().await {
        warn!("Ignoring disconnect error for '{}': {}", name, e);
    }
}
