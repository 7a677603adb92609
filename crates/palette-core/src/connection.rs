use crate::{BackendConfig, BackendType, StorageAdapter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a live connection in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of one connection id; `Disconnected` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Live connection owned by the [`ConnectionManager`](crate::ConnectionManager)
#[derive(Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub backend_type: BackendType,
    pub name: String,
    pub config: BackendConfig,
    pub(crate) adapter: Arc<dyn StorageAdapter>,
    pub(crate) state: ConnectionState,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn adapter(&self) -> Arc<dyn StorageAdapter> {
        Arc::clone(&self.adapter)
    }

    pub fn info(&self, is_current: bool) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            backend_type: self.backend_type,
            name: self.name.clone(),
            is_connected: self.is_connected(),
            is_current,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("backend_type", &self.backend_type)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Listing row for a live connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    pub name: String,
    pub is_connected: bool,
    pub is_current: bool,
}
