mod adapter;
mod backend;
mod connection;
mod error;
mod factory;
mod handle;
mod kv;
mod manager;
mod models;
mod persisted;
mod record;
mod registry;
mod unsupported;
mod validator;

pub use adapter::{ProbeOutcome, SessionHandle, StorageAdapter};
pub use backend::{BackendConfig, BackendType};
pub use connection::{Connection, ConnectionId, ConnectionInfo, ConnectionState};
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, Result, StorageError, StorageErrorKind,
};
pub use factory::AdapterFactory;
pub use handle::StorageHandle;
pub use kv::{KeyValueStore, MemoryKeyValueStore};
pub use manager::{ConnectionManager, ManagerSettings, RestoreOutcome};
pub use models::{Collection, Color, Entity, Palette};
pub use persisted::{ConnectionStore, PersistedConnectionRecord, CONNECTIONS_KEY};
pub use record::{EntityKind, EntityRecord, Patch};
pub use registry::AdapterRegistry;
pub use unsupported::{UnsupportedAdapter, UnsupportedAdapterFactory};
pub use validator::{required_fields, validate_config, ValidationReport};

// Re-export for adapter crates
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
