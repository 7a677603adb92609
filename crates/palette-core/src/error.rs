use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Adapter not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    /// Kind of the storage failure, if this is one.
    pub fn storage_kind(&self) -> Option<StorageErrorKind> {
        match self {
            Self::Storage(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Kind of the connection failure, if this is one.
    pub fn connection_kind(&self) -> Option<ConnectionErrorKind> {
        match self {
            Self::Connection(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Classification of a failed data operation on a connected adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorageErrorKind {
    NotFound,
    PermissionDenied,
    Unreachable,
    Invalid,
    /// Backend code with no mapping; the message carries the native text
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Unreachable => "unreachable",
            Self::Invalid => "invalid",
            Self::Other => "backend failure",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::PermissionDenied, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Unreachable, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Invalid, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Other, message)
    }
}

/// Why an adapter refused to connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionErrorKind {
    Unreachable,
    InvalidCredentials,
    InvalidConfig,
    Unsupported,
    Other,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unreachable => "backend unreachable",
            Self::InvalidCredentials => "invalid credentials",
            Self::InvalidConfig => "invalid configuration",
            Self::Unsupported => "not yet supported",
            Self::Other => "connection failed",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Unreachable, message)
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::InvalidCredentials, message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::InvalidConfig, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Unsupported, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Other, message)
    }
}
