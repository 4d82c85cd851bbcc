// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for arkfs

use thiserror::Error;

/// Result type alias
pub type ArkResult<T> = Result<T, ArkError>;

/// Main error type
#[derive(Error, Debug)]
pub enum ArkError {
    #[error("Access denied: {0} is outside the allowed directories")]
    AccessDenied(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store is closed")]
    StoreClosed,

    #[error("Audit queue is full")]
    AuditQueueFull,

    #[error("Audit queue is closed")]
    AuditQueueClosed,
}

impl ArkError {
    /// Wrap an I/O error raised while touching `path`, naming the path
    /// when it does not exist
    pub fn io_at(e: std::io::Error, path: &str) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArkError::NotFound(path.to_string())
        } else {
            ArkError::Io(e)
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, ArkError::AccessDenied(_))
    }

    /// Errors raised by the OS filesystem rather than by the store.
    pub fn is_filesystem_error(&self) -> bool {
        matches!(
            self,
            ArkError::Io(_) | ArkError::NotFound(_) | ArkError::NotADirectory(_)
        )
    }
}

impl From<serde_json::Error> for ArkError {
    fn from(e: serde_json::Error) -> Self {
        ArkError::Serialization(e.to_string())
    }
}
