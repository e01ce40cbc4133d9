//! Error types for the resolution engine.
//!
//! Every failure the engine can produce maps onto one closed [`ErrorKind`],
//! and [`report`] decides how each kind is logged. Per-item failures inside a
//! sweep are reported and skipped; storage failures end the current operation.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::IndexVersion;

#[derive(Error, Debug)]
pub enum Error {
    /// Referenced track / playlist / music file id does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Cached data was produced by an older index version
    #[error("index is stale: cached version {cached}, current version {current}")]
    IndexStale {
        cached: IndexVersion,
        current: IndexVersion,
    },

    /// Per-file failure while repairing a playlist
    #[error("file error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Closed tag for [`Error`], used for dispatching log/report actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Stale,
    FileIo,
    Storage,
    InvalidInput,
    Cancelled,
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::IndexStale { .. } => ErrorKind::Stale,
            Error::FileIo { .. } => ErrorKind::FileIo,
            Error::Storage(_) => ErrorKind::Storage,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Storage failures abort the whole operation; everything else is
    /// scoped to a single item.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

/// Log an error according to its kind. `context` names the item or
/// operation the error belongs to.
pub fn report(err: &Error, context: &str) {
    match err.kind() {
        ErrorKind::NotFound => tracing::warn!(context, error = %err, "not found"),
        ErrorKind::Stale => tracing::debug!(context, error = %err, "discarding stale entry"),
        ErrorKind::FileIo => tracing::warn!(context, error = %err, "file operation failed"),
        ErrorKind::Storage => tracing::error!(context, error = %err, "storage failure"),
        ErrorKind::InvalidInput => tracing::warn!(context, error = %err, "rejected input"),
        ErrorKind::Cancelled => tracing::info!(context, "cancelled"),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
