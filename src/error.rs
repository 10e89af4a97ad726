//! Error types for attempt evaluation and its persisted state.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the evaluation subsystem.
///
/// Malformed state on disk is not represented here: loaders recover by
/// falling back to defaults. Only failures that would silently lose a
/// write, or requests that cannot be served, become errors.
#[derive(Debug, Error)]
pub enum LexisError {
    /// Reading or writing a state file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be encoded for storage.
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Appending to or reading from the attempt log failed.
    #[error("attempt log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unknown label '{0}', expected correct, almost or incorrect")]
    UnknownLabel(String),

    #[error("unknown bucket '{0}'")]
    UnknownBucket(String),

    #[error("bucket '{0}' has no words")]
    EmptyBucket(String),

    /// Word rejected by the catalog (empty, or already present).
    #[error("invalid word '{word}': {reason}")]
    InvalidWord { word: String, reason: &'static str },
}

impl LexisError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn log(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Log {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LexisError>;
