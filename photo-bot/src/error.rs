//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Required setting absent or malformed. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index unavailable: {} has not been built yet", path.display())]
    IndexUnavailable { path: PathBuf },

    #[error("No eligible files in the index")]
    NoEligibleFiles,

    #[error("No suitable file found in {}", dir.display())]
    NoSuitableFile { dir: PathBuf },

    #[error("Too deep recursion {depth} for {}", dir.display())]
    RecursionTooDeep { depth: usize, dir: PathBuf },

    #[error("Failed to walk {}: {source}", root.display())]
    WalkFailed {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to persist index to {}: {source}", path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    TransportFailed(String),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("IO error while {op} {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportFailed(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error means "nothing to pick right now" rather than a fault.
    pub fn is_selection_miss(&self) -> bool {
        matches!(
            self,
            Self::IndexUnavailable { .. }
                | Self::NoEligibleFiles
                | Self::NoSuitableFile { .. }
                | Self::RecursionTooDeep { .. }
        )
    }
}
