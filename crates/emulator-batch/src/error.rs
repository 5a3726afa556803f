//! Batch-level errors.
//!
//! A failing task never surfaces here; it becomes a failed
//! [`SimulationResult`](crate::result::SimulationResult). These errors stop
//! the whole batch before or while it is being set up.

use std::path::PathBuf;

use emulator_common::{ConfigError, VersionError};
use thiserror::Error;

/// Errors that abort a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Request parameters are out of range
    #[error("invalid batch request: {0}")]
    InvalidRequest(String),

    /// The shared input failed validation
    #[error("invalid input: {0}")]
    Config(#[from] ConfigError),

    /// Creating the artifact directory or summary failed
    #[error("failed to write {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serializing an artifact failed
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An artifact was written by an incompatible build
    #[error("cannot read artifact: {0}")]
    Version(#[from] VersionError),

    /// A worker thread could not be started
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),
}

/// Result type alias for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;
