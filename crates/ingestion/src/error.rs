//! Ingestion error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// Replay file could not be opened
    #[error("failed to open replay file {path}: {source}")]
    ReplayOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A replay line is not a valid tick
    #[error("line {line}: {message}")]
    ParseFailed { line: usize, message: String },

    /// Scenario name not recognized
    #[error("unknown scenario '{name}' (expected one of: {expected})")]
    UnknownScenario { name: String, expected: String },

    /// Source registered twice
    #[error("source {source_id} is already registered")]
    DuplicateSource { source_id: String },
}

pub type Result<T> = std::result::Result<T, IngestionError>;
