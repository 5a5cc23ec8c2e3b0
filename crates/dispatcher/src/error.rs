//! Dispatcher error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink params missing or malformed
    #[error("sink '{name}' has invalid parameters: {message}")]
    InvalidParams { name: String, message: String },

    /// Output could not be opened
    #[error("sink '{name}' cannot open {}: {source}", path.display())]
    SinkOpen {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DispatcherError {
    pub fn invalid_params(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            name: name.into(),
            message: message.into(),
        }
    }
}
