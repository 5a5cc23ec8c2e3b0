//! Errors shared across crate boundaries
//!
//! Config loading and sink writes report through [`ContractError`]; each
//! crate keeps its own error type for everything else.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    /// Blueprint text could not be parsed
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// File extension is not a known config format
    #[error("unsupported config format '{extension}' (expected .toml or .json)")]
    UnsupportedFormat { extension: String },

    /// Blueprint parsed but a value is out of range or inconsistent
    #[error("invalid config at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("failed to serialize config as {format}: {message}")]
    ConfigSerialize {
        format: &'static str,
        message: String,
    },

    /// A sink failed to persist an estimate
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Parse error that keeps the parser's own error as the source
    pub fn config_parse_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn config_serialize(format: &'static str, message: impl Into<String>) -> Self {
        Self::ConfigSerialize {
            format,
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
