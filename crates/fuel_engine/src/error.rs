//! Engine error types

use thiserror::Error;

/// Fatal configuration or caller errors of the filter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    #[error("tank capacity must be positive and finite, got {capacity}")]
    InvalidCapacity { capacity: f64 },

    #[error("prediction interval must be finite and non-negative, got {dt_hours} h")]
    InvalidInterval { dt_hours: f64 },
}

/// Per-tick rejection; the vehicle state is left untouched
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error("tick at {timestamp} is not after last accepted tick at {last}")]
    OutOfOrder { timestamp: f64, last: f64 },

    #[error("tick timestamp is not finite")]
    InvalidTimestamp,

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
