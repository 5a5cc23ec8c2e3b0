//! Fleet runtime error types

use fuel_engine::EstimatorError;
use thiserror::Error;

/// Fleet-specific error
#[derive(Debug, Error)]
pub enum FleetError {
    /// Tick for a vehicle missing from the blueprint
    #[error("unknown vehicle '{vehicle_id}'")]
    UnknownVehicle { vehicle_id: String },

    /// Vehicle unit could not be built
    #[error("failed to start unit for vehicle '{vehicle_id}': {source}")]
    UnitStart {
        vehicle_id: String,
        #[source]
        source: EstimatorError,
    },

    /// Vehicle unit mailbox closed
    #[error("unit for vehicle '{vehicle_id}' is no longer running")]
    UnitClosed { vehicle_id: String },
}

impl FleetError {
    /// Create unknown vehicle error
    pub fn unknown_vehicle(vehicle_id: impl Into<String>) -> Self {
        Self::UnknownVehicle {
            vehicle_id: vehicle_id.into(),
        }
    }

    /// Create unit closed error
    pub fn unit_closed(vehicle_id: impl Into<String>) -> Self {
        Self::UnitClosed {
            vehicle_id: vehicle_id.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, FleetError>;
