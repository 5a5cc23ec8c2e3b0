//! FleetBlueprint - Config Loader output
//!
//! Describes the complete fleet configuration: vehicles, estimator tuning,
//! runtime limits and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{CalibrationRecord, EstimatorConfig, VehicleId};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete fleet configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FleetBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Fleet settings
    #[validate(nested)]
    pub fleet: FleetConfig,

    /// Vehicle definitions
    #[validate(nested)]
    pub vehicles: Vec<VehicleConfig>,

    /// Estimator tuning shared by every vehicle
    #[serde(default)]
    #[validate(nested)]
    pub estimator: EstimatorConfig,

    /// Runtime limits
    #[serde(default)]
    #[validate(nested)]
    pub runtime: RuntimeConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Fleet-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FleetConfig {
    /// Fleet name (used in logs)
    #[validate(length(min = 1))]
    pub name: String,
}

/// Vehicle configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleConfig {
    /// Unique identifier
    pub id: VehicleId,

    /// Usable tank capacity (liters), must be > 0
    #[validate(range(exclusive_min = 0.0))]
    pub tank_capacity_liters: f64,

    /// Physics model coefficients (optional)
    #[serde(default)]
    #[validate(nested)]
    pub calibration: Option<CalibrationRecord>,
}

/// Runtime limits for the fleet registry and its vehicle units
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Per-vehicle mailbox capacity
    #[validate(range(min = 1))]
    pub mailbox_capacity: usize,

    /// Capacity of the estimate output channel
    #[validate(range(min = 1))]
    pub output_capacity: usize,

    /// Vehicles idle longer than this are evicted (seconds, 0 disables)
    #[validate(range(min = 0.0))]
    pub inactivity_timeout_s: f64,

    /// Prometheus exporter port (0 disables)
    pub metrics_port: u16,

    /// Spawn units for vehicles missing from `vehicles`
    pub allow_unknown_vehicles: bool,

    /// Tank capacity assumed for unknown vehicles (liters)
    #[validate(range(exclusive_min = 0.0))]
    pub default_tank_capacity_liters: f64,

    /// Ingestion backpressure policy
    pub drop_policy: DropPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            output_capacity: 1024,
            inactivity_timeout_s: 0.0,
            metrics_port: 0,
            allow_unknown_vehicles: false,
            default_tank_capacity_liters: 757.0,
            drop_policy: DropPolicy::default(),
        }
    }
}

/// Drop policy (when backpressure is full)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Wait for capacity; ticks are never lost
    #[default]
    Block,
    /// Drop the incoming tick
    DropNewest,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON-lines file output
    File,
}

impl FleetBlueprint {
    /// Find a vehicle definition by id
    pub fn vehicle(&self, id: &str) -> Option<&VehicleConfig> {
        self.vehicles.iter().find(|v| v.id == id)
    }
}
