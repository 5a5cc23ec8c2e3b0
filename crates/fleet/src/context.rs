//! FleetContext - shared infrastructure for every vehicle unit
//!
//! Built once from the blueprint and passed around by `Arc`.

use std::collections::HashMap;

use contracts::{EstimatorConfig, FleetBlueprint, FuelEstimate, RuntimeConfig, VehicleId};
use fuel_engine::{QualityProviders, VehicleSettings};
use tokio::sync::mpsc;

/// Read-only fleet configuration plus the estimate output channel
#[derive(Debug)]
pub struct FleetContext {
    pub estimator: EstimatorConfig,
    pub runtime: RuntimeConfig,
    pub vehicles: HashMap<VehicleId, VehicleSettings>,
    pub quality: QualityProviders,
    pub output: mpsc::Sender<FuelEstimate>,
}

impl FleetContext {
    pub fn from_blueprint(
        blueprint: &FleetBlueprint,
        quality: QualityProviders,
        output: mpsc::Sender<FuelEstimate>,
    ) -> Self {
        let vehicles = blueprint
            .vehicles
            .iter()
            .map(|v| {
                (
                    v.id.clone(),
                    VehicleSettings {
                        tank_capacity_liters: v.tank_capacity_liters,
                        calibration: v.calibration,
                    },
                )
            })
            .collect();

        Self {
            estimator: blueprint.estimator.clone(),
            runtime: blueprint.runtime.clone(),
            vehicles,
            quality,
            output,
        }
    }

    /// Settings for a vehicle, falling back to the runtime default when
    /// unknown vehicles are allowed
    pub fn settings_for(&self, vehicle_id: &str) -> Option<VehicleSettings> {
        match self.vehicles.get(vehicle_id) {
            Some(settings) => Some(settings.clone()),
            None if self.runtime.allow_unknown_vehicles => Some(VehicleSettings {
                tank_capacity_liters: self.runtime.default_tank_capacity_liters,
                calibration: None,
            }),
            None => None,
        }
    }
}
