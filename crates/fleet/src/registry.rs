//! FleetRegistry - explicit owner of every running vehicle unit
//!
//! Routes ticks to the unit for their vehicle, spawning it on first sight.
//! Ticks for one vehicle are processed strictly in arrival order; distinct
//! vehicles run concurrently on their own tasks.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{TelemetryTick, VehicleId};
use fuel_engine::VehicleEstimator;
use tracing::{debug, info, instrument, warn};

use crate::context::FleetContext;
use crate::error::{FleetError, Result};
use crate::unit::{UnitSnapshot, VehicleUnit};

pub struct FleetRegistry {
    context: Arc<FleetContext>,
    units: HashMap<VehicleId, VehicleUnit>,
    rejected_unknown: u64,
}

impl FleetRegistry {
    pub fn new(context: Arc<FleetContext>) -> Self {
        Self {
            context,
            units: HashMap::new(),
            rejected_unknown: 0,
        }
    }

    pub fn context(&self) -> &Arc<FleetContext> {
        &self.context
    }

    /// Route a tick to its vehicle unit
    ///
    /// Waits for mailbox space rather than dropping, so per-vehicle order holds.
    #[instrument(
        level = "trace",
        name = "fleet_route",
        skip(self, tick),
        fields(vehicle_id = %tick.vehicle_id, timestamp = tick.timestamp)
    )]
    pub async fn route(&mut self, tick: TelemetryTick) -> Result<()> {
        if !self.units.contains_key(&tick.vehicle_id) {
            let unit = self.spawn_unit(&tick.vehicle_id)?;
            self.units.insert(tick.vehicle_id.clone(), unit);
        }

        let vehicle_id = tick.vehicle_id.clone();
        let delivered = match self.units.get(&vehicle_id) {
            Some(unit) => unit.send(tick).await,
            None => false,
        };

        if !delivered {
            self.units.remove(&vehicle_id);
            return Err(FleetError::unit_closed(vehicle_id.as_ref()));
        }
        Ok(())
    }

    fn spawn_unit(&mut self, vehicle_id: &VehicleId) -> Result<VehicleUnit> {
        let Some(settings) = self.context.settings_for(vehicle_id) else {
            self.rejected_unknown += 1;
            metrics::counter!("fuel_unknown_vehicle_ticks_total").increment(1);
            return Err(FleetError::unknown_vehicle(vehicle_id.as_ref()));
        };

        let estimator = VehicleEstimator::new(
            vehicle_id.clone(),
            &settings,
            &self.context.estimator,
            self.context.quality.clone(),
        )
        .map_err(|source| FleetError::UnitStart {
            vehicle_id: vehicle_id.to_string(),
            source,
        })?;

        info!(
            vehicle_id = %vehicle_id,
            tank_capacity_liters = settings.tank_capacity_liters,
            calibrated = settings.calibration.is_some(),
            "Vehicle unit started"
        );
        metrics::gauge!("fuel_active_vehicles").increment(1.0);

        Ok(VehicleUnit::spawn(
            estimator,
            self.context.runtime.mailbox_capacity,
            self.context.output.clone(),
        ))
    }

    /// Whether the vehicle has routed a tick at or after `since` (tick time)
    pub fn is_active(&self, vehicle_id: &str, since: f64) -> bool {
        self.units
            .get(vehicle_id)
            .is_some_and(|unit| unit.last_seen() >= since)
    }

    pub fn active_vehicles(&self) -> Vec<VehicleId> {
        let mut ids: Vec<_> = self.units.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        ids
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn rejected_unknown(&self) -> u64 {
        self.rejected_unknown
    }

    pub fn unit_stats(&self, vehicle_id: &str) -> Option<UnitSnapshot> {
        self.units.get(vehicle_id).map(|u| u.stats().snapshot())
    }

    /// Stop a vehicle's unit after draining its mailbox
    ///
    /// A later tick for the same vehicle starts a fresh estimator.
    pub async fn evict(&mut self, vehicle_id: &str) -> bool {
        match self.units.remove(vehicle_id) {
            Some(unit) => {
                unit.shutdown().await;
                metrics::gauge!("fuel_active_vehicles").decrement(1.0);
                debug!(vehicle_id, "Vehicle unit evicted");
                true
            }
            None => false,
        }
    }

    /// Evict every unit whose last tick is older than `since`
    pub async fn evict_inactive(&mut self, since: f64) -> Vec<VehicleId> {
        let stale: Vec<VehicleId> = self
            .units
            .iter()
            .filter(|(_, unit)| unit.last_seen() < since)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.evict(id).await;
        }
        if !stale.is_empty() {
            info!(count = stale.len(), since, "Evicted inactive vehicles");
        }
        stale
    }

    /// Shut down every unit; returns final per-vehicle counters
    pub async fn shutdown(self) -> HashMap<VehicleId, UnitSnapshot> {
        let mut summary = HashMap::with_capacity(self.units.len());
        for (id, unit) in self.units {
            let stats = Arc::clone(unit.stats());
            unit.shutdown().await;
            metrics::gauge!("fuel_active_vehicles").decrement(1.0);
            summary.insert(id, stats.snapshot());
        }
        if self.rejected_unknown > 0 {
            warn!(
                count = self.rejected_unknown,
                "Ticks rejected for unknown vehicles"
            );
        }
        summary
    }
}
