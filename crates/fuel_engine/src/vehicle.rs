//! Per-tick orchestration for one vehicle.
//!
//! tick -> noise -> ECU -> predict -> refuel check -> update (+ recovery)
//! -> anchors -> `FuelEstimate`

use contracts::{
    AnchorEvent, CalibrationRecord, EstimatorConfig, FuelEstimate, RecoveryAction,
    TelemetryTick, VehicleId, LITERS_PER_GALLON,
};
use tracing::{debug, instrument, warn};

use crate::anchor::AnchorDetector;
use crate::ecu::{EcuConsumptionValidator, Reading, RpmConsistency};
use crate::error::{EstimatorError, TickError};
use crate::estimator::{FuelLevelEstimator, UpdateContext, UpdateOutcome};
use crate::noise::{AdaptiveNoiseController, SignalQuality};
use crate::quality::QualityProviders;
use crate::recovery::MotionContext;

/// Static per-vehicle settings
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSettings {
    pub tank_capacity_liters: f64,
    pub calibration: Option<CalibrationRecord>,
}

/// Result of processing one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No valid reading has been seen yet
    AwaitingInitialization,
    Estimated(FuelEstimate),
}

impl TickOutcome {
    pub fn estimate(&self) -> Option<&FuelEstimate> {
        match self {
            TickOutcome::Estimated(estimate) => Some(estimate),
            TickOutcome::AwaitingInitialization => None,
        }
    }
}

/// Owns every piece of one vehicle's estimation state
#[derive(Debug)]
pub struct VehicleEstimator {
    vehicle_id: VehicleId,
    filter: FuelLevelEstimator,
    ecu: EcuConsumptionValidator,
    anchors: AnchorDetector,
    refuel_jump_pct: f64,
    refuel_max_speed_mph: f64,
    last_timestamp: Option<f64>,
}

impl VehicleEstimator {
    pub fn new(
        vehicle_id: VehicleId,
        settings: &VehicleSettings,
        config: &EstimatorConfig,
        quality: QualityProviders,
    ) -> Result<Self, EstimatorError> {
        let filter =
            FuelLevelEstimator::with_quality(settings.tank_capacity_liters, config, quality)?;

        Ok(Self {
            vehicle_id,
            filter,
            ecu: EcuConsumptionValidator::new(
                config.ecu.clone(),
                settings.tank_capacity_liters,
                settings.calibration,
            ),
            anchors: AnchorDetector::new(config.anchor.clone()),
            refuel_jump_pct: config.refuel_jump_pct,
            refuel_max_speed_mph: config.refuel_max_speed_mph,
            last_timestamp: None,
        })
    }

    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    pub fn filter(&self) -> &FuelLevelEstimator {
        &self.filter
    }

    pub fn ecu(&self) -> &EcuConsumptionValidator {
        &self.ecu
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Apply one tick
    ///
    /// Ticks must arrive in strictly increasing timestamp order; anything
    /// else is rejected without touching the state.
    #[instrument(
        level = "trace",
        name = "vehicle_process",
        skip(self, tick),
        fields(vehicle_id = %self.vehicle_id, timestamp = tick.timestamp)
    )]
    pub fn process(&mut self, tick: &TelemetryTick) -> Result<TickOutcome, TickError> {
        let timestamp = tick.timestamp;
        if !timestamp.is_finite() {
            return Err(TickError::InvalidTimestamp);
        }
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                debug!(last, "rejecting out-of-order tick");
                return Err(TickError::OutOfOrder { timestamp, last });
            }
        }

        let gap_hours = self
            .last_timestamp
            .map(|last| (timestamp - last) / 3600.0)
            .unwrap_or(0.0);
        let measured = tick.measured_fuel_pct.filter(|m| m.is_finite());

        if !self.filter.is_initialized() {
            let Some(initial) = measured else {
                self.last_timestamp = Some(timestamp);
                return Ok(TickOutcome::AwaitingInitialization);
            };
            self.filter.initialize(initial);
            // prime the counter baseline and altitude tracking
            self.ecu.consumption(timestamp, tick.ecu_total_fuel_used);
            self.ecu
                .model_consumption(tick.engine_load_pct, tick.altitude, timestamp);
            self.last_timestamp = Some(timestamp);
            debug!(level_pct = self.filter.level_pct(), "filter initialized");
            return Ok(TickOutcome::Estimated(self.build_estimate(
                tick,
                None,
                None,
                RecoveryAction::None,
                None,
                false,
            )));
        }

        let state = AdaptiveNoiseController::classify(tick.speed_mph, tick.rpm);
        let signals = SignalQuality {
            gps_satellites: tick.gps_satellites,
            hdop: tick.hdop,
            battery_voltage: tick.battery_voltage,
        };
        self.filter.adapt_noise(state, &signals);

        let ecu_reading = self
            .ecu
            .consumption(timestamp, tick.ecu_total_fuel_used);
        let ecu_lph = ecu_reading.valid();
        let model_lph = self
            .ecu
            .model_consumption(tick.engine_load_pct, tick.altitude, timestamp);
        let validation = match (ecu_lph, model_lph) {
            (Some(ecu), Some(model)) => Some(self.ecu.cross_validate(ecu, model)),
            _ => None,
        };
        if let RpmConsistency::EngineOffConsuming { ecu_lph } =
            self.ecu.rpm_consistency(tick.rpm, ecu_lph)
        {
            warn!(ecu_lph, "ECU reports consumption with engine off");
            metrics::counter!("fuel_rpm_inconsistency_total").increment(1);
        }
        if let Reading::Invalid(reason) = ecu_reading {
            debug!(reason = reason.as_str(), "ECU reading rejected");
        }

        let consumption = ecu_lph.or(model_lph);
        self.filter
            .predict(gap_hours, consumption, tick.speed_mph, tick.rpm)?;
        self.last_timestamp = Some(timestamp);

        if let Some(event) = self.detect_refuel(measured, tick.speed_mph, timestamp) {
            return Ok(TickOutcome::Estimated(self.build_estimate(
                tick,
                Some(event),
                validation,
                RecoveryAction::None,
                None,
                false,
            )));
        }

        let ctx = UpdateContext {
            timestamp,
            gap_hours,
            // without rpm the engine state is unknown; the speed/trip rule decides
            motion: MotionContext {
                state: tick.rpm.filter(|r| r.is_finite()).map(|_| state),
                speed_mph: tick.speed_mph,
                trip_active: tick.trip_active,
            },
        };
        let (recovery, theft_flag, escalation) = match self.filter.update(measured, &ctx) {
            UpdateOutcome::Skipped { escalated, .. } => (RecoveryAction::None, None, escalated),
            UpdateOutcome::Applied {
                recovery,
                theft_flag,
                ..
            } => (recovery, theft_flag, false),
        };

        let anchor = self.anchors.observe(
            timestamp,
            tick.speed_mph,
            tick.rpm,
            measured,
            self.filter.level_pct(),
        );

        Ok(TickOutcome::Estimated(self.build_estimate(
            tick, anchor, validation, recovery, theft_flag, escalation,
        )))
    }

    /// Upward jump over the prediction while stopped
    fn detect_refuel(
        &mut self,
        measured: Option<f64>,
        speed_mph: Option<f64>,
        timestamp: f64,
    ) -> Option<AnchorEvent> {
        let measured = measured?.clamp(0.0, 100.0);
        let speed = speed_mph.filter(|s| s.is_finite()).unwrap_or(0.0);
        let jump_pct = measured - self.filter.level_pct();
        if jump_pct <= self.refuel_jump_pct || speed >= self.refuel_max_speed_mph {
            return None;
        }

        let gallons_added =
            jump_pct * self.filter.capacity_liters() / 100.0 / LITERS_PER_GALLON;
        self.filter
            .apply_refuel_reset(measured, gallons_added, timestamp);
        self.anchors.reset();

        Some(AnchorEvent::Refuel {
            fuel_pct: measured,
            gallons_added,
        })
    }

    fn build_estimate(
        &self,
        tick: &TelemetryTick,
        anchor_event: Option<AnchorEvent>,
        ecu_validation: Option<contracts::ValidationResult>,
        recovery: RecoveryAction,
        theft_flag: Option<contracts::TheftFlag>,
        sensor_escalation: bool,
    ) -> FuelEstimate {
        let snapshot = self.filter.estimate();
        let operating_state = snapshot
            .operating_state
            .unwrap_or_else(|| AdaptiveNoiseController::classify(tick.speed_mph, tick.rpm));

        FuelEstimate {
            vehicle_id: self.vehicle_id.clone(),
            timestamp: tick.timestamp,
            level_liters: snapshot.level_liters,
            level_pct: snapshot.level_pct,
            consumption_lph: snapshot.consumption_lph,
            drift_pct: snapshot.drift_pct,
            drift_warning: snapshot.drift_warning,
            kalman_gain: snapshot.kalman_gain,
            covariance: snapshot.covariance,
            confidence: snapshot.confidence,
            bias_detected: snapshot.bias_detected,
            bias_magnitude_pct: snapshot.bias_magnitude_pct,
            sensor_quality_factor: snapshot.sensor_quality_factor,
            gps_quality: snapshot.gps_quality,
            operating_state,
            anchor_event,
            theft_flag,
            ecu_validation,
            recovery,
            sensor_escalation,
        }
    }
}
