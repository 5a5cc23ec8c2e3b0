//! # Fuel Engine
//!
//! Per-vehicle fuel level estimation.
//!
//! Responsible for:
//! - Scalar Kalman filtering of the tank level
//! - Operating-state driven process noise, quality-scaled measurement noise
//! - ECU counter screening and physics-model cross-validation
//! - Anchor (stability window) detection
//! - Emergency reset, resync and theft hold decisions
//!
//! Everything here is synchronous and performs no I/O; one
//! `VehicleEstimator` is owned by exactly one processing unit.
//!
//! ## Usage
//!
//! ```ignore
//! use fuel_engine::{QualityProviders, VehicleEstimator, VehicleSettings};
//!
//! let settings = VehicleSettings { tank_capacity_liters: 757.0, calibration: None };
//! let mut vehicle = VehicleEstimator::new(
//!     "truck-1".into(),
//!     &settings,
//!     &EstimatorConfig::default(),
//!     QualityProviders::standard(),
//! )?;
//!
//! if let TickOutcome::Estimated(estimate) = vehicle.process(&tick)? {
//!     // hand off to the dispatcher
//! }
//! ```

mod anchor;
mod ecu;
mod error;
mod estimator;
mod history;
mod noise;
mod quality;
mod recovery;
mod vehicle;

pub use anchor::AnchorDetector;
pub use ecu::{EcuConsumptionValidator, EcuUnit, FallbackReason, InvalidReason, Reading, RpmConsistency};
pub use error::{EstimatorError, Result, TickError};
pub use estimator::{
    ConsumptionSource, EstimateSnapshot, FuelLevelEstimator, PredictOutcome, UpdateContext,
    UpdateOutcome,
};
pub use history::BoundedHistory;
pub use noise::{AdaptiveNoiseController, BiasAssessment, MeasurementNoise, SignalQuality};
pub use quality::{
    BatteryVoltageQuality, GpsAssessment, GpsQuality, NeutralGpsQuality, NeutralVoltageQuality,
    QualityProviders, SatelliteGpsQuality, VoltageQuality,
};
pub use recovery::{EmergencyRecoveryPolicy, MotionContext, RecoveryInput};
pub use vehicle::{TickOutcome, VehicleEstimator, VehicleSettings};

// Re-export contracts types
pub use contracts::{EstimatorConfig, FuelEstimate, TelemetryTick};
