//! # Dispatcher
//!
//! Estimate fan-out.
//!
//! Responsibilities:
//! - Consume `FuelEstimate`s from the fleet output channel
//! - Fan out to every configured sink
//! - Isolate slow sinks so they never stall estimation

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, FuelEstimate};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig, create_dispatcher};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink};

#[cfg(test)]
pub(crate) mod test_support {
    use contracts::{
        Confidence, FuelEstimate, OperatingState, RecoveryAction, VehicleId,
    };

    pub fn estimate(vehicle_id: &str, timestamp: f64) -> FuelEstimate {
        FuelEstimate {
            vehicle_id: VehicleId::from(vehicle_id),
            timestamp,
            level_liters: 378.5,
            level_pct: 50.0,
            consumption_lph: 12.0,
            drift_pct: 0.4,
            drift_warning: false,
            kalman_gain: 0.2,
            covariance: 0.8,
            confidence: Confidence::from_covariance(0.8),
            bias_detected: false,
            bias_magnitude_pct: 0.0,
            sensor_quality_factor: 1.0,
            gps_quality: None,
            operating_state: OperatingState::Moving,
            anchor_event: None,
            theft_flag: None,
            ecu_validation: None,
            recovery: RecoveryAction::None,
            sensor_escalation: false,
        }
    }
}
