//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the fuel estimation
//! workspace. Business crates depend only on this crate; reverse
//! dependencies are prohibited.
//!
//! ## Time Model
//! - Telemetry timestamps are Unix epoch seconds (`f64`)
//! - Filter intervals are expressed in hours (`dt_hours`), as the
//!   consumption model works in liters per hour

mod blueprint;
mod error;
mod estimate;
mod estimator_config;
mod sink;
mod telemetry;
mod telemetry_source;
mod vehicle_id;

pub use blueprint::*;
pub use error::*;
pub use estimate::*;
pub use estimator_config::*;
pub use sink::*;
pub use telemetry::*;
pub use telemetry_source::{TelemetryCallback, TelemetrySource};
pub use vehicle_id::VehicleId;

/// Liters per US gallon.
pub const LITERS_PER_GALLON: f64 = 3.78541;
