//! Fleet - per-vehicle estimator runtime
//!
//! Every vehicle gets a single-writer unit: a tokio task that owns its
//! `VehicleEstimator` and drains a bounded mailbox. The `FleetRegistry`
//! routes ticks, spawns units lazily, and exposes activity/eviction hooks
//! for whoever manages vehicle lifetimes.

mod context;
mod error;
mod registry;
mod unit;

pub use context::FleetContext;
pub use error::{FleetError, Result};
pub use registry::FleetRegistry;
pub use unit::{UnitSnapshot, UnitStats, VehicleUnit};
