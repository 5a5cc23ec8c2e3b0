//! TelemetryTick - Ingestion output
//!
//! One polled telemetry record per vehicle. Every measurement is optional:
//! each consumer applies its own documented fallback when a field is absent.

use serde::{Deserialize, Serialize};

use crate::VehicleId;

/// Polled telemetry record for a single vehicle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryTick {
    /// Vehicle the record belongs to
    pub vehicle_id: VehicleId,

    /// Unix epoch seconds
    pub timestamp: f64,

    /// Capacitive fuel-level sensor reading (percent of tank)
    #[serde(default)]
    pub measured_fuel_pct: Option<f64>,

    /// Ground speed (mph)
    #[serde(default)]
    pub speed_mph: Option<f64>,

    /// Engine speed (rpm); `Some(0.0)` means engine off
    #[serde(default)]
    pub rpm: Option<f64>,

    /// ECU cumulative fuel counter (liters or gallons, auto-detected)
    #[serde(default)]
    pub ecu_total_fuel_used: Option<f64>,

    /// Satellites in view
    #[serde(default)]
    pub gps_satellites: Option<u32>,

    /// Battery / supply voltage (V)
    #[serde(default)]
    pub battery_voltage: Option<f64>,

    /// Altitude (m)
    #[serde(default)]
    pub altitude: Option<f64>,

    /// Horizontal dilution of precision
    #[serde(default)]
    pub hdop: Option<f64>,

    /// Engine load (percent)
    #[serde(default)]
    pub engine_load_pct: Option<f64>,

    /// Whether the telematics unit reports an active trip
    #[serde(default)]
    pub trip_active: Option<bool>,
}

impl TelemetryTick {
    /// Create a tick with only the identifying fields set
    pub fn new(vehicle_id: impl Into<VehicleId>, timestamp: f64) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            ..Default::default()
        }
    }
}
