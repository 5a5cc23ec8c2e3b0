//! Sensor quality capabilities feeding measurement noise.
//!
//! Providers are chosen once when a vehicle unit is built. The neutral
//! providers return a factor of 1.0 so the noise controller works with
//! zero, one or both signals present.

use std::fmt;
use std::sync::Arc;

use contracts::GpsQualityLevel;

/// GPS quality assessment for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsAssessment {
    pub level: Option<GpsQualityLevel>,
    /// Multiplier on measurement noise (>= 1.0)
    pub factor: f64,
}

impl GpsAssessment {
    pub const NEUTRAL: GpsAssessment = GpsAssessment {
        level: None,
        factor: 1.0,
    };
}

/// GPS quality capability
pub trait GpsQuality: Send + Sync + fmt::Debug {
    fn assess(&self, satellites: Option<u32>, hdop: Option<f64>) -> GpsAssessment;
}

/// Electrical quality capability
pub trait VoltageQuality: Send + Sync + fmt::Debug {
    /// Multiplier on measurement noise (>= 1.0)
    fn factor(&self, battery_voltage: Option<f64>) -> f64;
}

/// Always neutral GPS provider
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralGpsQuality;

impl GpsQuality for NeutralGpsQuality {
    fn assess(&self, _satellites: Option<u32>, _hdop: Option<f64>) -> GpsAssessment {
        GpsAssessment::NEUTRAL
    }
}

/// Always neutral voltage provider
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralVoltageQuality;

impl VoltageQuality for NeutralVoltageQuality {
    fn factor(&self, _battery_voltage: Option<f64>) -> f64 {
        1.0
    }
}

/// Grades the fix from satellite count and HDOP
///
/// | level     | condition                          | factor |
/// |-----------|------------------------------------|--------|
/// | Excellent | >= 8 satellites, HDOP <= 1.0       | 1.0    |
/// | Good      | >= 6 satellites, HDOP <= 2.0       | 1.3    |
/// | Poor      | >= 4 satellites                    | 2.0    |
/// | NoFix     | fewer than 4 satellites            | 3.0    |
///
/// A missing HDOP is graded on satellites alone. A missing satellite
/// count is neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct SatelliteGpsQuality;

impl SatelliteGpsQuality {
    pub fn level(satellites: u32, hdop: Option<f64>) -> GpsQualityLevel {
        let hdop = hdop.filter(|h| h.is_finite() && *h >= 0.0);
        let hdop_within = |limit: f64| hdop.map_or(true, |h| h <= limit);

        if satellites < 4 {
            GpsQualityLevel::NoFix
        } else if satellites >= 8 && hdop_within(1.0) {
            GpsQualityLevel::Excellent
        } else if satellites >= 6 && hdop_within(2.0) {
            GpsQualityLevel::Good
        } else {
            GpsQualityLevel::Poor
        }
    }

    pub fn factor_for(level: GpsQualityLevel) -> f64 {
        match level {
            GpsQualityLevel::Excellent => 1.0,
            GpsQualityLevel::Good => 1.3,
            GpsQualityLevel::Poor => 2.0,
            GpsQualityLevel::NoFix => 3.0,
        }
    }
}

impl GpsQuality for SatelliteGpsQuality {
    fn assess(&self, satellites: Option<u32>, hdop: Option<f64>) -> GpsAssessment {
        match satellites {
            Some(sats) => {
                let level = Self::level(sats, hdop);
                GpsAssessment {
                    level: Some(level),
                    factor: Self::factor_for(level),
                }
            }
            None => GpsAssessment::NEUTRAL,
        }
    }
}

/// Grades supply voltage of a 12 V system
#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryVoltageQuality;

impl VoltageQuality for BatteryVoltageQuality {
    fn factor(&self, battery_voltage: Option<f64>) -> f64 {
        match battery_voltage.filter(|v| v.is_finite()) {
            None => 1.0,
            Some(v) if (12.4..=14.8).contains(&v) => 1.0,
            Some(v) if (11.8..=15.5).contains(&v) => 1.5,
            Some(_) => 3.0,
        }
    }
}

/// Quality providers injected into a vehicle's noise controller
#[derive(Debug, Clone)]
pub struct QualityProviders {
    pub gps: Arc<dyn GpsQuality>,
    pub voltage: Arc<dyn VoltageQuality>,
}

impl QualityProviders {
    /// Neutral providers: measurement noise ignores GPS and voltage
    pub fn neutral() -> Self {
        Self {
            gps: Arc::new(NeutralGpsQuality),
            voltage: Arc::new(NeutralVoltageQuality),
        }
    }

    /// Built-in satellite and battery graders
    pub fn standard() -> Self {
        Self {
            gps: Arc::new(SatelliteGpsQuality),
            voltage: Arc::new(BatteryVoltageQuality),
        }
    }
}

impl Default for QualityProviders {
    fn default() -> Self {
        Self::neutral()
    }
}
