//! Estimator configuration contracts shared by the engine, the fleet
//! runtime and the config loader.
//!
//! Every struct carries `#[serde(default)]` so a blueprint only needs to
//! name the values it overrides.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Complete tuning for one vehicle's estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EstimatorConfig {
    #[validate(nested)]
    pub noise: NoiseConfig,

    #[validate(nested)]
    pub kalman: KalmanConfig,

    #[validate(nested)]
    pub ecu: EcuConfig,

    #[validate(nested)]
    pub recovery: RecoveryConfig,

    #[validate(nested)]
    pub anchor: AnchorConfig,

    /// |drift| above this raises `drift_warning` (percent)
    #[validate(range(min = 0.0, max = 100.0))]
    pub drift_warning_pct: f64,

    /// Upward jump over the prediction treated as a refuel (percent)
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub refuel_jump_pct: f64,

    /// Speed below which a refuel jump is accepted (mph)
    #[validate(range(min = 0.0))]
    pub refuel_max_speed_mph: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            noise: NoiseConfig::default(),
            kalman: KalmanConfig::default(),
            ecu: EcuConfig::default(),
            recovery: RecoveryConfig::default(),
            anchor: AnchorConfig::default(),
            drift_warning_pct: 5.0,
            refuel_jump_pct: 10.0,
            refuel_max_speed_mph: 5.0,
        }
    }
}

/// Process and measurement noise tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NoiseConfig {
    #[validate(range(exclusive_min = 0.0))]
    pub q_r_parked: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub q_r_stopped: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub q_r_idle: f64,

    /// Added per 100 L/h of consumption while idling
    #[validate(range(min = 0.0))]
    pub q_r_idle_per_100_lph: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub q_r_moving: f64,

    /// Added per 50 L/h of consumption while moving
    #[validate(range(min = 0.0))]
    pub q_r_moving_per_50_lph: f64,

    /// Base measurement noise while moving (slosh)
    #[validate(range(exclusive_min = 0.0))]
    pub q_l_moving: f64,

    /// Base measurement noise while stationary
    #[validate(range(exclusive_min = 0.0))]
    pub q_l_static: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub q_l_min: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub q_l_max: f64,

    /// R multiplier applied while a persistent bias is detected
    #[validate(range(min = 1.0))]
    pub bias_multiplier: f64,

    /// Innovations needed before bias can be assessed
    #[validate(range(min = 2, max = 64))]
    pub bias_window: usize,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            q_r_parked: 0.005,
            q_r_stopped: 0.02,
            q_r_idle: 0.02,
            q_r_idle_per_100_lph: 0.01,
            q_r_moving: 0.03,
            q_r_moving_per_50_lph: 0.05,
            q_l_moving: 4.0,
            q_l_static: 1.0,
            q_l_min: 0.5,
            q_l_max: 20.0,
            bias_multiplier: 2.5,
            bias_window: 4,
        }
    }
}

/// Filter gain, gap and fallback-consumption tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct KalmanConfig {
    #[validate(range(exclusive_min = 0.0))]
    pub initial_covariance: f64,

    /// Intervals longer than this skip consumption (hours)
    #[validate(range(exclusive_min = 0.0))]
    pub long_gap_hours: f64,

    /// Covariance inflation multiplier over a long gap
    #[validate(range(min = 1.0))]
    pub gap_inflation: f64,

    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub gain_cap_high: f64,

    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub gain_cap_mid: f64,

    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub gain_cap_low: f64,

    /// `P` above which `gain_cap_high` applies
    #[validate(range(min = 0.0))]
    pub high_covariance: f64,

    /// `P` above which `gain_cap_mid` applies
    #[validate(range(min = 0.0))]
    pub mid_covariance: f64,

    /// Innovation threshold in sigmas for the gain boost
    #[validate(range(exclusive_min = 0.0))]
    pub boost_sigmas: f64,

    #[validate(range(min = 1.0))]
    pub boost_factor: f64,

    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub boost_cap: f64,

    /// Consecutive invalid readings that raise the escalation signal
    #[validate(range(min = 1))]
    pub skip_escalation: u32,

    /// Fallback consumption while stopped (L/h)
    #[validate(range(min = 0.0))]
    pub stopped_fallback_lph: f64,

    /// Fallback consumption while moving (L/h)
    #[validate(range(min = 0.0))]
    pub moving_fallback_lph: f64,

    /// Speed separating the two fallbacks (mph)
    #[validate(range(min = 0.0))]
    pub fallback_speed_mph: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            initial_covariance: 1.0,
            long_gap_hours: 1.0,
            gap_inflation: 5.0,
            gain_cap_high: 0.5,
            gain_cap_mid: 0.35,
            gain_cap_low: 0.2,
            high_covariance: 5.0,
            mid_covariance: 2.0,
            boost_sigmas: 3.0,
            boost_factor: 1.5,
            boost_cap: 0.7,
            skip_escalation: 10,
            stopped_fallback_lph: 2.0,
            moving_fallback_lph: 15.0,
            fallback_speed_mph: 5.0,
        }
    }
}

/// ECU counter handling and cross-validation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EcuConfig {
    /// Counters above this on first sight are taken as liters
    #[validate(range(exclusive_min = 0.0))]
    pub liters_detection_threshold: f64,

    /// Rates above this are rejected (gal/h)
    #[validate(range(exclusive_min = 0.0))]
    pub max_rate_gph: f64,

    /// Consecutive failures before the ECU is marked degraded
    #[validate(range(min = 1))]
    pub failure_threshold: u32,

    /// Time spent degraded before a re-attempt (seconds)
    #[validate(range(min = 0.0))]
    pub degraded_retry_s: f64,

    /// ECU consumption above this at rpm 0 is an inconsistency (L/h)
    #[validate(range(min = 0.0))]
    pub rpm_off_tolerance_lph: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub warning_deviation_pct: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub critical_deviation_pct: f64,

    /// Apply biodiesel density correction to ECU consumption
    pub biodiesel_density_correction: bool,

    #[validate(range(min = 0.0, max = 100.0))]
    pub biodiesel_blend_pct: f64,
}

impl Default for EcuConfig {
    fn default() -> Self {
        Self {
            liters_detection_threshold: 300_000.0,
            max_rate_gph: 50.0,
            failure_threshold: 5,
            degraded_retry_s: 600.0,
            rpm_off_tolerance_lph: 0.5,
            warning_deviation_pct: 15.0,
            critical_deviation_pct: 30.0,
            biodiesel_density_correction: false,
            biodiesel_blend_pct: 0.0,
        }
    }
}

/// Emergency reset, resync and theft-hold thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RecoveryConfig {
    #[validate(range(exclusive_min = 0.0))]
    pub emergency_gap_hours: f64,

    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub emergency_drift_pct: f64,

    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub resync_drift_pct: f64,

    /// Resync threshold shortly after a refuel
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub refuel_resync_drift_pct: f64,

    #[validate(range(min = 0.0))]
    pub refuel_grace_s: f64,

    #[validate(range(min = 0.0))]
    pub cooldown_s: f64,

    /// Legacy stationary rule when no operating state is known (mph)
    #[validate(range(min = 0.0))]
    pub stationary_speed_mph: f64,

    #[validate(range(min = 1, max = 1000))]
    pub theft_history: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            emergency_gap_hours: 2.0,
            emergency_drift_pct: 30.0,
            resync_drift_pct: 15.0,
            refuel_resync_drift_pct: 30.0,
            refuel_grace_s: 3600.0,
            cooldown_s: 1800.0,
            stationary_speed_mph: 3.0,
            theft_history: 10,
        }
    }
}

/// Stability window detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AnchorConfig {
    #[validate(range(min = 0.0))]
    pub static_max_speed_mph: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub static_min_duration_s: f64,

    #[validate(range(min = 0.0))]
    pub static_max_spread_pct: f64,

    #[validate(range(min = 2, max = 10000))]
    pub static_capacity: usize,

    #[validate(range(min = 0.0))]
    pub micro_min_speed_mph: f64,

    /// Allowed deviation from the window mean speed (mph)
    #[validate(range(exclusive_min = 0.0))]
    pub micro_speed_band_mph: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub micro_min_duration_s: f64,

    #[validate(range(min = 0.0))]
    pub micro_max_speed_std: f64,

    #[validate(range(min = 0.0))]
    pub micro_max_spread_pct: f64,

    #[validate(range(min = 2, max = 10000))]
    pub micro_capacity: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            static_max_speed_mph: 1.0,
            static_min_duration_s: 300.0,
            static_max_spread_pct: 1.5,
            static_capacity: 120,
            micro_min_speed_mph: 25.0,
            micro_speed_band_mph: 5.0,
            micro_min_duration_s: 180.0,
            micro_max_speed_std: 3.0,
            micro_max_spread_pct: 2.0,
            micro_capacity: 25,
        }
    }
}

/// Per-vehicle physics model coefficients
///
/// `rate (%/min) = baseline + load_factor * engine_load_pct
///                + altitude_factor * climb_rate (m/min)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct CalibrationRecord {
    #[validate(range(min = 0.0))]
    pub baseline_consumption: f64,

    #[validate(range(min = 0.0))]
    pub load_factor: f64,

    pub altitude_factor: f64,
}

impl Default for CalibrationRecord {
    fn default() -> Self {
        Self {
            baseline_consumption: 0.015,
            load_factor: 0.0008,
            altitude_factor: 0.0004,
        }
    }
}
