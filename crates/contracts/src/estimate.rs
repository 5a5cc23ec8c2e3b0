//! FuelEstimate - Engine output
//!
//! Per-tick estimate handed to the dispatcher, plus the event and
//! diagnostic types it carries.

use serde::{Deserialize, Serialize};

use crate::VehicleId;

/// Operating state classified from speed and rpm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingState {
    /// Not moving, engine off
    Parked,
    /// Not moving, engine running
    Idle,
    /// Not moving or creeping, engine state unknown
    Stopped,
    /// Driving
    Moving,
}

impl OperatingState {
    /// Whether the vehicle is parked or idling in place
    ///
    /// `Stopped` covers creeping traffic and unknown engine state, so it
    /// does not count.
    pub fn is_stationary(self) -> bool {
        matches!(self, OperatingState::Parked | OperatingState::Idle)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperatingState::Parked => "parked",
            OperatingState::Idle => "idle",
            OperatingState::Stopped => "stopped",
            OperatingState::Moving => "moving",
        }
    }
}

/// GPS fix quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsQualityLevel {
    Excellent,
    Good,
    Poor,
    NoFix,
}

/// Qualitative confidence derived from the filter covariance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    /// Map covariance `P` to a label
    pub fn from_covariance(p: f64) -> Self {
        if p < 0.5 {
            ConfidenceLevel::High
        } else if p < 2.0 {
            ConfidenceLevel::Medium
        } else if p < 5.0 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

/// Confidence label plus numeric score in (0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    pub score: f64,
}

impl Confidence {
    pub fn from_covariance(p: f64) -> Self {
        let p = p.max(0.0);
        Self {
            level: ConfidenceLevel::from_covariance(p),
            score: 1.0 / (1.0 + p),
        }
    }
}

/// Calibration event emitted when a stable window completes, or on refuel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorEvent {
    /// Stopped with engine idling
    Static {
        fuel_pct: f64,
        duration_s: f64,
        drift_pct: f64,
    },
    /// Steady cruise
    Micro {
        fuel_pct: f64,
        duration_s: f64,
        speed_mean: f64,
        drift_pct: f64,
    },
    /// Level jump while stopped
    Refuel { fuel_pct: f64, gallons_added: f64 },
}

impl AnchorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AnchorEvent::Static { .. } => "static",
            AnchorEvent::Micro { .. } => "micro",
            AnchorEvent::Refuel { .. } => "refuel",
        }
    }
}

/// Suspected theft record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TheftFlag {
    pub timestamp: f64,
    pub drift_pct: f64,
    pub sensor_pct: f64,
    pub estimated_pct: f64,
    pub estimated_gallons_lost: f64,
}

/// Outcome of ECU vs. physics-model cross-validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Critical,
    NoCalibration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ecu_lph: f64,
    pub model_lph: f64,
    pub deviation_pct: f64,
    pub status: ValidationStatus,
}

/// Decision taken by the recovery policy on an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    #[default]
    None,
    Resync,
    EmergencyReset,
    TheftHold,
    CooldownActive,
}

impl RecoveryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryAction::None => "none",
            RecoveryAction::Resync => "resync",
            RecoveryAction::EmergencyReset => "emergency_reset",
            RecoveryAction::TheftHold => "theft_hold",
            RecoveryAction::CooldownActive => "cooldown_active",
        }
    }
}

/// Per-tick fuel estimate, keyed by `(vehicle_id, timestamp)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelEstimate {
    pub vehicle_id: VehicleId,
    pub timestamp: f64,

    pub level_liters: f64,
    pub level_pct: f64,
    pub consumption_lph: f64,
    pub drift_pct: f64,
    pub drift_warning: bool,
    pub kalman_gain: f64,
    pub covariance: f64,
    pub confidence: Confidence,
    pub bias_detected: bool,
    pub bias_magnitude_pct: f64,

    /// Combined GPS and voltage factor applied to measurement noise
    pub sensor_quality_factor: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_quality: Option<GpsQualityLevel>,

    pub operating_state: OperatingState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_event: Option<AnchorEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theft_flag: Option<TheftFlag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecu_validation: Option<ValidationResult>,

    #[serde(default)]
    pub recovery: RecoveryAction,

    /// Set on the tick where consecutive invalid readings reached the
    /// escalation threshold
    #[serde(default)]
    pub sensor_escalation: bool,
}
