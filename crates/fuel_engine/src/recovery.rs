//! Emergency recovery and theft protection.
//!
//! Decides on every applied update whether the filter should be hard reset,
//! resynchronized to the sensor, or held because the drop looks like fuel
//! leaving the tank while the vehicle is not moving.

use contracts::{OperatingState, RecoveryAction, RecoveryConfig};

/// Motion facts used by the stationary check
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionContext {
    /// Classified operating state for this tick, if any
    pub state: Option<OperatingState>,
    pub speed_mph: Option<f64>,
    pub trip_active: Option<bool>,
}

impl MotionContext {
    /// The classified state wins; the speed/trip rule covers unclassified
    /// ticks and treats unknown speed as moving.
    pub fn is_stationary(&self, stationary_speed_mph: f64) -> bool {
        match self.state {
            Some(state) => state.is_stationary(),
            None => {
                let slow = self
                    .speed_mph
                    .is_some_and(|s| s.is_finite() && s < stationary_speed_mph);
                slow && self.trip_active != Some(true)
            }
        }
    }
}

/// Inputs for one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryInput {
    pub timestamp: f64,
    /// Hours since the previous tick
    pub gap_hours: f64,
    /// Pre-correction estimate minus sensor (percent)
    pub drift_pct: f64,
    pub motion: MotionContext,
}

/// Per-vehicle recovery policy state
#[derive(Debug, Clone)]
pub struct EmergencyRecoveryPolicy {
    config: RecoveryConfig,
    last_resync_time: Option<f64>,
    last_refuel_time: Option<f64>,
}

impl EmergencyRecoveryPolicy {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            last_resync_time: None,
            last_refuel_time: None,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Decide what to do with this update
    pub fn evaluate(&self, input: &RecoveryInput) -> RecoveryAction {
        let drift = input.drift_pct;
        if !drift.is_finite() {
            return RecoveryAction::None;
        }

        if input.gap_hours > self.config.emergency_gap_hours
            && drift.abs() > self.config.emergency_drift_pct
        {
            return RecoveryAction::EmergencyReset;
        }

        if drift.abs() < self.resync_threshold(input.timestamp) {
            return RecoveryAction::None;
        }

        let downward = drift > 0.0;
        if downward && input.motion.is_stationary(self.config.stationary_speed_mph) {
            RecoveryAction::TheftHold
        } else if self.cooldown_elapsed(input.timestamp) {
            RecoveryAction::Resync
        } else {
            RecoveryAction::CooldownActive
        }
    }

    /// Drift threshold, relaxed shortly after a refuel
    pub fn resync_threshold(&self, timestamp: f64) -> f64 {
        if self.recent_refuel(timestamp) {
            self.config.refuel_resync_drift_pct
        } else {
            self.config.resync_drift_pct
        }
    }

    pub fn recent_refuel(&self, timestamp: f64) -> bool {
        self.last_refuel_time
            .is_some_and(|t| timestamp - t <= self.config.refuel_grace_s)
    }

    pub fn cooldown_elapsed(&self, timestamp: f64) -> bool {
        self.last_resync_time
            .map_or(true, |t| timestamp - t >= self.config.cooldown_s)
    }

    pub fn record_resync(&mut self, timestamp: f64) {
        self.last_resync_time = Some(timestamp);
    }

    pub fn record_refuel(&mut self, timestamp: f64) {
        self.last_refuel_time = Some(timestamp);
    }

    pub fn last_resync_time(&self) -> Option<f64> {
        self.last_resync_time
    }

    pub fn last_refuel_time(&self) -> Option<f64> {
        self.last_refuel_time
    }
}
