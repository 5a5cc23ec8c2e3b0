//! Adaptive noise control.
//!
//! Process noise `Q_r` follows the operating state: a parked truck's level
//! should barely move while a moving truck's level can legitimately fall
//! fast. Measurement noise `Q_L` starts from a static/moving base and is
//! scaled by GPS and electrical quality. A persistent same-sign innovation
//! run marks sensor bias and inflates `R`.

use contracts::{GpsQualityLevel, NoiseConfig, OperatingState};

use crate::quality::QualityProviders;

const MOVING_MIN_SPEED_MPH: f64 = 5.0;
const CREEPING_MIN_SPEED_MPH: f64 = 2.0;

/// Quality signals carried by a tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalQuality {
    pub gps_satellites: Option<u32>,
    pub hdop: Option<f64>,
    pub battery_voltage: Option<f64>,
}

/// Measurement noise for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementNoise {
    /// Clamped `Q_L`
    pub q_l: f64,
    /// `gpsFactor * voltageFactor`
    pub quality_factor: f64,
    pub gps_level: Option<GpsQualityLevel>,
}

/// Bias assessment over the innovation history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasAssessment {
    pub detected: bool,
    /// Multiplier on `R`
    pub multiplier: f64,
    /// Mean innovation over the window (same unit as the input)
    pub magnitude: f64,
}

impl BiasAssessment {
    pub const NONE: BiasAssessment = BiasAssessment {
        detected: false,
        multiplier: 1.0,
        magnitude: 0.0,
    };
}

/// Derives `Q_r`, `Q_L` and the bias multiplier
#[derive(Debug, Clone)]
pub struct AdaptiveNoiseController {
    config: NoiseConfig,
    quality: QualityProviders,
}

impl AdaptiveNoiseController {
    pub fn new(config: NoiseConfig, quality: QualityProviders) -> Self {
        Self { config, quality }
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }

    /// Classify the operating state from speed and rpm
    ///
    /// Absent speed counts as not moving; absent rpm while not moving
    /// yields `Stopped` since the engine state is unknown.
    pub fn classify(speed_mph: Option<f64>, rpm: Option<f64>) -> OperatingState {
        let speed = speed_mph.filter(|s| s.is_finite()).unwrap_or(0.0);
        let rpm = rpm.filter(|r| r.is_finite());

        if speed >= MOVING_MIN_SPEED_MPH {
            OperatingState::Moving
        } else if speed >= CREEPING_MIN_SPEED_MPH {
            OperatingState::Stopped
        } else {
            match rpm {
                Some(r) if r > 0.0 => OperatingState::Idle,
                Some(_) => OperatingState::Parked,
                None => OperatingState::Stopped,
            }
        }
    }

    /// Process noise for the state at the given consumption (L/h)
    pub fn process_noise(&self, state: OperatingState, consumption_lph: f64) -> f64 {
        let c = if consumption_lph.is_finite() {
            consumption_lph.max(0.0)
        } else {
            0.0
        };
        let cfg = &self.config;

        match state {
            OperatingState::Parked => cfg.q_r_parked,
            OperatingState::Stopped => cfg.q_r_stopped,
            OperatingState::Idle => cfg.q_r_idle + c / 100.0 * cfg.q_r_idle_per_100_lph,
            OperatingState::Moving => cfg.q_r_moving + c / 50.0 * cfg.q_r_moving_per_50_lph,
        }
    }

    /// Combined measurement noise, clamped to `[q_l_min, q_l_max]`
    pub fn measurement_noise(
        &self,
        state: OperatingState,
        signals: &SignalQuality,
    ) -> MeasurementNoise {
        let base = match state {
            OperatingState::Moving => self.config.q_l_moving,
            _ => self.config.q_l_static,
        };

        let gps = self.quality.gps.assess(signals.gps_satellites, signals.hdop);
        let voltage_factor = self.quality.voltage.factor(signals.battery_voltage);
        let quality_factor = sanitize_factor(gps.factor) * sanitize_factor(voltage_factor);

        MeasurementNoise {
            q_l: (base * quality_factor).clamp(self.config.q_l_min, self.config.q_l_max),
            quality_factor,
            gps_level: gps.level,
        }
    }

    /// Assess bias over the most recent innovations
    ///
    /// Requires a full window; every value must share the same strict sign.
    pub fn bias<'a, I>(&self, innovations: I) -> BiasAssessment
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let window = self.config.bias_window;
        let values: Vec<f64> = innovations.into_iter().copied().collect();
        if values.len() < window {
            return BiasAssessment::NONE;
        }
        let recent = &values[values.len() - window..];

        let all_positive = recent.iter().all(|v| *v > 0.0);
        let all_negative = recent.iter().all(|v| *v < 0.0);
        if !(all_positive || all_negative) {
            return BiasAssessment::NONE;
        }

        BiasAssessment {
            detected: true,
            multiplier: self.config.bias_multiplier,
            magnitude: recent.iter().sum::<f64>() / window as f64,
        }
    }
}

fn sanitize_factor(factor: f64) -> f64 {
    if factor.is_finite() && factor > 0.0 {
        factor
    } else {
        1.0
    }
}
