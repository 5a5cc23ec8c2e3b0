//! Scalar Kalman filter over the tank level.
//!
//! State is the level in liters with covariance `P`. Prediction subtracts
//! consumption and grows `P` by `Q_r`; the update blends in the capacitive
//! sensor with a tier-capped gain and then lets the recovery policy decide
//! whether to keep, roll back or replace the result.

use contracts::{
    Confidence, EstimatorConfig, GpsQualityLevel, KalmanConfig, OperatingState, RecoveryAction,
    TheftFlag, LITERS_PER_GALLON,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EstimatorError, Result};
use crate::history::BoundedHistory;
use crate::noise::{AdaptiveNoiseController, BiasAssessment, MeasurementNoise, SignalQuality};
use crate::quality::QualityProviders;
use crate::recovery::{EmergencyRecoveryPolicy, MotionContext, RecoveryInput};

/// Where the consumption applied by `predict` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionSource {
    /// Caller-supplied rate (ECU or physics model)
    Reported,
    /// Forced to zero because the engine is off
    EngineOff,
    /// Speed-based default
    Fallback,
    /// Long gap; consumption not modeled
    GapSkipped,
    /// Zero interval
    NoElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictOutcome {
    pub consumption_lph: f64,
    pub consumed_liters: f64,
    pub source: ConsumptionSource,
}

/// Context of one measurement update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateContext {
    pub timestamp: f64,
    /// Hours since the previous tick
    pub gap_hours: f64,
    pub motion: MotionContext,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// Reading absent or not finite
    Skipped {
        count: u32,
        /// True exactly on the tick the count reaches the escalation limit
        escalated: bool,
    },
    Applied {
        innovation_pct: f64,
        gain: f64,
        recovery: RecoveryAction,
        theft_flag: Option<TheftFlag>,
    },
}

/// Read-only view of the filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimateSnapshot {
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
    pub sensor_quality_factor: f64,
    pub gps_quality: Option<GpsQualityLevel>,
    pub operating_state: Option<OperatingState>,
    pub q_r: f64,
    pub q_l: f64,
    pub sensor_skip_count: u32,
}

/// Per-vehicle fuel level filter
#[derive(Debug)]
pub struct FuelLevelEstimator {
    capacity_liters: f64,
    kalman: KalmanConfig,
    drift_warning_pct: f64,
    noise: AdaptiveNoiseController,
    recovery: EmergencyRecoveryPolicy,

    level_liters: f64,
    covariance: f64,
    q_r: f64,
    q_l: f64,
    innovations: BoundedHistory<f64>,
    bias: BiasAssessment,
    sensor_skip_count: u32,
    theft_flags: BoundedHistory<TheftFlag>,
    drift_pct: f64,
    drift_warning: bool,
    last_kalman_gain: f64,
    last_consumption_lph: f64,
    operating_state: Option<OperatingState>,
    quality_factor: f64,
    gps_level: Option<GpsQualityLevel>,
    initialized: bool,
}

impl FuelLevelEstimator {
    /// Filter with neutral quality providers
    pub fn new(capacity_liters: f64, config: &EstimatorConfig) -> Result<Self> {
        Self::with_quality(capacity_liters, config, QualityProviders::neutral())
    }

    pub fn with_quality(
        capacity_liters: f64,
        config: &EstimatorConfig,
        quality: QualityProviders,
    ) -> Result<Self> {
        if !(capacity_liters.is_finite() && capacity_liters > 0.0) {
            return Err(EstimatorError::InvalidCapacity {
                capacity: capacity_liters,
            });
        }

        Ok(Self {
            capacity_liters,
            kalman: config.kalman.clone(),
            drift_warning_pct: config.drift_warning_pct,
            q_r: config.noise.q_r_stopped,
            q_l: config.noise.q_l_static,
            innovations: BoundedHistory::new(config.noise.bias_window),
            noise: AdaptiveNoiseController::new(config.noise.clone(), quality),
            recovery: EmergencyRecoveryPolicy::new(config.recovery.clone()),
            level_liters: 0.0,
            covariance: config.kalman.initial_covariance,
            bias: BiasAssessment::NONE,
            sensor_skip_count: 0,
            theft_flags: BoundedHistory::new(config.recovery.theft_history),
            drift_pct: 0.0,
            drift_warning: false,
            last_kalman_gain: 0.0,
            last_consumption_lph: 0.0,
            operating_state: None,
            quality_factor: 1.0,
            gps_level: None,
            initialized: false,
        })
    }

    /// Hard-set the level from a reading and reset uncertainty
    pub fn initialize(&mut self, measured_pct: f64) {
        if !measured_pct.is_finite() {
            debug!(measured_pct, "ignoring non-finite initialization reading");
            return;
        }
        self.level_liters = self.pct_to_liters(measured_pct.clamp(0.0, 100.0));
        self.covariance = self.kalman.initial_covariance;
        self.innovations.clear();
        self.bias = BiasAssessment::NONE;
        self.drift_pct = 0.0;
        self.drift_warning = false;
        self.initialized = true;
    }

    /// Recompute `Q_r` and `Q_L` for this tick
    ///
    /// `Q_r` uses the consumption applied by the previous prediction.
    pub fn adapt_noise(&mut self, state: OperatingState, signals: &SignalQuality) -> MeasurementNoise {
        self.q_r = self.noise.process_noise(state, self.last_consumption_lph);
        let noise = self.noise.measurement_noise(state, signals);
        self.q_l = noise.q_l;
        self.quality_factor = noise.quality_factor;
        self.gps_level = noise.gps_level;
        self.operating_state = Some(state);
        noise
    }

    /// Propagate the level over `dt_hours`
    pub fn predict(
        &mut self,
        dt_hours: f64,
        consumption_lph: Option<f64>,
        speed_mph: Option<f64>,
        rpm: Option<f64>,
    ) -> Result<PredictOutcome> {
        if !dt_hours.is_finite() || dt_hours < 0.0 {
            return Err(EstimatorError::InvalidInterval { dt_hours });
        }
        if dt_hours == 0.0 {
            return Ok(PredictOutcome {
                consumption_lph: self.last_consumption_lph,
                consumed_liters: 0.0,
                source: ConsumptionSource::NoElapsed,
            });
        }
        if dt_hours > self.kalman.long_gap_hours {
            self.covariance += self.q_r * dt_hours * self.kalman.gap_inflation;
            debug!(dt_hours, covariance = self.covariance, "long gap, consumption skipped");
            return Ok(PredictOutcome {
                consumption_lph: 0.0,
                consumed_liters: 0.0,
                source: ConsumptionSource::GapSkipped,
            });
        }

        let reported = match consumption_lph {
            Some(c) if c.is_finite() && c >= 0.0 => Some(c),
            Some(c) => {
                debug!(consumption_lph = c, "discarding invalid consumption");
                None
            }
            None => None,
        };
        let engine_off = rpm.is_some_and(|r| r == 0.0);

        let (lph, source) = if engine_off {
            if reported.is_some_and(|c| c > 0.0) {
                debug!(?reported, "engine off; consumption forced to zero");
            }
            (0.0, ConsumptionSource::EngineOff)
        } else if let Some(c) = reported {
            (c, ConsumptionSource::Reported)
        } else {
            let speed = speed_mph.filter(|s| s.is_finite()).unwrap_or(0.0);
            let fallback = if speed < self.kalman.fallback_speed_mph {
                self.kalman.stopped_fallback_lph
            } else {
                self.kalman.moving_fallback_lph
            };
            (fallback, ConsumptionSource::Fallback)
        };

        let consumed = lph * dt_hours;
        self.level_liters = (self.level_liters - consumed).max(0.0);
        self.covariance += self.q_r * dt_hours;
        self.last_consumption_lph = lph;

        Ok(PredictOutcome {
            consumption_lph: lph,
            consumed_liters: consumed,
            source,
        })
    }

    /// Blend a sensor reading into the estimate
    pub fn update(&mut self, measured_pct: Option<f64>, ctx: &UpdateContext) -> UpdateOutcome {
        let Some(raw) = measured_pct.filter(|m| m.is_finite()) else {
            return self.skip();
        };
        self.sensor_skip_count = 0;

        let measured_pct = raw.clamp(0.0, 100.0);
        let measured_liters = self.pct_to_liters(measured_pct);
        let prior_level = self.level_liters;
        let prior_covariance = self.covariance;
        let prior_pct = self.level_pct();

        let innovation = measured_liters - self.level_liters;
        self.innovations.push(innovation);
        self.bias = self.noise.bias(self.innovations.iter());

        let r = self.q_l * self.bias.multiplier;
        let innovation_pct = self.liters_to_pct(innovation);
        let gain = self.gain(r, innovation_pct);

        self.level_liters = (self.level_liters + gain * innovation).clamp(0.0, self.capacity_liters);
        self.covariance = ((1.0 - gain) * self.covariance).max(0.0);
        self.last_kalman_gain = gain;
        self.drift_pct = self.level_pct() - measured_pct;
        self.drift_warning = self.drift_pct.abs() > self.drift_warning_pct;

        let prior_drift = prior_pct - measured_pct;
        let action = self.recovery.evaluate(&RecoveryInput {
            timestamp: ctx.timestamp,
            gap_hours: ctx.gap_hours,
            drift_pct: prior_drift,
            motion: ctx.motion,
        });

        let mut theft_flag = None;
        match action {
            RecoveryAction::EmergencyReset => {
                warn!(
                    gap_hours = ctx.gap_hours,
                    drift_pct = prior_drift,
                    "emergency reset to sensor"
                );
                self.initialize(measured_pct);
                self.recovery.record_resync(ctx.timestamp);
                metrics::counter!("fuel_resets_total", "kind" => "emergency").increment(1);
            }
            RecoveryAction::Resync => {
                info!(drift_pct = prior_drift, "resynchronizing to sensor");
                self.initialize(measured_pct);
                self.recovery.record_resync(ctx.timestamp);
                metrics::counter!("fuel_resets_total", "kind" => "resync").increment(1);
            }
            RecoveryAction::TheftHold => {
                self.level_liters = prior_level;
                self.covariance = prior_covariance;
                self.last_kalman_gain = 0.0;
                self.drift_pct = prior_drift;
                self.drift_warning = true;

                let flag = TheftFlag {
                    timestamp: ctx.timestamp,
                    drift_pct: prior_drift,
                    sensor_pct: measured_pct,
                    estimated_pct: prior_pct,
                    estimated_gallons_lost: self.pct_to_liters(prior_drift) / LITERS_PER_GALLON,
                };
                self.theft_flags.push(flag);
                theft_flag = Some(flag);

                warn!(
                    drift_pct = prior_drift,
                    sensor_pct = measured_pct,
                    estimated_pct = prior_pct,
                    gallons = flag.estimated_gallons_lost,
                    "level drop while stationary; estimate held"
                );
                metrics::counter!("fuel_theft_flags_total").increment(1);
            }
            RecoveryAction::CooldownActive | RecoveryAction::None => {}
        }

        UpdateOutcome::Applied {
            innovation_pct,
            gain: self.last_kalman_gain,
            recovery: action,
            theft_flag,
        }
    }

    fn skip(&mut self) -> UpdateOutcome {
        self.sensor_skip_count = self.sensor_skip_count.saturating_add(1);
        metrics::counter!("fuel_sensor_skips_total").increment(1);

        let escalated = self.sensor_skip_count == self.kalman.skip_escalation;
        if escalated {
            warn!(
                count = self.sensor_skip_count,
                "fuel sensor invalid on consecutive ticks"
            );
        }
        UpdateOutcome::Skipped {
            count: self.sensor_skip_count,
            escalated,
        }
    }

    /// `P / (P + R)` capped by covariance tier, with a boost for large
    /// innovations
    fn gain(&self, r: f64, innovation_pct: f64) -> f64 {
        let p = self.covariance;
        let k = if p + r > 0.0 { p / (p + r) } else { 0.0 };

        let mut cap = if p > self.kalman.high_covariance {
            self.kalman.gain_cap_high
        } else if p > self.kalman.mid_covariance {
            self.kalman.gain_cap_mid
        } else {
            self.kalman.gain_cap_low
        };
        if innovation_pct.abs() > self.kalman.boost_sigmas * 2.0 * r.max(0.0).sqrt() {
            cap = (cap * self.kalman.boost_factor).min(self.kalman.boost_cap);
        }

        k.min(cap)
    }

    /// Hard reset after a detected refuel
    pub fn apply_refuel_reset(&mut self, new_pct: f64, gallons_added: f64, timestamp: f64) {
        info!(new_pct, gallons_added, "refuel detected; filter reset");
        self.initialize(new_pct);
        self.recovery.record_refuel(timestamp);
        metrics::counter!("fuel_resets_total", "kind" => "refuel").increment(1);
    }

    pub fn estimate(&self) -> EstimateSnapshot {
        EstimateSnapshot {
            level_liters: self.level_liters,
            level_pct: self.level_pct(),
            consumption_lph: self.last_consumption_lph,
            drift_pct: self.drift_pct,
            drift_warning: self.drift_warning,
            kalman_gain: self.last_kalman_gain,
            covariance: self.covariance,
            confidence: Confidence::from_covariance(self.covariance),
            bias_detected: self.bias.detected,
            bias_magnitude_pct: self.liters_to_pct(self.bias.magnitude),
            sensor_quality_factor: self.quality_factor,
            gps_quality: self.gps_level,
            operating_state: self.operating_state,
            q_r: self.q_r,
            q_l: self.q_l,
            sensor_skip_count: self.sensor_skip_count,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn capacity_liters(&self) -> f64 {
        self.capacity_liters
    }

    pub fn level_liters(&self) -> f64 {
        self.level_liters
    }

    pub fn level_pct(&self) -> f64 {
        self.liters_to_pct(self.level_liters).clamp(0.0, 100.0)
    }

    pub fn covariance(&self) -> f64 {
        self.covariance
    }

    pub fn sensor_skip_count(&self) -> u32 {
        self.sensor_skip_count
    }

    /// Retained theft flags, oldest first
    pub fn theft_flags(&self) -> impl Iterator<Item = &TheftFlag> {
        self.theft_flags.iter()
    }

    pub fn recovery(&self) -> &EmergencyRecoveryPolicy {
        &self.recovery
    }

    #[inline]
    fn pct_to_liters(&self, pct: f64) -> f64 {
        pct / 100.0 * self.capacity_liters
    }

    #[inline]
    fn liters_to_pct(&self, liters: f64) -> f64 {
        liters / self.capacity_liters * 100.0
    }
}
