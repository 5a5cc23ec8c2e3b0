//! ECU cumulative fuel counter handling.
//!
//! Converts the counter into an instantaneous consumption rate, detects the
//! counter unit on first sight, tracks ECU health and cross-validates the
//! rate against a calibrated physics model.

use contracts::{CalibrationRecord, EcuConfig, ValidationResult, ValidationStatus, LITERS_PER_GALLON};
use tracing::{debug, info, warn};

/// Result of screening a sensor-derived value
///
/// Expected data-quality branches are values, not errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    Valid(T),
    /// No usable value this tick; caller falls back
    Fallback(FallbackReason),
    /// Value rejected; counts as an ECU failure
    Invalid(InvalidReason),
}

impl<T: Copy> Reading<T> {
    pub fn valid(&self) -> Option<T> {
        match self {
            Reading::Valid(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// First counter value; baseline recorded
    Priming,
    /// Tick carried no counter
    NoCounter,
    /// Zero interval since the previous counter
    NoInterval,
    /// ECU marked degraded after repeated failures
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Counter went backwards
    CounterReset,
    /// Rate above the plausible maximum
    ImplausibleRate,
}

impl InvalidReason {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidReason::CounterReset => "counter_reset",
            InvalidReason::ImplausibleRate => "implausible_rate",
        }
    }
}

/// Counter unit, detected from the first value's magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcuUnit {
    Liters,
    Gallons,
}

/// Engine rpm vs. ECU consumption agreement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RpmConsistency {
    Consistent,
    /// Engine reported off while the ECU reports consumption
    EngineOffConsuming { ecu_lph: f64 },
    /// Not enough data to tell
    Unknown,
}

/// Per-vehicle ECU consumption validator
#[derive(Debug)]
pub struct EcuConsumptionValidator {
    config: EcuConfig,
    tank_capacity_liters: f64,
    calibration: Option<CalibrationRecord>,
    density_factor: f64,
    unit: Option<EcuUnit>,
    /// (timestamp, gallons) of the last accepted counter
    last_counter: Option<(f64, f64)>,
    failure_count: u32,
    degraded_since: Option<f64>,
    last_success_time: Option<f64>,
    last_altitude: Option<(f64, f64)>,
}

impl EcuConsumptionValidator {
    pub fn new(
        config: EcuConfig,
        tank_capacity_liters: f64,
        calibration: Option<CalibrationRecord>,
    ) -> Self {
        let density_factor = if config.biodiesel_density_correction {
            warn!(
                blend_pct = config.biodiesel_blend_pct,
                "biodiesel density correction enabled; correction direction is unverified"
            );
            1.0 + 0.04 * config.biodiesel_blend_pct / 100.0
        } else {
            1.0
        };

        Self {
            config,
            tank_capacity_liters,
            calibration,
            density_factor,
            unit: None,
            last_counter: None,
            failure_count: 0,
            degraded_since: None,
            last_success_time: None,
            last_altitude: None,
        }
    }

    /// Consumption rate (L/h) derived from the counter
    ///
    /// The rate covers the time since the last counter reading, so ticks
    /// without a counter in between do not inflate it.
    pub fn consumption(&mut self, timestamp: f64, counter: Option<f64>) -> Reading<f64> {
        if let Some(since) = self.degraded_since {
            if timestamp - since < self.config.degraded_retry_s {
                return Reading::Fallback(FallbackReason::Degraded);
            }
            info!(
                degraded_s = timestamp - since,
                "ECU retry window reached; re-priming counter"
            );
            self.degraded_since = None;
            self.failure_count = 0;
            self.last_counter = None;
        }

        let Some(raw) = counter.filter(|c| c.is_finite() && *c >= 0.0) else {
            return Reading::Fallback(FallbackReason::NoCounter);
        };

        let unit = *self.unit.get_or_insert_with(|| {
            let unit = if raw > self.config.liters_detection_threshold {
                EcuUnit::Liters
            } else {
                EcuUnit::Gallons
            };
            debug!(counter = raw, ?unit, "ECU counter unit detected");
            unit
        });
        let gallons = match unit {
            EcuUnit::Liters => raw / LITERS_PER_GALLON,
            EcuUnit::Gallons => raw,
        };

        let Some((since, previous)) = self.last_counter.replace((timestamp, gallons)) else {
            return Reading::Fallback(FallbackReason::Priming);
        };

        let delta = gallons - previous;
        if delta < 0.0 {
            self.record_failure(timestamp, InvalidReason::CounterReset);
            return Reading::Invalid(InvalidReason::CounterReset);
        }
        let elapsed_hours = (timestamp - since) / 3600.0;
        if !(elapsed_hours.is_finite() && elapsed_hours > 0.0) {
            return Reading::Fallback(FallbackReason::NoInterval);
        }

        let rate_gph = delta / elapsed_hours;
        if rate_gph > self.config.max_rate_gph {
            self.record_failure(timestamp, InvalidReason::ImplausibleRate);
            return Reading::Invalid(InvalidReason::ImplausibleRate);
        }

        self.failure_count = 0;
        self.last_success_time = Some(timestamp);
        Reading::Valid(rate_gph * LITERS_PER_GALLON * self.density_factor)
    }

    fn record_failure(&mut self, timestamp: f64, reason: InvalidReason) {
        self.failure_count += 1;
        metrics::counter!("fuel_ecu_failures_total", "reason" => reason.as_str()).increment(1);

        if self.failure_count >= self.config.failure_threshold && self.degraded_since.is_none() {
            warn!(
                failures = self.failure_count,
                reason = reason.as_str(),
                retry_s = self.config.degraded_retry_s,
                "ECU marked degraded"
            );
            self.degraded_since = Some(timestamp);
        }
    }

    /// Physics-model consumption (L/h); `None` without engine load
    ///
    /// Altitude is tracked on every call so the climb rate is available
    /// once load appears.
    pub fn model_consumption(
        &mut self,
        engine_load_pct: Option<f64>,
        altitude: Option<f64>,
        timestamp: f64,
    ) -> Option<f64> {
        let climb_m_per_min = match altitude.filter(|a| a.is_finite()) {
            Some(alt) => {
                let climb = self
                    .last_altitude
                    .filter(|(t, _)| timestamp > *t)
                    .map(|(t, prev)| (alt - prev) / ((timestamp - t) / 60.0))
                    .unwrap_or(0.0);
                self.last_altitude = Some((timestamp, alt));
                climb
            }
            None => 0.0,
        };

        let load = engine_load_pct.filter(|l| l.is_finite())?.clamp(0.0, 100.0);
        let coeffs = self.calibration.unwrap_or_default();
        let pct_per_min = (coeffs.baseline_consumption
            + coeffs.load_factor * load
            + coeffs.altitude_factor * climb_m_per_min)
            .max(0.0);

        Some(pct_per_min / 100.0 * self.tank_capacity_liters * 60.0)
    }

    /// Compare ECU and model consumption
    pub fn cross_validate(&self, ecu_lph: f64, model_lph: f64) -> ValidationResult {
        if self.calibration.is_none() || !(model_lph > 0.0) {
            return ValidationResult {
                ecu_lph,
                model_lph,
                deviation_pct: 0.0,
                status: ValidationStatus::NoCalibration,
            };
        }

        let deviation_pct = (ecu_lph - model_lph).abs() / model_lph * 100.0;
        let status = if deviation_pct < self.config.warning_deviation_pct {
            ValidationStatus::Ok
        } else if deviation_pct < self.config.critical_deviation_pct {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Critical
        };

        ValidationResult {
            ecu_lph,
            model_lph,
            deviation_pct,
            status,
        }
    }

    /// Check the ECU rate against engine rpm
    pub fn rpm_consistency(&self, rpm: Option<f64>, ecu_lph: Option<f64>) -> RpmConsistency {
        match (rpm.filter(|r| r.is_finite()), ecu_lph) {
            (Some(r), Some(ecu)) if r == 0.0 && ecu > self.config.rpm_off_tolerance_lph => {
                RpmConsistency::EngineOffConsuming { ecu_lph: ecu }
            }
            (Some(_), Some(_)) => RpmConsistency::Consistent,
            _ => RpmConsistency::Unknown,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded_since.is_some()
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_success_time(&self) -> Option<f64> {
        self.last_success_time
    }

    pub fn unit(&self) -> Option<EcuUnit> {
        self.unit
    }

    pub fn has_calibration(&self) -> bool {
        self.calibration.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: f64 = 757.0;

    fn validator() -> EcuConsumptionValidator {
        EcuConsumptionValidator::new(EcuConfig::default(), CAPACITY, None)
    }

    #[test]
    fn test_first_counter_primes() {
        let mut ecu = validator();
        assert_eq!(
            ecu.consumption(0.0, Some(1000.0)),
            Reading::Fallback(FallbackReason::Priming)
        );
        assert_eq!(ecu.unit(), Some(EcuUnit::Gallons));
    }

    #[test]
    fn test_missing_counter() {
        let mut ecu = validator();
        assert_eq!(
            ecu.consumption(0.0, None),
            Reading::Fallback(FallbackReason::NoCounter)
        );
        assert_eq!(
            ecu.consumption(0.0, Some(f64::NAN)),
            Reading::Fallback(FallbackReason::NoCounter)
        );
    }

    #[test]
    fn test_rate_in_gallons() {
        let mut ecu = validator();
        ecu.consumption(0.0, Some(1000.0));
        let rate = ecu.consumption(1800.0, Some(1002.0)).valid().unwrap();
        assert!((rate - 4.0 * LITERS_PER_GALLON).abs() < 1e-9);
        assert_eq!(ecu.last_success_time(), Some(1800.0));
    }

    #[test]
    fn test_rate_spans_ticks_without_counter() {
        let mut ecu = validator();
        ecu.consumption(0.0, Some(1000.0));
        assert_eq!(
            ecu.consumption(1800.0, None),
            Reading::Fallback(FallbackReason::NoCounter)
        );
        let rate = ecu.consumption(3600.0, Some(1005.0)).valid().unwrap();
        assert!((rate - 5.0 * LITERS_PER_GALLON).abs() < 1e-9);
    }

    #[test]
    fn test_same_timestamp_has_no_interval() {
        let mut ecu = validator();
        ecu.consumption(60.0, Some(1000.0));
        assert_eq!(
            ecu.consumption(60.0, Some(1000.1)),
            Reading::Fallback(FallbackReason::NoInterval)
        );
    }

    #[test]
    fn test_liters_unit_is_sticky() {
        let mut ecu = validator();
        ecu.consumption(0.0, Some(400_000.0));
        assert_eq!(ecu.unit(), Some(EcuUnit::Liters));

        let rate = ecu.consumption(3600.0, Some(400_020.0)).valid().unwrap();
        assert!((rate - 20.0).abs() < 1e-6);
        assert_eq!(ecu.unit(), Some(EcuUnit::Liters));
    }

    #[test]
    fn test_counter_reset_rebaselines() {
        let mut ecu = validator();
        ecu.consumption(0.0, Some(1000.0));
        assert_eq!(
            ecu.consumption(60.0, Some(10.0)),
            Reading::Invalid(InvalidReason::CounterReset)
        );
        assert_eq!(ecu.failure_count(), 1);

        let rate = ecu.consumption(3660.0, Some(12.0)).valid().unwrap();
        assert!(rate > 0.0);
        assert_eq!(ecu.failure_count(), 0);
    }

    #[test]
    fn test_implausible_rate() {
        let mut ecu = validator();
        ecu.consumption(0.0, Some(1000.0));
        assert_eq!(
            ecu.consumption(3600.0, Some(1100.0)),
            Reading::Invalid(InvalidReason::ImplausibleRate)
        );
    }

    #[test]
    fn test_degraded_after_failures_then_retry() {
        let mut ecu = validator();
        ecu.consumption(0.0, Some(1000.0));

        let mut counter = 1000.0;
        for i in 1..=5 {
            counter += 100.0;
            let reading = ecu.consumption(i as f64 * 60.0, Some(counter));
            assert_eq!(reading, Reading::Invalid(InvalidReason::ImplausibleRate));
        }
        assert!(ecu.is_degraded());

        assert_eq!(
            ecu.consumption(400.0, Some(counter + 0.01)),
            Reading::Fallback(FallbackReason::Degraded)
        );

        // 600 s after degradation the counter is re-primed
        assert_eq!(
            ecu.consumption(900.0, Some(counter + 0.5)),
            Reading::Fallback(FallbackReason::Priming)
        );
        assert!(!ecu.is_degraded());
        assert_eq!(ecu.failure_count(), 0);
    }

    #[test]
    fn test_biodiesel_correction() {
        let config = EcuConfig {
            biodiesel_density_correction: true,
            biodiesel_blend_pct: 20.0,
            ..EcuConfig::default()
        };
        let mut ecu = EcuConsumptionValidator::new(config, CAPACITY, None);
        ecu.consumption(0.0, Some(100.0));
        let rate = ecu.consumption(3600.0, Some(101.0)).valid().unwrap();
        assert!((rate - LITERS_PER_GALLON * 1.008).abs() < 1e-9);
    }

    #[test]
    fn test_model_consumption() {
        let mut ecu = EcuConsumptionValidator::new(
            EcuConfig::default(),
            CAPACITY,
            Some(CalibrationRecord::default()),
        );
        assert!(ecu.model_consumption(None, Some(100.0), 0.0).is_none());

        // flat: (0.015 + 0.0008 * 50) %/min
        let flat = ecu.model_consumption(Some(50.0), Some(100.0), 60.0).unwrap();
        let expected = 0.055 / 100.0 * CAPACITY * 60.0;
        assert!((flat - expected).abs() < 1e-9);

        // climbing 10 m/min adds load
        let climbing = ecu.model_consumption(Some(50.0), Some(110.0), 120.0).unwrap();
        assert!(climbing > flat);
    }

    #[test]
    fn test_cross_validate_tiers() {
        let ecu = EcuConsumptionValidator::new(
            EcuConfig::default(),
            CAPACITY,
            Some(CalibrationRecord::default()),
        );
        assert_eq!(ecu.cross_validate(21.0, 20.0).status, ValidationStatus::Ok);
        assert_eq!(ecu.cross_validate(24.0, 20.0).status, ValidationStatus::Warning);
        assert_eq!(ecu.cross_validate(30.0, 20.0).status, ValidationStatus::Critical);
        assert_eq!(ecu.cross_validate(30.0, 0.0).status, ValidationStatus::NoCalibration);
    }

    #[test]
    fn test_cross_validate_without_calibration() {
        let ecu = validator();
        let result = ecu.cross_validate(30.0, 20.0);
        assert_eq!(result.status, ValidationStatus::NoCalibration);
    }

    #[test]
    fn test_rpm_consistency() {
        let ecu = validator();
        assert_eq!(
            ecu.rpm_consistency(Some(0.0), Some(8.0)),
            RpmConsistency::EngineOffConsuming { ecu_lph: 8.0 }
        );
        assert_eq!(ecu.rpm_consistency(Some(0.0), Some(0.2)), RpmConsistency::Consistent);
        assert_eq!(ecu.rpm_consistency(Some(1200.0), Some(8.0)), RpmConsistency::Consistent);
        assert_eq!(ecu.rpm_consistency(None, Some(8.0)), RpmConsistency::Unknown);
    }
}
