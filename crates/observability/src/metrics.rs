//! Estimate metrics
//!
//! Exports per-estimate gauges/histograms through the `metrics` facade and
//! aggregates a run summary in memory.

use std::collections::BTreeMap;

use contracts::{FuelEstimate, RecoveryAction};
use metrics::{counter, gauge, histogram};

/// Record metrics for one emitted estimate
pub fn record_estimate_metrics(estimate: &FuelEstimate) {
    let vehicle = estimate.vehicle_id.to_string();

    counter!("fuel_estimates_total").increment(1);

    gauge!("fuel_level_pct", "vehicle_id" => vehicle.clone()).set(estimate.level_pct);
    gauge!("fuel_level_liters", "vehicle_id" => vehicle.clone()).set(estimate.level_liters);
    gauge!("fuel_drift_pct", "vehicle_id" => vehicle.clone()).set(estimate.drift_pct);
    gauge!("fuel_covariance", "vehicle_id" => vehicle.clone()).set(estimate.covariance);

    histogram!("fuel_kalman_gain").record(estimate.kalman_gain);
    histogram!("fuel_drift_abs_pct").record(estimate.drift_pct.abs());
    histogram!("fuel_consumption_lph").record(estimate.consumption_lph);

    if estimate.drift_warning {
        counter!("fuel_drift_warnings_total", "vehicle_id" => vehicle.clone()).increment(1);
    }
    if estimate.bias_detected {
        counter!("fuel_bias_detected_total").increment(1);
    }
    if let Some(anchor) = &estimate.anchor_event {
        counter!("fuel_anchor_events_total", "kind" => anchor.kind()).increment(1);
    }
    if estimate.theft_flag.is_some() {
        counter!("fuel_theft_suspected_total", "vehicle_id" => vehicle).increment(1);
    }
}

/// Record what the fleet router did with a tick (`routed`, `filtered`,
/// `rejected`)
pub fn record_tick_outcome(outcome: &'static str) {
    counter!("fuel_ticks_routed_total", "outcome" => outcome).increment(1);
}

/// In-memory aggregation of emitted estimates
#[derive(Debug, Clone, Default)]
pub struct EstimateMetricsAggregator {
    pub total_estimates: u64,
    pub drift_warnings: u64,
    pub bias_detections: u64,
    pub theft_flags: u64,
    pub escalations: u64,
    pub anchors: BTreeMap<&'static str, u64>,
    pub recoveries: BTreeMap<&'static str, u64>,
    pub drift_stats: RunningStats,
    pub gain_stats: RunningStats,
    pub vehicles: BTreeMap<String, VehicleSummary>,
}

/// Per-vehicle roll-up
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleSummary {
    pub estimates: u64,
    pub last_timestamp: f64,
    pub last_level_pct: f64,
    pub theft_flags: u64,
    pub max_abs_drift_pct: f64,
}

impl EstimateMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, estimate: &FuelEstimate) {
        self.total_estimates += 1;
        if estimate.drift_warning {
            self.drift_warnings += 1;
        }
        if estimate.bias_detected {
            self.bias_detections += 1;
        }
        if estimate.theft_flag.is_some() {
            self.theft_flags += 1;
        }
        if estimate.sensor_escalation {
            self.escalations += 1;
        }
        if let Some(anchor) = &estimate.anchor_event {
            *self.anchors.entry(anchor.kind()).or_insert(0) += 1;
        }
        if estimate.recovery != RecoveryAction::None {
            *self.recoveries.entry(estimate.recovery.as_str()).or_insert(0) += 1;
        }

        self.drift_stats.push(estimate.drift_pct.abs());
        self.gain_stats.push(estimate.kalman_gain);

        let vehicle = self
            .vehicles
            .entry(estimate.vehicle_id.to_string())
            .or_default();
        vehicle.estimates += 1;
        vehicle.last_timestamp = estimate.timestamp;
        vehicle.last_level_pct = estimate.level_pct;
        vehicle.max_abs_drift_pct = vehicle.max_abs_drift_pct.max(estimate.drift_pct.abs());
        if estimate.theft_flag.is_some() {
            vehicle.theft_flags += 1;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_estimates: self.total_estimates,
            vehicles: self.vehicles.len(),
            drift_warning_rate: rate(self.drift_warnings, self.total_estimates),
            bias_detections: self.bias_detections,
            theft_flags: self.theft_flags,
            escalations: self.escalations,
            anchors: self.anchors.clone(),
            recoveries: self.recoveries.clone(),
            drift_abs_pct: StatsSummary::from(&self.drift_stats),
            kalman_gain: StatsSummary::from(&self.gain_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_estimates: u64,
    pub vehicles: usize,
    pub drift_warning_rate: f64,
    pub bias_detections: u64,
    pub theft_flags: u64,
    pub escalations: u64,
    pub anchors: BTreeMap<&'static str, u64>,
    pub recoveries: BTreeMap<&'static str, u64>,
    pub drift_abs_pct: StatsSummary,
    pub kalman_gain: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total estimates: {}", self.total_estimates)?;
        writeln!(f, "Vehicles: {}", self.vehicles)?;
        writeln!(f, "Drift warnings: {:.2}%", self.drift_warning_rate)?;
        writeln!(f, "Bias detections: {}", self.bias_detections)?;
        writeln!(f, "Theft flags: {}", self.theft_flags)?;
        writeln!(f, "Sensor escalations: {}", self.escalations)?;
        writeln!(f, "|Drift| (%): {}", self.drift_abs_pct)?;
        writeln!(f, "Kalman gain: {}", self.kalman_gain)?;

        if !self.anchors.is_empty() {
            writeln!(f, "Anchor events:")?;
            for (kind, count) in &self.anchors {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }
        if !self.recoveries.is_empty() {
            writeln!(f, "Recovery actions:")?;
            for (action, count) in &self.recoveries {
                writeln!(f, "  {}: {}", action, count)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
