//! Pipeline statistics and metrics.

use std::collections::HashMap;
use std::time::Duration;

use contracts::VehicleId;
use fleet::UnitSnapshot;
use observability::EstimateMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Ticks taken off the ingestion channel
    pub ticks_received: u64,

    /// Ticks delivered to a vehicle unit
    pub ticks_routed: u64,

    /// Ticks skipped by the vehicle filter
    pub ticks_filtered: u64,

    /// Ticks for unknown or failed vehicles
    pub ticks_rejected: u64,

    /// Units evicted for inactivity
    pub vehicles_evicted: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    pub sources: usize,
    pub active_sinks: usize,

    /// Stopped by a shutdown signal
    pub interrupted: bool,
    pub timed_out: bool,

    /// Ingestion counters at shutdown
    pub ingestion: ingestion::MetricsSnapshot,

    /// Final counters of every unit alive at shutdown
    pub units: HashMap<VehicleId, UnitSnapshot>,

    /// Per-sink counters
    pub sinks: Vec<(String, dispatcher::MetricsSnapshot)>,

    /// Estimate aggregator
    pub estimates: EstimateMetricsAggregator,
}

impl PipelineStats {
    /// Routed ticks per wall-clock second
    pub fn ticks_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks_routed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Estimates dropped on the way from the units to the dispatcher
    pub fn estimates_dropped(&self) -> u64 {
        self.units.values().map(|u| u.dropped).sum()
    }

    /// Ticks the estimators refused (out of order, invalid timestamp)
    pub fn ticks_refused(&self) -> u64 {
        self.units.values().map(|u| u.rejected).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Sources: {}", self.sources);
        println!("   ├─ Ticks received: {}", self.ticks_received);
        println!("   ├─ Ticks routed: {}", self.ticks_routed);
        println!("   ├─ Ticks filtered: {}", self.ticks_filtered);
        println!("   ├─ Ticks rejected: {}", self.ticks_rejected);
        println!(
            "   ├─ Ingestion drops: {} ({:.2}%, peak queue {})",
            self.ingestion.ticks_dropped,
            self.ingestion.drop_rate(),
            self.ingestion.peak_queue_len
        );
        println!("   ├─ Ticks/s: {:.2}", self.ticks_per_sec());
        println!("   └─ Active sinks: {}", self.active_sinks);

        if self.interrupted {
            println!("\n⚠️  Run interrupted by shutdown signal");
        } else if self.timed_out {
            println!("\n⚠️  Run stopped by timeout");
        }

        let summary = self.estimates.summary();

        println!("\n📈 Estimator Metrics");
        println!("   ├─ Estimates: {}", summary.total_estimates);
        println!("   ├─ Refused ticks: {}", self.ticks_refused());
        println!("   ├─ Dropped estimates: {}", self.estimates_dropped());
        println!("   ├─ Drift warnings: {:.2}%", summary.drift_warning_rate);
        println!("   ├─ Bias detections: {}", summary.bias_detections);
        println!("   ├─ Sensor escalations: {}", summary.escalations);
        println!("   ├─ |Drift| (%): {}", summary.drift_abs_pct);
        println!("   ├─ Kalman gain: {}", summary.kalman_gain);
        println!("   └─ Theft flags: {}", summary.theft_flags);

        if !summary.anchors.is_empty() || !summary.recoveries.is_empty() {
            println!("\n⚓ Events");
            for (kind, count) in &summary.anchors {
                println!("   ├─ anchor {}: {}", kind, count);
            }
            for (action, count) in &summary.recoveries {
                println!("   ├─ recovery {}: {}", action, count);
            }
        }

        if !self.estimates.vehicles.is_empty() {
            println!("\n🚚 Vehicles ({})", self.estimates.vehicles.len());
            let count = self.estimates.vehicles.len();
            for (i, (id, vehicle)) in self.estimates.vehicles.iter().enumerate() {
                let prefix = if i + 1 == count { "└─" } else { "├─" };
                println!(
                    "   {} {}: {:.1}% after {} estimates (max |drift| {:.2}%, theft flags {})",
                    prefix,
                    id,
                    vehicle.last_level_pct,
                    vehicle.estimates,
                    vehicle.max_abs_drift_pct,
                    vehicle.theft_flags
                );
            }
        }

        if self.vehicles_evicted > 0 {
            println!("\n💤 Evicted for inactivity: {}", self.vehicles_evicted);
        }

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (name, metrics) in &self.sinks {
                println!(
                    "   ├─ {}: {} written, {} failed, {} dropped",
                    name, metrics.write_count, metrics.failure_count, metrics.dropped_count
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(rejected: u64, dropped: u64) -> UnitSnapshot {
        UnitSnapshot {
            ticks: 10,
            estimates: 10 - rejected,
            rejected,
            dropped,
            last_seen: 0.0,
        }
    }

    #[test]
    fn test_unit_roll_up() {
        let mut stats = PipelineStats::default();
        stats.units.insert("a".into(), unit(1, 2));
        stats.units.insert("b".into(), unit(3, 0));

        assert_eq!(stats.ticks_refused(), 4);
        assert_eq!(stats.estimates_dropped(), 2);
    }

    #[test]
    fn test_ticks_per_sec() {
        let stats = PipelineStats {
            ticks_routed: 50,
            duration: Duration::from_secs(5),
            ..Default::default()
        };
        assert!((stats.ticks_per_sec() - 10.0).abs() < 1e-9);
        assert_eq!(PipelineStats::default().ticks_per_sec(), 0.0);
    }
}
