//! Stability window ("anchor") detection.
//!
//! Two contiguous windows are tracked independently:
//! - STATIC: stopped with the engine idling
//! - MICRO: steady cruise around a stable speed
//!
//! A completed window emits an `AnchorEvent` and restarts. Ticks without a
//! usable fuel reading neither extend nor break a window.
//!
//! Duration and fuel spread cover the whole contiguous run. Means and the
//! speed deviation cover the most recent samples held in the bounded ring,
//! so the ring capacity does not cap how fast ticks may arrive.

use contracts::{AnchorConfig, AnchorEvent};

use crate::history::BoundedHistory;

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: f64,
    speed_mph: f64,
    fuel_pct: f64,
}

/// Per-vehicle anchor detector
#[derive(Debug)]
pub struct AnchorDetector {
    config: AnchorConfig,
    static_window: Window,
    micro_window: Window,
}

/// One contiguous run of samples
#[derive(Debug)]
struct Window {
    recent: BoundedHistory<Sample>,
    started_at: Option<f64>,
    fuel_min: f64,
    fuel_max: f64,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            recent: BoundedHistory::new(capacity),
            started_at: None,
            fuel_min: f64::INFINITY,
            fuel_max: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, sample: Sample) {
        self.started_at.get_or_insert(sample.timestamp);
        self.fuel_min = self.fuel_min.min(sample.fuel_pct);
        self.fuel_max = self.fuel_max.max(sample.fuel_pct);
        self.recent.push(sample);
    }

    fn clear(&mut self) {
        self.recent.clear();
        self.started_at = None;
        self.fuel_min = f64::INFINITY;
        self.fuel_max = f64::NEG_INFINITY;
    }

    fn len(&self) -> usize {
        self.recent.len()
    }

    fn stats(&self) -> Option<WindowStats> {
        let started_at = self.started_at?;
        let last = self.recent.newest()?;
        let n = self.recent.len() as f64;

        let fuel_mean = self.recent.iter().map(|s| s.fuel_pct).sum::<f64>() / n;
        let speed_mean = self.recent.iter().map(|s| s.speed_mph).sum::<f64>() / n;
        let speed_var = self
            .recent
            .iter()
            .map(|s| (s.speed_mph - speed_mean).powi(2))
            .sum::<f64>()
            / n;

        Some(WindowStats {
            duration_s: last.timestamp - started_at,
            fuel_mean,
            fuel_spread: self.fuel_max - self.fuel_min,
            speed_mean,
            speed_std: speed_var.sqrt(),
        })
    }
}

impl AnchorDetector {
    pub fn new(config: AnchorConfig) -> Self {
        Self {
            static_window: Window::new(config.static_capacity),
            micro_window: Window::new(config.micro_capacity),
            config,
        }
    }

    /// Feed one tick; returns an event when a window completes
    ///
    /// `estimate_pct` is the filter level after this tick's update and is
    /// only used to compute the event's drift.
    pub fn observe(
        &mut self,
        timestamp: f64,
        speed_mph: Option<f64>,
        rpm: Option<f64>,
        measured_pct: Option<f64>,
        estimate_pct: f64,
    ) -> Option<AnchorEvent> {
        let Some(fuel_pct) = measured_pct.filter(|m| m.is_finite()) else {
            return None;
        };
        let fuel_pct = fuel_pct.clamp(0.0, 100.0);
        let speed = speed_mph.filter(|s| s.is_finite());
        let rpm = rpm.filter(|r| r.is_finite());

        let static_event = self.observe_static(timestamp, speed, rpm, fuel_pct, estimate_pct);
        let micro_event = self.observe_micro(timestamp, speed, fuel_pct, estimate_pct);

        static_event.or(micro_event)
    }

    fn observe_static(
        &mut self,
        timestamp: f64,
        speed: Option<f64>,
        rpm: Option<f64>,
        fuel_pct: f64,
        estimate_pct: f64,
    ) -> Option<AnchorEvent> {
        let idling = matches!((speed, rpm), (Some(s), Some(r))
            if s < self.config.static_max_speed_mph && r > 0.0);
        if !idling {
            self.static_window.clear();
            return None;
        }

        self.static_window.push(Sample {
            timestamp,
            speed_mph: speed.unwrap_or(0.0),
            fuel_pct,
        });

        let stats = self.static_window.stats()?;
        if stats.duration_s < self.config.static_min_duration_s
            || stats.fuel_spread > self.config.static_max_spread_pct
        {
            return None;
        }

        self.static_window.clear();
        Some(AnchorEvent::Static {
            fuel_pct: stats.fuel_mean,
            duration_s: stats.duration_s,
            drift_pct: estimate_pct - stats.fuel_mean,
        })
    }

    fn observe_micro(
        &mut self,
        timestamp: f64,
        speed: Option<f64>,
        fuel_pct: f64,
        estimate_pct: f64,
    ) -> Option<AnchorEvent> {
        let Some(speed) = speed.filter(|s| *s >= self.config.micro_min_speed_mph) else {
            self.micro_window.clear();
            return None;
        };

        if let Some(stats) = self.micro_window.stats() {
            if (speed - stats.speed_mean).abs() > self.config.micro_speed_band_mph {
                self.micro_window.clear();
            }
        }

        self.micro_window.push(Sample {
            timestamp,
            speed_mph: speed,
            fuel_pct,
        });

        let stats = self.micro_window.stats()?;
        if stats.duration_s < self.config.micro_min_duration_s
            || stats.speed_std > self.config.micro_max_speed_std
            || stats.fuel_spread > self.config.micro_max_spread_pct
        {
            return None;
        }

        self.micro_window.clear();
        Some(AnchorEvent::Micro {
            fuel_pct: stats.fuel_mean,
            duration_s: stats.duration_s,
            speed_mean: stats.speed_mean,
            drift_pct: estimate_pct - stats.fuel_mean,
        })
    }

    /// Drop both windows (e.g. after a refuel)
    pub fn reset(&mut self) {
        self.static_window.clear();
        self.micro_window.clear();
    }

    pub fn static_len(&self) -> usize {
        self.static_window.len()
    }

    pub fn micro_len(&self) -> usize {
        self.micro_window.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowStats {
    duration_s: f64,
    fuel_mean: f64,
    fuel_spread: f64,
    speed_mean: f64,
    speed_std: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> AnchorDetector {
        AnchorDetector::new(AnchorConfig::default())
    }

    #[test]
    fn test_static_anchor_after_five_minutes() {
        let mut d = detector();
        let mut event = None;
        for i in 0..=5 {
            let fuel = 60.0 + (i % 2) as f64 * 0.5;
            event = d.observe(i as f64 * 60.0, Some(0.0), Some(700.0), Some(fuel), 61.0);
            if i < 5 {
                assert!(event.is_none(), "emitted early at tick {i}");
            }
        }

        match event {
            Some(AnchorEvent::Static {
                fuel_pct,
                duration_s,
                drift_pct,
            }) => {
                assert_eq!(duration_s, 300.0);
                assert!((fuel_pct - 60.25).abs() < 1e-9);
                assert!((drift_pct - 0.75).abs() < 1e-9);
            }
            other => panic!("expected static anchor, got {other:?}"),
        }
        assert_eq!(d.static_len(), 0);
    }

    #[test]
    fn test_static_requires_running_engine() {
        let mut d = detector();
        for i in 0..10 {
            let event = d.observe(i as f64 * 60.0, Some(0.0), Some(0.0), Some(60.0), 60.0);
            assert!(event.is_none());
        }
        assert_eq!(d.static_len(), 0);
    }

    #[test]
    fn test_static_spread_blocks_emission() {
        let mut d = detector();
        for i in 0..=5 {
            let fuel = 60.0 + i as f64;
            assert!(d
                .observe(i as f64 * 60.0, Some(0.0), Some(700.0), Some(fuel), 60.0)
                .is_none());
        }
    }

    #[test]
    fn test_motion_breaks_static_window() {
        let mut d = detector();
        for i in 0..4 {
            d.observe(i as f64 * 60.0, Some(0.0), Some(700.0), Some(60.0), 60.0);
        }
        assert_eq!(d.static_len(), 4);
        d.observe(240.0, Some(12.0), Some(1200.0), Some(60.0), 60.0);
        assert_eq!(d.static_len(), 0);
    }

    #[test]
    fn test_invalid_fuel_is_skipped() {
        let mut d = detector();
        d.observe(0.0, Some(0.0), Some(700.0), Some(60.0), 60.0);
        d.observe(60.0, Some(0.0), Some(700.0), None, 60.0);
        d.observe(120.0, Some(0.0), Some(700.0), Some(f64::NAN), 60.0);
        assert_eq!(d.static_len(), 1);
    }

    #[test]
    fn test_micro_anchor_steady_cruise() {
        let mut d = detector();
        let speeds = [62.0, 63.0, 61.5, 62.5, 62.0, 63.0, 62.0];
        let mut event = None;
        for (i, speed) in speeds.iter().enumerate() {
            event = d.observe(i as f64 * 30.0, Some(*speed), Some(1500.0), Some(48.0), 48.5);
        }

        match event {
            Some(AnchorEvent::Micro {
                duration_s,
                speed_mean,
                fuel_pct,
                ..
            }) => {
                assert_eq!(duration_s, 180.0);
                assert!((speed_mean - 62.2857).abs() < 1e-3);
                assert_eq!(fuel_pct, 48.0);
            }
            other => panic!("expected micro anchor, got {other:?}"),
        }
    }

    #[test]
    fn test_micro_anchor_with_fast_ticks() {
        let mut d = detector();
        let mut emitted = Vec::new();
        for i in 0..=100 {
            let t = i as f64 * 2.0;
            let speed = 60.0 + (i % 2) as f64;
            if let Some(event) = d.observe(t, Some(speed), Some(1500.0), Some(48.0), 48.0) {
                emitted.push((t, event));
            }
        }

        assert_eq!(emitted.len(), 1);
        let (t, event) = &emitted[0];
        assert_eq!(*t, 180.0);
        assert!(matches!(event, AnchorEvent::Micro { duration_s, .. } if *duration_s == 180.0));
    }

    #[test]
    fn test_spread_covers_whole_run() {
        let mut d = detector();
        for i in 0..=100 {
            // early samples fall out of the ring but still count for spread
            let fuel = if i < 5 { 45.0 } else { 48.0 };
            let event = d.observe(i as f64 * 2.0, Some(60.0), Some(1500.0), Some(fuel), 48.0);
            assert!(event.is_none());
        }
        assert_eq!(d.micro_len(), 25);
    }

    #[test]
    fn test_micro_speed_jump_restarts_window() {
        let mut d = detector();
        for i in 0..4 {
            d.observe(i as f64 * 30.0, Some(60.0), Some(1500.0), Some(48.0), 48.0);
        }
        assert_eq!(d.micro_len(), 4);

        d.observe(120.0, Some(70.0), Some(1500.0), Some(48.0), 48.0);
        assert_eq!(d.micro_len(), 1);

        d.observe(150.0, Some(20.0), Some(1500.0), Some(48.0), 48.0);
        assert_eq!(d.micro_len(), 0);
    }
}
