//! Channel sizing, drop policy and the counters every adapter feeds

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::RuntimeConfig;
pub use contracts::DropPolicy;

/// How the merged tick channel behaves under load
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    pub channel_capacity: usize,
    pub drop_policy: DropPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self::new(1024, DropPolicy::Block)
    }
}

impl BackpressureConfig {
    pub fn new(channel_capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            drop_policy,
        }
    }

    /// Size the tick channel like the estimate channel
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self::new(runtime.output_capacity, runtime.drop_policy)
    }
}

/// Ingestion counters shared by every source adapter
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    ticks_received: AtomicU64,
    ticks_dropped: AtomicU64,
    queue_len: AtomicUsize,
    peak_queue_len: AtomicUsize,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.ticks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.ticks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Store the current channel depth and keep the high-water mark
    pub fn observe_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        self.peak_queue_len.fetch_max(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_received: self.ticks_received.load(Ordering::Relaxed),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            peak_queue_len: self.peak_queue_len.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub ticks_received: u64,
    pub ticks_dropped: u64,
    pub queue_len: usize,
    pub peak_queue_len: usize,
}

impl MetricsSnapshot {
    /// Share of received ticks that never reached the channel (percent)
    pub fn drop_rate(&self) -> f64 {
        if self.ticks_received == 0 {
            0.0
        } else {
            self.ticks_dropped as f64 / self.ticks_received as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_queue_len_is_kept() {
        let m = IngestionMetrics::new();
        m.observe_queue_len(5);
        m.observe_queue_len(12);
        m.observe_queue_len(3);

        let snap = m.snapshot();
        assert_eq!(snap.queue_len, 3);
        assert_eq!(snap.peak_queue_len, 12);
    }

    #[test]
    fn test_drop_rate() {
        let m = IngestionMetrics::new();
        assert_eq!(m.snapshot().drop_rate(), 0.0);
        for _ in 0..4 {
            m.record_received();
        }
        m.record_dropped();
        assert!((m.snapshot().drop_rate() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_runtime() {
        let runtime = RuntimeConfig {
            output_capacity: 64,
            drop_policy: DropPolicy::DropNewest,
            ..Default::default()
        };
        let config = BackpressureConfig::from_runtime(&runtime);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.drop_policy, DropPolicy::DropNewest);
        assert_eq!(BackpressureConfig::new(0, DropPolicy::Block).channel_capacity, 1);
    }
}
