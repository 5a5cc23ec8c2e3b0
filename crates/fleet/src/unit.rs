//! VehicleUnit - one vehicle's estimator behind a mailbox and worker task

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{FuelEstimate, TelemetryTick, VehicleId};
use fuel_engine::{TickError, TickOutcome, VehicleEstimator};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

/// Counters for a single vehicle unit
#[derive(Debug, Default)]
pub struct UnitStats {
    /// Ticks taken from the mailbox
    ticks: AtomicU64,
    /// Estimates handed to the output channel
    estimates: AtomicU64,
    /// Ticks rejected (out of order, invalid timestamp)
    rejected: AtomicU64,
    /// Estimates dropped because the output channel was full
    dropped: AtomicU64,
    /// Last routed tick timestamp (f64 bits)
    last_seen: AtomicU64,
}

impl UnitStats {
    pub fn new() -> Self {
        Self {
            last_seen: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
            ..Default::default()
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn estimates(&self) -> u64 {
        self.estimates.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn last_seen(&self) -> f64 {
        f64::from_bits(self.last_seen.load(Ordering::Relaxed))
    }

    fn touch(&self, timestamp: f64) {
        if timestamp > self.last_seen() {
            self.last_seen.store(timestamp.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            ticks: self.ticks(),
            estimates: self.estimates(),
            rejected: self.rejected(),
            dropped: self.dropped(),
            last_seen: self.last_seen(),
        }
    }
}

/// Snapshot of unit counters (for reporting)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSnapshot {
    pub ticks: u64,
    pub estimates: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub last_seen: f64,
}

/// Handle to a running vehicle unit
pub struct VehicleUnit {
    vehicle_id: VehicleId,
    tx: mpsc::Sender<TelemetryTick>,
    stats: Arc<UnitStats>,
    worker_handle: JoinHandle<()>,
}

impl VehicleUnit {
    /// Spawn the worker task that exclusively owns `estimator`
    pub fn spawn(
        estimator: VehicleEstimator,
        mailbox_capacity: usize,
        output: mpsc::Sender<FuelEstimate>,
    ) -> Self {
        let vehicle_id = estimator.vehicle_id().clone();
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let stats = Arc::new(UnitStats::new());

        let worker_stats = Arc::clone(&stats);
        let worker_handle = tokio::spawn(async move {
            unit_worker(estimator, rx, output, worker_stats).await;
        });

        Self {
            vehicle_id,
            tx,
            stats,
            worker_handle,
        }
    }

    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    pub fn stats(&self) -> &Arc<UnitStats> {
        &self.stats
    }

    /// Tick timestamp of the most recent routed tick
    pub fn last_seen(&self) -> f64 {
        self.stats.last_seen()
    }

    /// Queue a tick, waiting for mailbox space so ticks stay in order
    ///
    /// Returns false if the worker has stopped.
    pub async fn send(&self, tick: TelemetryTick) -> bool {
        self.stats.touch(tick.timestamp);
        self.tx.send(tick).await.is_ok()
    }

    /// Close the mailbox and wait for queued ticks to drain
    #[instrument(name = "vehicle_unit_shutdown", skip(self), fields(vehicle_id = %self.vehicle_id))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(vehicle_id = %self.vehicle_id, error = ?e, "Unit worker panicked");
        }
        debug!(vehicle_id = %self.vehicle_id, "VehicleUnit shutdown complete");
    }
}

#[instrument(
    name = "vehicle_unit_loop",
    skip(estimator, rx, output, stats),
    fields(vehicle_id = %estimator.vehicle_id())
)]
async fn unit_worker(
    mut estimator: VehicleEstimator,
    mut rx: mpsc::Receiver<TelemetryTick>,
    output: mpsc::Sender<FuelEstimate>,
    stats: Arc<UnitStats>,
) {
    debug!("Vehicle unit started");

    while let Some(tick) = rx.recv().await {
        stats.ticks.fetch_add(1, Ordering::Relaxed);

        match estimator.process(&tick) {
            Ok(TickOutcome::Estimated(estimate)) => hand_off(&output, estimate, &stats),
            Ok(TickOutcome::AwaitingInitialization) => {
                debug!(timestamp = tick.timestamp, "Awaiting first valid reading");
            }
            Err(e @ TickError::OutOfOrder { .. }) => {
                stats.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Tick rejected");
            }
            Err(e) => {
                stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, timestamp = tick.timestamp, "Tick rejected");
            }
        }
    }

    debug!("Vehicle unit stopped");
}

/// Non-blocking hand-off; a full output channel drops the estimate
fn hand_off(output: &mpsc::Sender<FuelEstimate>, estimate: FuelEstimate, stats: &UnitStats) {
    match output.try_send(estimate) {
        Ok(()) => {
            stats.estimates.fetch_add(1, Ordering::Relaxed);
        }
        Err(mpsc::error::TrySendError::Full(e)) => {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("fuel_estimates_dropped_total").increment(1);
            warn!(timestamp = e.timestamp, "Output queue full, estimate dropped");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Output channel closed, estimate discarded");
        }
    }
}
