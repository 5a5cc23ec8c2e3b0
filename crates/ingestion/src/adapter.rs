//! SourceAdapter - connects a `TelemetrySource` callback to the pipeline channel

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{Sender, TrySendError};
use contracts::{DropPolicy, TelemetryCallback, TelemetrySource, TelemetryTick};
use tracing::{debug, trace, warn};

use crate::config::{BackpressureConfig, IngestionMetrics};

pub struct SourceAdapter {
    source: Box<dyn TelemetrySource>,
    config: BackpressureConfig,
    listening: Arc<AtomicBool>,
}

impl SourceAdapter {
    pub fn new(source: Box<dyn TelemetrySource>, config: BackpressureConfig) -> Self {
        Self {
            source,
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    pub fn start(&self, tx: Sender<TelemetryTick>, metrics: Arc<IngestionMetrics>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let source_id = self.source.source_id().to_string();
        let drop_policy = self.config.drop_policy;
        let listening = self.listening.clone();

        debug!(source_id = %source_id, ?drop_policy, "starting source adapter");

        let callback: TelemetryCallback = Arc::new(move |tick| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            metrics.record_received();
            metrics::counter!("fuel_ticks_received_total", "source" => source_id.clone())
                .increment(1);
            send_tick(&tx, tick, &metrics, &source_id, drop_policy);
            metrics.observe_queue_len(tx.len());
        });

        self.source.listen(callback);
    }

    pub fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(source_id = %self.source.source_id(), "stopping source adapter");
            self.source.stop();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
    }
}

/// Send a tick, applying the drop policy when the channel is full
///
/// Called from source threads, so `Block` uses the blocking send.
fn send_tick(
    tx: &Sender<TelemetryTick>,
    tick: TelemetryTick,
    metrics: &IngestionMetrics,
    source_id: &str,
    drop_policy: DropPolicy,
) {
    match drop_policy {
        DropPolicy::Block => {
            if tx.send_blocking(tick).is_err() {
                trace!(source_id = %source_id, "channel closed");
            }
        }
        DropPolicy::DropNewest => match tx.try_send(tick) {
            Ok(()) => {}
            Err(TrySendError::Full(tick)) => {
                metrics.record_dropped();
                metrics::counter!("fuel_ticks_dropped_total").increment(1);
                trace!(
                    source_id = %source_id,
                    vehicle_id = %tick.vehicle_id,
                    timestamp = tick.timestamp,
                    "tick dropped (newest)"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!(source_id = %source_id, "channel closed");
            }
        },
    }
}
