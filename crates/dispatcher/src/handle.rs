//! SinkHandle - one sink behind its own queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, FuelEstimate};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Arc<FuelEstimate>>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task that owns `sink`
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an estimate without blocking
    ///
    /// Returns false if the queue was full and the estimate was dropped.
    pub fn try_send(&self, estimate: Arc<FuelEstimate>) -> bool {
        match self.tx.try_send(estimate) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(e)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    vehicle_id = %e.vehicle_id,
                    timestamp = e.timestamp,
                    "Queue full, estimate dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue and wait for the worker to flush
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<FuelEstimate>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(estimate) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&estimate).await {
            Ok(()) => metrics.inc_write_count(),
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    vehicle_id = %estimate.vehicle_id,
                    timestamp = estimate.timestamp,
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!("Sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::estimate;
    use contracts::ContractError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{Duration, sleep};

    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl DataSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _estimate: &FuelEstimate) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn mock(name: &str, should_fail: bool, delay_ms: u64) -> (MockSink, Arc<AtomicU64>) {
        let write_count = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            name: name.to_string(),
            write_count: Arc::clone(&write_count),
            should_fail,
            delay_ms,
        };
        (sink, write_count)
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let (sink, write_count) = mock("test", false, 0);
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..5 {
            assert!(handle.try_send(Arc::new(estimate("v1", i as f64))));
        }

        handle.shutdown().await;
        assert_eq!(write_count.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_sink_handle_queue_full() {
        let (sink, _) = mock("slow", false, 100);
        let handle = SinkHandle::spawn(sink, 2);

        for i in 0..10 {
            handle.try_send(Arc::new(estimate("v1", i as f64)));
        }

        assert!(handle.metrics().dropped_count() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_failure_isolation() {
        let (sink, _) = mock("failing", true, 0);
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..3 {
            handle.try_send(Arc::new(estimate("v1", i as f64)));
        }

        let metrics = Arc::clone(handle.metrics());
        handle.shutdown().await;
        assert_eq!(metrics.failure_count(), 3);
        assert_eq!(metrics.write_count(), 0);
    }
}
