//! Ingestion Pipeline main entry

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use contracts::{TelemetrySource, TelemetryTick};
use tracing::{debug, info, instrument};

use crate::adapter::SourceAdapter;
use crate::config::{BackpressureConfig, IngestionMetrics};
use crate::error::{IngestionError, Result};

/// Merges every registered telemetry source into one bounded channel
pub struct IngestionPipeline {
    adapters: Vec<SourceAdapter>,
    metrics: Arc<IngestionMetrics>,
    /// Dropped by `seal` so the receiver closes once every source is done
    tx: Option<Sender<TelemetryTick>>,
    rx: Option<Receiver<TelemetryTick>>,
    default_config: BackpressureConfig,
}

impl IngestionPipeline {
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_config(BackpressureConfig {
            channel_capacity,
            ..Default::default()
        })
    }

    pub fn with_config(config: BackpressureConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));

        Self {
            adapters: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx: Some(tx),
            rx: Some(rx),
            default_config: config,
        }
    }

    /// Register a telemetry source
    ///
    /// Source ids must be unique.
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source, config),
        fields(source_id = %source.source_id())
    )]
    pub fn register_source(
        &mut self,
        source: Box<dyn TelemetrySource>,
        config: Option<BackpressureConfig>,
    ) -> Result<()> {
        if self.adapters.iter().any(|a| a.source_id() == source.source_id()) {
            return Err(IngestionError::DuplicateSource {
                source_id: source.source_id().to_string(),
            });
        }
        let adapter =
            SourceAdapter::new(source, config.unwrap_or_else(|| self.default_config.clone()));
        debug!(source_id = %adapter.source_id(), "registered telemetry source");
        self.adapters.push(adapter);
        Ok(())
    }

    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        info!(count = self.adapters.len(), "starting all telemetry sources");
        for adapter in &self.adapters {
            if !adapter.is_listening() {
                adapter.start(tx.clone(), self.metrics.clone());
            }
        }
    }

    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        for adapter in &self.adapters {
            adapter.stop();
        }
    }

    /// Release the pipeline's own sender
    ///
    /// After this, the receiver closes as soon as every started source has
    /// finished. Sources can no longer be started.
    pub fn seal(&mut self) {
        self.tx = None;
    }

    /// Take the merged tick stream (only once)
    pub fn take_receiver(&mut self) -> Option<Receiver<TelemetryTick>> {
        self.rx.take()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn source_count(&self) -> usize {
        self.adapters.len()
    }

    /// Whether every registered source has produced all it will produce
    pub fn all_finished(&self) -> bool {
        self.adapters.iter().all(|a| a.is_finished())
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
