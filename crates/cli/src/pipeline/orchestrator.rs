//! Pipeline orchestrator - coordinates all components.
//!
//! ```text
//! sources -> ingestion -> fleet registry -> vehicle units -> observer -> dispatcher -> sinks
//! ```
//!
//! Ticks flow until the sources run dry, the tick limit is hit, the
//! timeout expires or the shutdown future resolves. Teardown then drains
//! every stage front to back so no emitted estimate is lost.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{FleetBlueprint, FuelEstimate, VehicleId};
use fleet::{FleetContext, FleetError, FleetRegistry};
use fuel_engine::QualityProviders;
use ingestion::{
    BackpressureConfig, IngestionPipeline, MockConfig, MockScenario, MockTelemetrySource,
    ReplaySource,
};
use observability::{record_estimate_metrics, record_tick_outcome, EstimateMetricsAggregator};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::PipelineStats;

/// How long teardown waits for the observer and the sinks to flush
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where telemetry comes from
#[derive(Debug, Clone)]
pub enum TelemetryInput {
    /// JSON-lines recording
    Replay { path: PathBuf, speed: f64 },
    /// One synthetic source per configured vehicle
    Mock {
        scenario: MockScenario,
        /// Ticks per vehicle (None = until stopped)
        ticks: Option<usize>,
        seed: u64,
    },
}

impl TelemetryInput {
    fn label(&self) -> &'static str {
        match self {
            TelemetryInput::Replay { .. } => "replay",
            TelemetryInput::Mock { .. } => "mock",
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The fleet blueprint
    pub blueprint: FleetBlueprint,

    pub input: TelemetryInput,

    /// Only route ticks for this vehicle
    pub vehicle_filter: Option<String>,

    /// Maximum number of ticks to route (None = unlimited)
    pub max_ticks: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until input ends, a limit is reached or `shutdown`
    /// resolves
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_exporter(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Setup Ingestion Pipeline
        info!(input = self.config.input.label(), "Setting up ingestion pipeline...");
        let mut ingestion =
            IngestionPipeline::with_config(BackpressureConfig::from_runtime(&blueprint.runtime));
        self.register_sources(&mut ingestion)?;
        let sources = ingestion.source_count();
        info!(sources, "Ingestion pipeline configured");

        // Setup Dispatcher
        info!("Setting up dispatcher...");
        let (dispatch_tx, dispatch_rx) =
            mpsc::channel::<FuelEstimate>(blueprint.runtime.output_capacity);

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - estimates will only be counted");
        }

        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), dispatch_rx)
            .await
            .context("Failed to create dispatcher")?;
        let active_sinks = blueprint.sinks.len();
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        // Setup Fleet
        let (output_tx, output_rx) =
            mpsc::channel::<FuelEstimate>(blueprint.runtime.output_capacity);
        let observer_handle = spawn_observer(output_rx, dispatch_tx);

        let context = FleetContext::from_blueprint(blueprint, QualityProviders::standard(), output_tx);
        let mut registry = FleetRegistry::new(Arc::new(context));
        info!(
            fleet = %blueprint.fleet.name,
            vehicles = blueprint.vehicles.len(),
            allow_unknown = blueprint.runtime.allow_unknown_vehicles,
            "Fleet registry ready"
        );

        // Start Pipeline
        info!("Starting telemetry ingestion...");
        let ingestion_rx = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;
        ingestion.start_all();
        ingestion.seal();

        let mut stats = PipelineStats {
            sources,
            active_sinks,
            ..Default::default()
        };

        let max_ticks = self.config.max_ticks;
        let inactivity_timeout = blueprint.runtime.inactivity_timeout_s;
        let mut warned_unknown: HashSet<VehicleId> = HashSet::new();
        let mut latest_ts = f64::NEG_INFINITY;
        let mut next_eviction_ts = f64::NEG_INFINITY;

        let deadline = self.config.timeout.map(|t| tokio::time::Instant::now() + t);
        let timeout = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout);
        tokio::pin!(shutdown);

        info!(max_ticks = ?max_ticks, "Pipeline running");

        loop {
            let tick = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, draining pipeline...");
                    stats.interrupted = true;
                    break;
                }
                _ = &mut timeout => {
                    warn!(timeout_secs = ?self.config.timeout.map(|t| t.as_secs()), "Pipeline timed out");
                    stats.timed_out = true;
                    break;
                }
                received = ingestion_rx.recv() => match received {
                    Ok(tick) => tick,
                    Err(_) => {
                        info!("All telemetry sources finished");
                        break;
                    }
                },
            };

            stats.ticks_received += 1;

            if let Some(filter) = &self.config.vehicle_filter {
                if tick.vehicle_id != filter.as_str() {
                    stats.ticks_filtered += 1;
                    record_tick_outcome("filtered");
                    continue;
                }
            }

            if tick.timestamp.is_finite() {
                latest_ts = latest_ts.max(tick.timestamp);
            }

            match registry.route(tick).await {
                Ok(()) => {
                    stats.ticks_routed += 1;
                    record_tick_outcome("routed");
                }
                Err(FleetError::UnknownVehicle { vehicle_id }) => {
                    stats.ticks_rejected += 1;
                    record_tick_outcome("rejected");
                    let id = VehicleId::from(vehicle_id);
                    if warned_unknown.insert(id.clone()) {
                        warn!(vehicle_id = %id, "Ticks for unconfigured vehicle are rejected");
                    }
                }
                Err(e) => {
                    stats.ticks_rejected += 1;
                    record_tick_outcome("rejected");
                    warn!(error = %e, "Failed to route tick");
                }
            }

            if inactivity_timeout > 0.0 && latest_ts >= next_eviction_ts {
                let evicted = registry.evict_inactive(latest_ts - inactivity_timeout).await;
                stats.vehicles_evicted += evicted.len() as u64;
                next_eviction_ts = latest_ts + inactivity_timeout / 2.0;
            }

            if let Some(max) = max_ticks {
                if stats.ticks_routed >= max {
                    info!(ticks = stats.ticks_routed, "Reached max ticks limit");
                    break;
                }
            }
        }

        // Shutdown
        info!("Shutting down pipeline...");
        ingestion.stop_all();
        stats.ingestion = ingestion.metrics().snapshot();
        drop(ingestion_rx);

        stats.units = registry.shutdown().await;

        match tokio::time::timeout(DRAIN_TIMEOUT, observer_handle).await {
            Ok(Ok(aggregator)) => stats.estimates = aggregator,
            Ok(Err(e)) => warn!(error = %e, "Estimate observer task failed"),
            Err(_) => warn!("Timed out waiting for estimate observer"),
        }

        match tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(sinks)) => stats.sinks = sinks,
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Timed out waiting for sinks to flush"),
        }

        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            ticks_per_sec = format!("{:.2}", stats.ticks_per_sec()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    fn register_sources(&self, ingestion: &mut IngestionPipeline) -> Result<()> {
        let blueprint = &self.config.blueprint;

        match &self.config.input {
            TelemetryInput::Replay { path, speed } => {
                info!(path = %path.display(), speed, "Running in REPLAY mode");
                let source = ReplaySource::open(path)
                    .with_context(|| format!("Failed to open replay file {}", path.display()))?
                    .with_speed(*speed);
                ingestion.register_source(Box::new(source), None)?;
            }
            TelemetryInput::Mock {
                scenario,
                ticks,
                seed,
            } => {
                info!(scenario = %scenario, "Running in MOCK mode");
                let vehicles = blueprint.vehicles.iter().filter(|v| {
                    match self.config.vehicle_filter.as_deref() {
                        Some(filter) => v.id == filter,
                        None => true,
                    }
                });

                for (idx, vehicle) in vehicles.enumerate() {
                    let config = MockConfig {
                        seed: seed.wrapping_add(idx as u64),
                        ticks: *ticks,
                        tank_capacity_liters: vehicle.tank_capacity_liters,
                        ..MockConfig::scenario(vehicle.id.clone(), *scenario)
                    };
                    debug!(vehicle_id = %vehicle.id, seed = config.seed, "Registering mock source");
                    ingestion.register_source(Box::new(MockTelemetrySource::new(config)), None)?;
                }
            }
        }

        if ingestion.source_count() == 0 {
            anyhow::bail!("No telemetry sources registered");
        }
        Ok(())
    }
}

/// Record every emitted estimate and forward it to the dispatcher
fn spawn_observer(
    mut output_rx: mpsc::Receiver<FuelEstimate>,
    dispatch_tx: mpsc::Sender<FuelEstimate>,
) -> JoinHandle<EstimateMetricsAggregator> {
    tokio::spawn(async move {
        let mut aggregator = EstimateMetricsAggregator::new();
        let mut dispatcher_open = true;

        while let Some(estimate) = output_rx.recv().await {
            record_estimate_metrics(&estimate);
            aggregator.update(&estimate);

            if dispatcher_open && dispatch_tx.send(estimate).await.is_err() {
                warn!("Dispatcher channel closed");
                dispatcher_open = false;
            }
        }

        aggregator
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, EstimatorConfig, FleetConfig, RuntimeConfig, SinkConfig, SinkType,
        VehicleConfig,
    };
    use std::collections::HashMap;

    fn blueprint(vehicles: &[&str]) -> FleetBlueprint {
        FleetBlueprint {
            version: ConfigVersion::V1,
            fleet: FleetConfig {
                name: "test".into(),
            },
            vehicles: vehicles
                .iter()
                .map(|id| VehicleConfig {
                    id: (*id).into(),
                    tank_capacity_liters: 757.0,
                    calibration: None,
                })
                .collect(),
            estimator: EstimatorConfig::default(),
            runtime: RuntimeConfig::default(),
            sinks: vec![],
        }
    }

    fn mock_config(vehicles: &[&str], ticks: usize) -> PipelineConfig {
        PipelineConfig {
            blueprint: blueprint(vehicles),
            input: TelemetryInput::Mock {
                scenario: MockScenario::Highway,
                ticks: Some(ticks),
                seed: 7,
            },
            vehicle_filter: None,
            max_ticks: None,
            timeout: Some(Duration::from_secs(30)),
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn test_mock_run_drains_every_tick() {
        let pipeline = Pipeline::new(mock_config(&["t1", "t2"], 20));
        let stats = pipeline.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.sources, 2);
        assert_eq!(stats.ticks_received, 40);
        assert_eq!(stats.ticks_routed, 40);
        assert_eq!(stats.units.len(), 2);
        assert!(stats.estimates.total_estimates > 0);
        assert!(!stats.interrupted);
        assert!(!stats.timed_out);
    }

    #[tokio::test]
    async fn test_vehicle_filter_limits_mock_sources() {
        let mut config = mock_config(&["t1", "t2"], 10);
        config.vehicle_filter = Some("t2".into());

        let stats = Pipeline::new(config).run(std::future::pending()).await.unwrap();

        assert_eq!(stats.sources, 1);
        assert_eq!(stats.ticks_routed, 10);
        assert!(stats.units.contains_key("t2"));
        assert!(!stats.units.contains_key("t1"));
    }

    #[tokio::test]
    async fn test_max_ticks_stops_early() {
        let mut config = mock_config(&["t1"], 100);
        config.max_ticks = Some(5);

        let stats = Pipeline::new(config).run(std::future::pending()).await.unwrap();
        assert_eq!(stats.ticks_routed, 5);
    }

    #[tokio::test]
    async fn test_shutdown_signal_interrupts() {
        let mut config = mock_config(&["t1"], 0);
        config.input = TelemetryInput::Mock {
            scenario: MockScenario::Highway,
            ticks: None,
            seed: 1,
        };

        let stats = Pipeline::new(config)
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(stats.interrupted);
    }

    #[tokio::test]
    async fn test_replay_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ticks.jsonl");
        let output = dir.path().join("estimates.jsonl");

        let lines: Vec<String> = (0..5)
            .map(|i| {
                format!(
                    r#"{{"vehicle_id":"t1","timestamp":{},"measured_fuel_pct":{}}}"#,
                    1_700_000_000 + i * 60,
                    70.0 - i as f64 * 0.1
                )
            })
            .chain(std::iter::once(
                r#"{"vehicle_id":"ghost","timestamp":1700000000,"measured_fuel_pct":50.0}"#
                    .to_string(),
            ))
            .collect();
        std::fs::write(&input, lines.join("\n")).unwrap();

        let mut config = mock_config(&["t1"], 0);
        config.input = TelemetryInput::Replay {
            path: input,
            speed: 0.0,
        };
        config.blueprint.sinks = vec![SinkConfig {
            name: "out".into(),
            sink_type: SinkType::File,
            queue_capacity: 16,
            params: HashMap::from([("path".to_string(), output.display().to_string())]),
        }];

        let stats = Pipeline::new(config).run(std::future::pending()).await.unwrap();

        assert_eq!(stats.ticks_received, 6);
        assert_eq!(stats.ticks_routed, 5);
        assert_eq!(stats.ticks_rejected, 1);
        assert_eq!(stats.estimates.total_estimates, 5);

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_missing_replay_file_fails() {
        let mut config = mock_config(&["t1"], 0);
        config.input = TelemetryInput::Replay {
            path: PathBuf::from("/nonexistent/ticks.jsonl"),
            speed: 0.0,
        };
        assert!(Pipeline::new(config).run(std::future::pending()).await.is_err());
    }
}
