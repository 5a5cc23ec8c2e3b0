//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Config contract round trips
//! - Mock telemetry -> fleet -> dispatcher runs (no live feed needed)
//! - Randomised estimator invariants

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    const FLEET_TOML: &str = r#"
[fleet]
name = "north"

[[vehicles]]
id = "t1"
tank_capacity_liters = 757.0

[estimator.recovery]
cooldown_s = 900.0

[runtime]
allow_unknown_vehicles = true
drop_policy = "drop_newest"

[[sinks]]
name = "console"
sink_type = "log"
"#;

    #[test]
    fn test_blueprint_survives_json_round_trip() {
        let bp = ConfigLoader::load_from_str(FLEET_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        assert_eq!(again.estimator.recovery.cooldown_s, 900.0);
        assert_eq!(again.estimator.noise.bias_window, bp.estimator.noise.bias_window);
        assert_eq!(again.runtime.drop_policy, contracts::DropPolicy::DropNewest);
        assert_eq!(again.vehicles.len(), 1);
    }

    #[test]
    fn test_estimate_json_shape() {
        let estimate = crate::support::estimates_for_highway(5)
            .pop()
            .expect("highway run emits estimates");
        let json = serde_json::to_value(&estimate).unwrap();

        assert_eq!(json["vehicle_id"], "t1");
        assert_eq!(json["operating_state"], "moving");
        assert_eq!(json["recovery"], "none");
        assert!(json.get("theft_flag").is_none());
    }
}

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ConfigVersion, EstimatorConfig, FleetBlueprint, FleetConfig, FuelEstimate, RuntimeConfig,
        VehicleConfig, VehicleId,
    };
    use fleet::{FleetContext, FleetRegistry, UnitSnapshot};
    use fuel_engine::{QualityProviders, TickOutcome, VehicleEstimator, VehicleSettings};
    use ingestion::{IngestionPipeline, MockConfig, MockScenario, MockTelemetrySource};
    use tokio::sync::mpsc;

    pub const TANK: f64 = 757.0;

    pub fn blueprint(vehicles: &[&str]) -> FleetBlueprint {
        FleetBlueprint {
            version: ConfigVersion::V1,
            fleet: FleetConfig {
                name: "it".into(),
            },
            vehicles: vehicles
                .iter()
                .map(|id| VehicleConfig {
                    id: (*id).into(),
                    tank_capacity_liters: TANK,
                    calibration: None,
                })
                .collect(),
            estimator: EstimatorConfig::default(),
            runtime: RuntimeConfig::default(),
            sinks: vec![],
        }
    }

    pub fn mock(vehicle: &str, scenario: MockScenario, ticks: usize) -> MockConfig {
        MockConfig {
            ticks: Some(ticks),
            ..MockConfig::scenario(vehicle, scenario)
        }
    }

    /// Ingest every mock source through the fleet and collect what comes out
    pub async fn run_fleet(
        blueprint: &FleetBlueprint,
        sources: Vec<MockConfig>,
    ) -> (Vec<FuelEstimate>, HashMap<VehicleId, UnitSnapshot>) {
        let mut ingestion = IngestionPipeline::new(1024);
        for config in sources {
            ingestion
                .register_source(Box::new(MockTelemetrySource::new(config)), None)
                .unwrap();
        }
        let rx = ingestion.take_receiver().unwrap();
        ingestion.start_all();
        ingestion.seal();

        let (output_tx, mut output_rx) = mpsc::channel(8192);
        let context = FleetContext::from_blueprint(blueprint, QualityProviders::standard(), output_tx);
        let mut registry = FleetRegistry::new(Arc::new(context));

        let collector = tokio::spawn(async move {
            let mut estimates = Vec::new();
            while let Some(estimate) = output_rx.recv().await {
                estimates.push(estimate);
            }
            estimates
        });

        let routing = async {
            while let Ok(tick) = rx.recv().await {
                registry.route(tick).await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(10), routing)
            .await
            .expect("mock sources should finish");

        let units = registry.shutdown().await;
        let estimates = collector.await.unwrap();
        (estimates, units)
    }

    /// Run a highway scenario synchronously through one estimator
    pub fn estimates_for_highway(ticks: usize) -> Vec<FuelEstimate> {
        let mut vehicle = VehicleEstimator::new(
            "t1".into(),
            &VehicleSettings {
                tank_capacity_liters: TANK,
                calibration: None,
            },
            &EstimatorConfig::default(),
            QualityProviders::standard(),
        )
        .unwrap();

        ingestion::ScenarioGenerator::new(mock("t1", MockScenario::Highway, ticks))
            .filter_map(|tick| match vehicle.process(&tick).unwrap() {
                TickOutcome::Estimated(estimate) => Some(estimate),
                TickOutcome::AwaitingInitialization => None,
            })
            .collect()
    }

    pub fn for_vehicle<'a>(
        estimates: &'a [FuelEstimate],
        vehicle: &'a str,
    ) -> impl Iterator<Item = &'a FuelEstimate> + 'a {
        estimates.iter().filter(move |e| e.vehicle_id == vehicle)
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;

    use contracts::{AnchorEvent, FuelEstimate, RecoveryAction, SinkConfig, SinkType};
    use dispatcher::create_dispatcher;
    use ingestion::{MockScenario, ScenarioGenerator};
    use observability::EstimateMetricsAggregator;
    use tokio::sync::mpsc;

    use crate::support::{blueprint, for_vehicle, mock, run_fleet, TANK};

    const START: f64 = 1_700_000_000.0;
    const INTERVAL: f64 = 60.0;

    /// Mock highway drive -> fleet: the estimate follows the simulated tank
    #[tokio::test]
    async fn test_highway_tracks_true_level() {
        let config = mock("t1", MockScenario::Highway, 120);
        let mut truth = ScenarioGenerator::new(config.clone());
        truth.by_ref().for_each(drop);

        let (estimates, units) = run_fleet(&blueprint(&["t1"]), vec![config]).await;

        assert_eq!(estimates.len(), 120);
        assert!(estimates
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        assert!(estimates.iter().all(|e| e.theft_flag.is_none()));

        let last = estimates.last().unwrap();
        assert!(
            (last.level_pct - truth.true_level_pct()).abs() < 3.0,
            "estimate {:.2}% vs true {:.2}%",
            last.level_pct,
            truth.true_level_pct()
        );
        assert!(last.level_pct < estimates[0].level_pct);
        assert!(last.consumption_lph > 10.0);

        let unit = units.get("t1").unwrap();
        assert_eq!(unit.ticks, 120);
        assert_eq!(unit.estimates, 120);
        assert_eq!(unit.dropped, 0);
    }

    /// Fuel vanishing while parked is held and flagged
    #[tokio::test]
    async fn test_parked_theft_is_flagged_and_held() {
        let (estimates, _) = run_fleet(
            &blueprint(&["t1"]),
            vec![mock("t1", MockScenario::ParkedTheft, 120)],
        )
        .await;

        let event_ts = START + 60.0 * INTERVAL;
        assert!(estimates
            .iter()
            .filter(|e| e.timestamp < event_ts)
            .all(|e| e.theft_flag.is_none()));

        let flagged = estimates
            .iter()
            .find(|e| e.theft_flag.is_some())
            .expect("theft should be flagged");
        assert_eq!(flagged.timestamp, event_ts);
        assert_eq!(flagged.recovery, RecoveryAction::TheftHold);
        assert!((flagged.level_pct - 80.0).abs() < 1.0);

        let flag = flagged.theft_flag.unwrap();
        assert!(flag.drift_pct > 15.0);
        assert!(flag.estimated_gallons_lost > 0.0);
    }

    /// A jump while stopped becomes a refuel anchor and resets the level
    #[tokio::test]
    async fn test_refuel_emits_anchor() {
        let (estimates, _) = run_fleet(
            &blueprint(&["t1"]),
            vec![mock("t1", MockScenario::Refuel, 120)],
        )
        .await;

        let refuel = estimates
            .iter()
            .find(|e| matches!(e.anchor_event, Some(AnchorEvent::Refuel { .. })))
            .expect("refuel anchor expected");

        assert_eq!(refuel.timestamp, START + 60.0 * INTERVAL);
        assert!((refuel.level_pct - 95.0).abs() < 0.5);
        match refuel.anchor_event {
            Some(AnchorEvent::Refuel { gallons_added, .. }) => assert!(gallons_added > 20.0),
            _ => unreachable!(),
        }
        assert!(refuel.theft_flag.is_none());
    }

    /// Vehicles share nothing: one theft does not leak into another unit
    #[tokio::test]
    async fn test_vehicles_are_isolated() {
        let (estimates, units) = run_fleet(
            &blueprint(&["a", "b"]),
            vec![
                mock("a", MockScenario::Highway, 80),
                mock("b", MockScenario::ParkedTheft, 80),
            ],
        )
        .await;

        assert_eq!(units.len(), 2);
        assert_eq!(for_vehicle(&estimates, "a").count(), 80);
        assert_eq!(for_vehicle(&estimates, "b").count(), 80);
        assert!(for_vehicle(&estimates, "a").all(|e| e.theft_flag.is_none()));
        assert!(for_vehicle(&estimates, "b").any(|e| e.theft_flag.is_some()));

        for vehicle in ["a", "b"] {
            let ts: Vec<f64> = for_vehicle(&estimates, vehicle).map(|e| e.timestamp).collect();
            assert!(ts.windows(2).all(|w| w[0] < w[1]), "{vehicle} out of order");
        }
    }

    /// Missing readings never stall the unit; each tick still yields an estimate
    #[tokio::test]
    async fn test_sensor_dropout_keeps_estimating() {
        let (estimates, units) = run_fleet(
            &blueprint(&["t1"]),
            vec![mock("t1", MockScenario::SensorDropout, 120)],
        )
        .await;

        let unit = units.get("t1").unwrap();
        assert_eq!(unit.ticks, 120);
        assert_eq!(unit.rejected, 0);
        // only a leading run of missing readings can delay the first estimate
        assert!(estimates.len() > 100);
        assert!(estimates.iter().any(|e| e.gps_quality.is_none()));
    }

    /// Fleet output -> dispatcher -> file sink, read back as JSON lines
    #[tokio::test]
    async fn test_estimates_reach_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estimates.jsonl");

        let (estimates, _) = run_fleet(
            &blueprint(&["t1"]),
            vec![mock("t1", MockScenario::Refuel, 90)],
        )
        .await;

        let (tx, rx) = mpsc::channel::<FuelEstimate>(16);
        let sinks = vec![
            SinkConfig {
                name: "file".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 256,
                params: HashMap::from([("path".to_string(), path.display().to_string())]),
            },
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 256,
                params: HashMap::new(),
            },
        ];
        let dispatcher = create_dispatcher(sinks, rx).await.unwrap();
        let handle = dispatcher.spawn();

        let mut aggregator = EstimateMetricsAggregator::new();
        for estimate in &estimates {
            aggregator.update(estimate);
            tx.send(estimate.clone()).await.unwrap();
        }
        drop(tx);

        let summary = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("dispatcher should drain")
            .unwrap();
        let file_metrics = &summary.iter().find(|(name, _)| name == "file").unwrap().1;
        assert_eq!(file_metrics.write_count, estimates.len() as u64);
        assert_eq!(file_metrics.lost(), 0);

        let written: Vec<FuelEstimate> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(written.len(), estimates.len());
        assert!(written
            .iter()
            .zip(&estimates)
            .all(|(w, e)| w.vehicle_id == e.vehicle_id
                && w.timestamp == e.timestamp
                && w.recovery == e.recovery));
        assert!(written
            .iter()
            .any(|e| matches!(e.anchor_event, Some(AnchorEvent::Refuel { .. }))));

        let run = aggregator.summary();
        assert_eq!(run.total_estimates, 90);
        assert_eq!(run.anchors.get("refuel"), Some(&1));
    }

    /// Unknown vehicles are served with the runtime default tank when allowed
    #[tokio::test]
    async fn test_unknown_vehicle_default_capacity() {
        let mut bp = blueprint(&[]);
        bp.runtime.allow_unknown_vehicles = true;
        bp.runtime.default_tank_capacity_liters = TANK / 2.0;

        let (estimates, _) =
            run_fleet(&bp, vec![mock("stray", MockScenario::ParkedTheft, 10)]).await;

        assert_eq!(estimates.len(), 10);
        let first = &estimates[0];
        assert!((first.level_liters - first.level_pct / 100.0 * TANK / 2.0).abs() < 1e-6);
    }
}

#[cfg(test)]
mod property_tests {
    use contracts::{EstimatorConfig, FuelEstimate, TelemetryTick};
    use fuel_engine::{QualityProviders, TickError, TickOutcome, VehicleEstimator, VehicleSettings};
    use ingestion::{MockScenario, ScenarioGenerator};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::support::{mock, TANK};

    fn estimator(quality: QualityProviders) -> VehicleEstimator {
        VehicleEstimator::new(
            "p".into(),
            &VehicleSettings {
                tank_capacity_liters: TANK,
                calibration: Some(Default::default()),
            },
            &EstimatorConfig::default(),
            quality,
        )
        .unwrap()
    }

    fn assert_invariants(e: &FuelEstimate) {
        assert!((0.0..=100.0).contains(&e.level_pct), "level {}", e.level_pct);
        assert!((0.0..=TANK).contains(&e.level_liters), "liters {}", e.level_liters);
        assert!(e.covariance.is_finite() && e.covariance >= 0.0, "P {}", e.covariance);
        assert!((0.0..=1.0).contains(&e.kalman_gain), "gain {}", e.kalman_gain);
        assert!(e.confidence.score > 0.0 && e.confidence.score <= 1.0);
        assert!(e.drift_pct.is_finite());
        assert!(e.consumption_lph.is_finite() && e.consumption_lph >= 0.0);
        assert!(e.sensor_quality_factor >= 1.0);
    }

    /// Arbitrary, often hostile telemetry
    fn random_tick(rng: &mut StdRng, timestamp: f64, ecu: &mut f64) -> TelemetryTick {
        let moving = rng.random_bool(0.5);
        let measured = match rng.random_range(0..10) {
            0 => None,
            1 => Some(f64::NAN),
            2 => Some(rng.random_range(-20.0..130.0)),
            _ => Some(rng.random_range(0.0..100.0)),
        };
        if rng.random_bool(0.05) {
            *ecu = rng.random_range(0.0..500.0);
        } else {
            *ecu += rng.random_range(0.0..2.0);
        }

        TelemetryTick {
            measured_fuel_pct: measured,
            speed_mph: rng
                .random_bool(0.9)
                .then(|| if moving { rng.random_range(5.0..80.0) } else { 0.0 }),
            rpm: rng
                .random_bool(0.9)
                .then(|| if moving { rng.random_range(900.0..2200.0) } else { 0.0 }),
            ecu_total_fuel_used: rng.random_bool(0.8).then_some(*ecu),
            gps_satellites: rng.random_bool(0.7).then(|| rng.random_range(0..14)),
            battery_voltage: rng.random_bool(0.7).then(|| rng.random_range(10.5..14.5)),
            altitude: rng.random_bool(0.5).then(|| rng.random_range(0.0..2000.0)),
            hdop: rng.random_bool(0.5).then(|| rng.random_range(0.5..8.0)),
            engine_load_pct: rng.random_bool(0.5).then(|| rng.random_range(0.0..100.0)),
            trip_active: rng.random_bool(0.5).then(|| moving),
            ..TelemetryTick::new("p", timestamp)
        }
    }

    #[test]
    fn test_random_telemetry_keeps_estimates_bounded() {
        for seed in 0..25u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut vehicle = estimator(QualityProviders::standard());
            let mut timestamp = 1_700_000_000.0;
            let mut ecu = 100.0;

            for _ in 0..300 {
                // mostly regular polling, sometimes hours offline
                timestamp += if rng.random_bool(0.03) {
                    rng.random_range(3_600.0..20_000.0)
                } else {
                    rng.random_range(1.0..600.0)
                };
                let tick = random_tick(&mut rng, timestamp, &mut ecu);

                match vehicle.process(&tick) {
                    Ok(TickOutcome::Estimated(e)) => assert_invariants(&e),
                    Ok(TickOutcome::AwaitingInitialization) => {}
                    Err(err) => panic!("seed {seed}: unexpected error {err:?}"),
                }
            }
        }
    }

    #[test]
    fn test_stale_ticks_never_change_state() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut vehicle = estimator(QualityProviders::neutral());
        let mut timestamp = 0.0;
        let mut ecu = 100.0;

        for _ in 0..200 {
            timestamp += rng.random_range(1.0..300.0);
            let tick = random_tick(&mut rng, timestamp, &mut ecu);
            vehicle.process(&tick).unwrap();

            let level = vehicle.filter().level_liters();
            let covariance = vehicle.filter().covariance();

            let stale_ts = timestamp - rng.random_range(0.0..100.0);
            let stale = random_tick(&mut rng, stale_ts, &mut ecu.clone());
            assert!(matches!(
                vehicle.process(&stale),
                Err(TickError::OutOfOrder { .. })
            ));
            assert_eq!(vehicle.filter().level_liters(), level);
            assert_eq!(vehicle.filter().covariance(), covariance);
            assert_eq!(vehicle.last_timestamp(), Some(timestamp));
        }
    }

    #[test]
    fn test_every_scenario_keeps_invariants() {
        for scenario in MockScenario::ALL {
            for seed in 0..5u64 {
                let mut vehicle = estimator(QualityProviders::standard());
                let config = ingestion::MockConfig {
                    seed,
                    ..mock("p", scenario, 150)
                };

                let mut emitted = 0;
                for tick in ScenarioGenerator::new(config) {
                    if let TickOutcome::Estimated(e) = vehicle.process(&tick).unwrap() {
                        assert_invariants(&e);
                        emitted += 1;
                    }
                }
                assert!(emitted > 100, "{scenario} seed {seed}: {emitted} estimates");
            }
        }
    }

    #[test]
    fn test_constant_reading_converges() {
        let mut vehicle = estimator(QualityProviders::neutral());
        let mut last = None;
        for i in 0..200 {
            let tick = TelemetryTick {
                measured_fuel_pct: Some(40.0),
                speed_mph: Some(0.0),
                rpm: Some(0.0),
                ..TelemetryTick::new("p", i as f64 * 60.0)
            };
            last = vehicle.process(&tick).unwrap().estimate().cloned();
        }

        let last = last.unwrap();
        assert!((last.level_pct - 40.0).abs() < 0.5);
        assert!(last.covariance < 1.0);
        assert!(!last.drift_warning);
    }
}
