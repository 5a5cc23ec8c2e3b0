//! Mock telemetry source
//!
//! Deterministic synthetic vehicles for tests and demos without a telematics
//! feed. The same seed always yields the same tick sequence.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{TelemetryCallback, TelemetrySource, TelemetryTick, VehicleId, LITERS_PER_GALLON};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::IngestionError;

/// Synthetic driving scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockScenario {
    /// Steady cruise with sensor noise
    Highway,
    /// Parked overnight, then the level drops sharply
    ParkedTheft,
    /// Driving, then a stop at the pump
    Refuel,
    /// Highway with missing level and GPS readings
    SensorDropout,
    /// Telemetry goes dark for hours while the level keeps falling
    LongGap,
}

impl MockScenario {
    pub const ALL: [MockScenario; 5] = [
        MockScenario::Highway,
        MockScenario::ParkedTheft,
        MockScenario::Refuel,
        MockScenario::SensorDropout,
        MockScenario::LongGap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MockScenario::Highway => "highway",
            MockScenario::ParkedTheft => "parked-theft",
            MockScenario::Refuel => "refuel",
            MockScenario::SensorDropout => "sensor-dropout",
            MockScenario::LongGap => "long-gap",
        }
    }
}

impl fmt::Display for MockScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MockScenario {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| IngestionError::UnknownScenario {
                name: s.to_string(),
                expected: Self::ALL.map(MockScenario::as_str).join(", "),
            })
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub vehicle_id: VehicleId,
    pub scenario: MockScenario,
    pub seed: u64,
    /// Number of ticks to emit (None = until stopped)
    pub ticks: Option<usize>,
    /// Tick spacing in telemetry time (seconds)
    pub tick_interval_s: f64,
    /// Wall-clock pause between ticks (zero = as fast as possible)
    pub pacing: Duration,
    pub tank_capacity_liters: f64,
    pub start_level_pct: f64,
    /// Timestamp of the first tick (epoch seconds)
    pub start_timestamp: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            vehicle_id: VehicleId::from("mock-1"),
            scenario: MockScenario::Highway,
            seed: 42,
            ticks: Some(120),
            tick_interval_s: 60.0,
            pacing: Duration::ZERO,
            tank_capacity_liters: 757.0,
            start_level_pct: 80.0,
            start_timestamp: 1_700_000_000.0,
        }
    }
}

impl MockConfig {
    pub fn scenario(vehicle_id: impl Into<VehicleId>, scenario: MockScenario) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            scenario,
            ..Default::default()
        }
    }

    /// Tick index at which the scenario's event happens
    fn event_index(&self) -> usize {
        self.ticks.unwrap_or(120) / 2
    }
}

/// Pure tick generator behind [`MockTelemetrySource`]
pub struct ScenarioGenerator {
    config: MockConfig,
    rng: StdRng,
    index: usize,
    timestamp: f64,
    level_pct: f64,
    ecu_gallons: f64,
}

impl ScenarioGenerator {
    pub fn new(config: MockConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            index: 0,
            timestamp: config.start_timestamp,
            level_pct: config.start_level_pct,
            ecu_gallons: 12_000.0,
            config,
        }
    }

    /// True level of the simulated tank
    pub fn true_level_pct(&self) -> f64 {
        self.level_pct
    }

    fn burn(&mut self, lph: f64, hours: f64) {
        let liters = lph * hours;
        self.level_pct = (self.level_pct - liters / self.config.tank_capacity_liters * 100.0).max(0.0);
        self.ecu_gallons += liters / LITERS_PER_GALLON;
    }

    fn cruising(&mut self) -> TelemetryTick {
        let dt_h = self.config.tick_interval_s / 3600.0;
        let lph = 28.0 + self.rng.random_range(-2.0..2.0);
        self.burn(lph, dt_h);

        TelemetryTick {
            measured_fuel_pct: Some(self.level_pct + self.rng.random_range(-0.6..0.6)),
            speed_mph: Some(62.0 + self.rng.random_range(-1.5..1.5)),
            rpm: Some(1650.0 + self.rng.random_range(-50.0..50.0)),
            ecu_total_fuel_used: Some(self.ecu_gallons),
            gps_satellites: Some(9),
            battery_voltage: Some(13.9),
            altitude: Some(250.0 + self.rng.random_range(-5.0..5.0)),
            hdop: Some(0.9),
            engine_load_pct: Some(55.0 + self.rng.random_range(-5.0..5.0)),
            trip_active: Some(true),
            ..TelemetryTick::new(self.config.vehicle_id.clone(), self.timestamp)
        }
    }

    fn standing(&mut self, rpm: f64) -> TelemetryTick {
        let dt_h = self.config.tick_interval_s / 3600.0;
        if rpm > 0.0 {
            self.burn(2.5, dt_h);
        }

        TelemetryTick {
            measured_fuel_pct: Some(self.level_pct + self.rng.random_range(-0.3..0.3)),
            speed_mph: Some(0.0),
            rpm: Some(rpm),
            ecu_total_fuel_used: Some(self.ecu_gallons),
            gps_satellites: Some(8),
            battery_voltage: Some(if rpm > 0.0 { 13.8 } else { 12.6 }),
            altitude: Some(250.0),
            hdop: Some(1.0),
            engine_load_pct: Some(if rpm > 0.0 { 12.0 } else { 0.0 }),
            trip_active: Some(false),
            ..TelemetryTick::new(self.config.vehicle_id.clone(), self.timestamp)
        }
    }

    fn next_tick(&mut self) -> TelemetryTick {
        let at_event = self.index == self.config.event_index();
        let after_event = self.index >= self.config.event_index();

        let tick = match self.config.scenario {
            MockScenario::Highway => self.cruising(),
            MockScenario::ParkedTheft => {
                if at_event {
                    self.level_pct = (self.level_pct - 18.0).max(0.0);
                }
                self.standing(0.0)
            }
            MockScenario::Refuel => {
                if at_event {
                    self.level_pct = 95.0;
                }
                if after_event && self.index < self.config.event_index() + 5 {
                    self.standing(650.0)
                } else {
                    self.cruising()
                }
            }
            MockScenario::SensorDropout => {
                let mut tick = self.cruising();
                if self.rng.random_bool(0.25) {
                    tick.measured_fuel_pct = None;
                }
                if self.rng.random_bool(0.25) {
                    tick.gps_satellites = None;
                    tick.hdop = None;
                }
                if self.rng.random_bool(0.1) {
                    tick.battery_voltage = Some(11.4);
                }
                tick
            }
            MockScenario::LongGap => {
                if at_event {
                    // three hours offline while driving
                    self.burn(80.0, 3.0);
                    self.timestamp += 3.0 * 3600.0;
                }
                if after_event {
                    self.standing(0.0)
                } else {
                    self.cruising()
                }
            }
        };

        self.index += 1;
        self.timestamp += self.config.tick_interval_s;
        tick
    }
}

impl Iterator for ScenarioGenerator {
    type Item = TelemetryTick;

    fn next(&mut self) -> Option<TelemetryTick> {
        if self.config.ticks.is_some_and(|n| self.index >= n) {
            return None;
        }
        Some(self.next_tick())
    }
}

/// Telemetry source driven by a [`ScenarioGenerator`] on its own thread
pub struct MockTelemetrySource {
    source_id: String,
    config: MockConfig,
    listening: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl MockTelemetrySource {
    pub fn new(config: MockConfig) -> Self {
        Self {
            source_id: format!("mock:{}:{}", config.scenario, config.vehicle_id),
            config,
            listening: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }
}

impl TelemetrySource for MockTelemetrySource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: TelemetryCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let listening = self.listening.clone();
        let finished = self.finished.clone();
        let source_id = self.source_id.clone();

        std::thread::spawn(move || {
            let pacing = config.pacing;
            debug!(source_id = %source_id, ticks = ?config.ticks, "mock source started");

            for tick in ScenarioGenerator::new(config) {
                if !listening.load(Ordering::Relaxed) {
                    break;
                }
                trace!(source_id = %source_id, timestamp = tick.timestamp, "mock tick");
                callback(tick);
                if !pacing.is_zero() {
                    std::thread::sleep(pacing);
                }
            }

            finished.store(true, Ordering::SeqCst);
            debug!(source_id = %source_id, "mock source stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}
