//! # Ingestion Pipeline
//!
//! Telemetry ingestion.
//!
//! Responsibilities:
//! - Register telemetry sources (replay files, synthetic scenarios, live feeds)
//! - Merge them into one bounded `TelemetryTick` stream
//! - Backpressure management and drop policy
//!
//! ## Usage
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, ReplaySource};
//!
//! let mut pipeline = IngestionPipeline::new(1024);
//! pipeline.register_source(Box::new(ReplaySource::open("ticks.jsonl")?), None)?;
//!
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start_all();
//! pipeline.seal();
//! while let Ok(tick) = rx.recv().await {
//!     // route to the fleet
//! }
//! ```

mod adapter;
mod config;
mod error;
mod mock;
mod pipeline;
mod replay;

pub use adapter::SourceAdapter;
pub use config::{BackpressureConfig, DropPolicy, IngestionMetrics, MetricsSnapshot};
pub use contracts::TelemetryTick;
pub use error::{IngestionError, Result};
pub use mock::{MockConfig, MockScenario, MockTelemetrySource, ScenarioGenerator};
pub use pipeline::IngestionPipeline;
pub use replay::{parse_line, ReplaySource};
