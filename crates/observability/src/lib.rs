//! # Observability
//!
//! Tracing and Prometheus metrics for the fuel estimation runtime.
//!
//! - [`init_tracing`] installs the global subscriber (JSON, pretty or compact)
//! - [`init_metrics_exporter`] serves the `metrics` facade over HTTP
//! - [`metrics`] turns estimates into gauges, counters and run summaries
//!
//! ## Usage
//!
//! ```ignore
//! observability::init_tracing(&TracingConfig::default())?;
//! observability::init_metrics_exporter(9000)?;
//!
//! while let Some(estimate) = rx.recv().await {
//!     observability::record_estimate_metrics(&estimate);
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_estimate_metrics, record_tick_outcome, EstimateMetricsAggregator, MetricsSummary,
    RunningStats, StatsSummary, VehicleSummary,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON with file, line and thread ids
    Json,
    /// Human readable, multi-line
    #[default]
    Pretty,
    /// Single line
    Compact,
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Ignore `RUST_LOG` and always use `default_filter`
    pub ignore_env: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_filter: "info".to_string(),
            ignore_env: false,
        }
    }
}

impl TracingConfig {
    /// Level from a `-v` count, or `warn` when quiet
    pub fn from_verbosity(format: LogFormat, verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            format,
            default_filter: level.to_string(),
            ignore_env: quiet,
        }
    }

    fn filter(&self) -> EnvFilter {
        if self.ignore_env {
            return EnvFilter::new(&self.default_filter);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global tracing subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")
}

/// Serve Prometheus metrics on `0.0.0.0:port`
pub fn init_metrics_exporter(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
