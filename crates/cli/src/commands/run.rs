//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig, TelemetryInput};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(port) = args.metrics_port {
        info!(port, "Overriding metrics port from CLI");
        blueprint.runtime.metrics_port = port;
    }

    if let Some(ref vehicle) = args.vehicle {
        if blueprint.vehicle(vehicle).is_none() && !blueprint.runtime.allow_unknown_vehicles {
            anyhow::bail!("Vehicle '{}' is not defined in the configuration", vehicle);
        }
    }

    info!(
        fleet = %blueprint.fleet.name,
        vehicles = blueprint.vehicles.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let input = match (&args.replay, args.mock) {
        (Some(path), _) => TelemetryInput::Replay {
            path: path.clone(),
            speed: args.replay_speed,
        },
        (None, Some(scenario)) => TelemetryInput::Mock {
            scenario,
            ticks: if args.mock_ticks == 0 {
                None
            } else {
                Some(args.mock_ticks)
            },
            seed: args.seed,
        },
        (None, None) => anyhow::bail!("No telemetry input: pass --replay <FILE> or --mock <SCENARIO>"),
    };

    let metrics_port = blueprint.runtime.metrics_port;
    let pipeline_config = PipelineConfig {
        blueprint,
        input,
        vehicle_filter: args.vehicle.clone(),
        max_ticks: if args.max_ticks == 0 {
            None
        } else {
            Some(args.max_ticks)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if metrics_port == 0 {
            None
        } else {
            Some(metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);

    info!("Starting pipeline...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        ticks_routed = stats.ticks_routed,
        estimates = stats.estimates.total_estimates,
        duration_secs = stats.duration.as_secs_f64(),
        ticks_per_sec = format!("{:.2}", stats.ticks_per_sec()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Fuel Estimator finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::FleetBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Fleet: {}", blueprint.fleet.name);
    println!("\nVehicles ({}):", blueprint.vehicles.len());
    for vehicle in &blueprint.vehicles {
        println!(
            "  - {} ({:.0} L{})",
            vehicle.id,
            vehicle.tank_capacity_liters,
            if vehicle.calibration.is_some() {
                ", calibrated"
            } else {
                ""
            }
        );
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    let runtime = &blueprint.runtime;
    println!("\nRuntime:");
    println!("  Mailbox capacity: {}", runtime.mailbox_capacity);
    println!("  Output capacity: {}", runtime.output_capacity);
    println!("  Drop policy: {:?}", runtime.drop_policy);
    println!("  Unknown vehicles: {}", if runtime.allow_unknown_vehicles { "allowed" } else { "rejected" });
    if runtime.inactivity_timeout_s > 0.0 {
        println!("  Inactivity timeout: {}s", runtime.inactivity_timeout_s);
    }

    println!();
}
