//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CalibrationRecord, FleetBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    fleet: String,
    vehicles: Vec<VehicleInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
    runtime: RuntimeInfo,
    estimator: EstimatorInfo,
}

#[derive(Serialize)]
struct VehicleInfo {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tank_capacity_liters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<CalibrationRecord>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

#[derive(Serialize)]
struct RuntimeInfo {
    mailbox_capacity: usize,
    output_capacity: usize,
    drop_policy: String,
    allow_unknown_vehicles: bool,
    inactivity_timeout_s: f64,
    metrics_port: u16,
}

#[derive(Serialize)]
struct EstimatorInfo {
    drift_warning_pct: f64,
    resync_drift_pct: f64,
    emergency_drift_pct: f64,
    emergency_gap_hours: f64,
    cooldown_s: f64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &FleetBlueprint, args: &InfoArgs) -> ConfigInfo {
    let vehicles = blueprint
        .vehicles
        .iter()
        .map(|v| VehicleInfo {
            id: v.id.to_string(),
            tank_capacity_liters: args.vehicles.then_some(v.tank_capacity_liters),
            calibration: if args.vehicles { v.calibration } else { None },
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let runtime = &blueprint.runtime;
    let recovery = &blueprint.estimator.recovery;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        fleet: blueprint.fleet.name.clone(),
        vehicles,
        sinks,
        runtime: RuntimeInfo {
            mailbox_capacity: runtime.mailbox_capacity,
            output_capacity: runtime.output_capacity,
            drop_policy: format!("{:?}", runtime.drop_policy),
            allow_unknown_vehicles: runtime.allow_unknown_vehicles,
            inactivity_timeout_s: runtime.inactivity_timeout_s,
            metrics_port: runtime.metrics_port,
        },
        estimator: EstimatorInfo {
            drift_warning_pct: blueprint.estimator.drift_warning_pct,
            resync_drift_pct: recovery.resync_drift_pct,
            emergency_drift_pct: recovery.emergency_drift_pct,
            emergency_gap_hours: recovery.emergency_gap_hours,
            cooldown_s: recovery.cooldown_s,
        },
    }
}

fn print_config_info(blueprint: &FleetBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Fuel Estimator Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🏢 Fleet");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   └─ Name: {}", blueprint.fleet.name);

    // Vehicles
    println!("\n🚚 Vehicles ({})", blueprint.vehicles.len());
    for (i, vehicle) in blueprint.vehicles.iter().enumerate() {
        let is_last = i == blueprint.vehicles.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {}", prefix, vehicle.id);

        if args.vehicles {
            println!(
                "   {}  ├─ Tank: {:.1} L",
                child_prefix, vehicle.tank_capacity_liters
            );
            match &vehicle.calibration {
                Some(cal) => println!(
                    "   {}  └─ Calibration: baseline {} %/min, load {}, altitude {}",
                    child_prefix, cal.baseline_consumption, cal.load_factor, cal.altitude_factor
                ),
                None => println!("   {}  └─ Calibration: none", child_prefix),
            }
        }
    }

    // Estimator
    let recovery = &blueprint.estimator.recovery;
    println!("\n⚙️  Estimator");
    println!(
        "   ├─ Drift warning: {}%",
        blueprint.estimator.drift_warning_pct
    );
    println!(
        "   ├─ Resync / emergency drift: {}% / {}%",
        recovery.resync_drift_pct, recovery.emergency_drift_pct
    );
    println!("   ├─ Emergency gap: {} h", recovery.emergency_gap_hours);
    println!("   └─ Cooldown: {} s", recovery.cooldown_s);

    // Runtime
    let runtime = &blueprint.runtime;
    println!("\n🔧 Runtime");
    println!("   ├─ Mailbox capacity: {}", runtime.mailbox_capacity);
    println!("   ├─ Output capacity: {}", runtime.output_capacity);
    println!("   ├─ Drop policy: {:?}", runtime.drop_policy);
    println!(
        "   └─ Unknown vehicles: {}",
        if runtime.allow_unknown_vehicles {
            "allowed"
        } else {
            "rejected"
        }
    );

    // Sinks
    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, queue {}) {:?}",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity, sink.params
                );
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}
