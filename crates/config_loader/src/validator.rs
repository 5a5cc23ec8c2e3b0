//! Blueprint validation
//!
//! Field ranges come from the `validator` derives on the contract types.
//! Checks spanning several fields live here:
//! - vehicle ids unique and non-empty
//! - q_l_min < q_l_max
//! - gain caps ordered, covariance thresholds ordered
//! - emergency drift threshold >= resync threshold
//! - sink names present and unique, file sinks carry a `path`

use std::collections::HashSet;

use contracts::{ContractError, FleetBlueprint, SinkType};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a blueprint; returns the first error found
pub fn validate(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_vehicle_ids(blueprint)?;
    validate_noise(blueprint)?;
    validate_kalman(blueprint)?;
    validate_recovery(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_fields(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_error(&errors, String::new());
        ContractError::config_validation(field, message)
    })
}

/// Walk nested validation errors down to the first leaf
fn first_error(errors: &ValidationErrors, prefix: String) -> (String, String) {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(err) = errs.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", err.code));
                    return (path, message);
                }
            }
            ValidationErrorsKind::Struct(inner) => return first_error(inner, path),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_error(inner, format!("{path}[{idx}]"));
                }
            }
        }
    }
    (prefix, "invalid value".to_string())
}

fn validate_vehicle_ids(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, vehicle) in blueprint.vehicles.iter().enumerate() {
        if vehicle.id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("vehicles[{idx}].id"),
                "vehicle id cannot be empty",
            ));
        }
        if !seen.insert(&vehicle.id) {
            return Err(ContractError::config_validation(
                format!("vehicles[id={}]", vehicle.id),
                "duplicate vehicle id",
            ));
        }
    }
    Ok(())
}

fn validate_noise(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
    let noise = &blueprint.estimator.noise;
    if noise.q_l_min >= noise.q_l_max {
        return Err(ContractError::config_validation(
            "estimator.noise.q_l_min / estimator.noise.q_l_max",
            format!(
                "q_l_min ({}) must be < q_l_max ({})",
                noise.q_l_min, noise.q_l_max
            ),
        ));
    }
    Ok(())
}

fn validate_kalman(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
    let k = &blueprint.estimator.kalman;
    if !(k.gain_cap_low <= k.gain_cap_mid && k.gain_cap_mid <= k.gain_cap_high) {
        return Err(ContractError::config_validation(
            "estimator.kalman.gain_cap_*",
            format!(
                "gain caps must satisfy low <= mid <= high, got {} / {} / {}",
                k.gain_cap_low, k.gain_cap_mid, k.gain_cap_high
            ),
        ));
    }
    if k.mid_covariance >= k.high_covariance {
        return Err(ContractError::config_validation(
            "estimator.kalman.mid_covariance / estimator.kalman.high_covariance",
            format!(
                "mid_covariance ({}) must be < high_covariance ({})",
                k.mid_covariance, k.high_covariance
            ),
        ));
    }
    Ok(())
}

fn validate_recovery(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
    let r = &blueprint.estimator.recovery;
    if r.emergency_drift_pct < r.resync_drift_pct {
        return Err(ContractError::config_validation(
            "estimator.recovery.emergency_drift_pct",
            format!(
                "emergency_drift_pct ({}) must be >= resync_drift_pct ({})",
                r.emergency_drift_pct, r.resync_drift_pct
            ),
        ));
    }
    if r.refuel_resync_drift_pct < r.resync_drift_pct {
        return Err(ContractError::config_validation(
            "estimator.recovery.refuel_resync_drift_pct",
            format!(
                "refuel_resync_drift_pct ({}) must be >= resync_drift_pct ({})",
                r.refuel_resync_drift_pct, r.resync_drift_pct
            ),
        ));
    }
    Ok(())
}

fn validate_sinks(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !names.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
        if sink.sink_type == SinkType::File
            && sink.params.get("path").is_none_or(|p| p.trim().is_empty())
        {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.path", sink.name),
                "file sink requires a 'path' parameter",
            ));
        }
    }
    Ok(())
}
