//! Blueprint parsing
//!
//! TOML is the primary format; JSON is accepted as well.

use contracts::{ContractError, FleetBlueprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<FleetBlueprint, ContractError> {
    toml::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("TOML parse error: {e}"), e))
}

pub fn parse_json(content: &str) -> Result<FleetBlueprint, ContractError> {
    serde_json::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("JSON parse error: {e}"), e))
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<FleetBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[fleet]
name = "north"

[[vehicles]]
id = "truck-7"
tank_capacity_liters = 757.0
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.fleet.name, "north");
        assert_eq!(bp.vehicles.len(), 1);
        assert!(bp.vehicles[0].calibration.is_none());
        assert!(bp.sinks.is_empty());
        assert_eq!(bp.estimator.drift_warning_pct, 5.0);
    }

    #[test]
    fn test_parse_json_with_overrides() {
        let content = r#"{
            "fleet": { "name": "south" },
            "vehicles": [{
                "id": "van-1",
                "tank_capacity_liters": 80.0,
                "calibration": { "baseline_consumption": 0.02, "load_factor": 0.001, "altitude_factor": 0.0 }
            }],
            "estimator": { "recovery": { "cooldown_s": 600.0 } },
            "runtime": { "drop_policy": "drop_newest" },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.estimator.recovery.cooldown_s, 600.0);
        assert_eq!(bp.estimator.recovery.resync_drift_pct, 15.0);
        assert_eq!(bp.runtime.drop_policy, contracts::DropPolicy::DropNewest);
        assert_eq!(bp.sinks[0].queue_capacity, 100);
        assert!(bp.vehicles[0].calibration.is_some());
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
