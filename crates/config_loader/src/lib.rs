//! # Config Loader
//!
//! Fleet configuration loading.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate field ranges and cross-field rules
//! - Produce a `FleetBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("fleet.toml")).unwrap();
//! println!("Fleet: {}", blueprint.fleet.name);
//! ```

mod parser;
mod validator;

pub use contracts::FleetBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file; the format follows the extension
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<FleetBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<FleetBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Run validation on an already-built blueprint (e.g. after CLI overrides)
    pub fn validate(blueprint: &FleetBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    pub fn to_toml(blueprint: &FleetBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_serialize("toml", e.to_string()))
    }

    pub fn to_json(blueprint: &FleetBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_serialize("json", e.to_string()))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        ConfigFormat::from_extension(ext).ok_or_else(|| ContractError::unsupported_format(ext))
    }
}
