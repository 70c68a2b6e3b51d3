//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{Placer, ProjectConfig};
use forge_common::Frequency;
use std::path::Path;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "forge.toml";

/// Loads and validates `forge.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `forge.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks required fields and value ranges that serde cannot express.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.build_name.is_empty() {
        return Err(ConfigError::MissingField("project.build_name".to_string()));
    }
    if config.target.clock.parse::<Frequency>().is_err() {
        return Err(invalid("target.clock", &config.target.clock, "a frequency such as \"12MHz\""));
    }
    if config.csr.stride == 0 {
        return Err(invalid("csr.stride", "0", "a non-zero byte count"));
    }
    if let Some(placer) = &config.build.placer {
        placer.parse::<Placer>().map_err(|_| {
            invalid("build.placer", placer, "one of: sa, heap")
        })?;
    }
    for (i, peripheral) in config.peripherals.iter().enumerate() {
        if peripheral.name.is_empty() {
            return Err(ConfigError::MissingField(format!("peripherals[{i}].name")));
        }
    }
    for (name, stage) in &config.toolchain.stages {
        if stage.command.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "toolchain.stages.{name}.command"
            )));
        }
    }
    Ok(())
}

fn invalid(field: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidConfiguration {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}
