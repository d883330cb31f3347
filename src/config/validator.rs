use crate::config::{LauncherConfig, RunnerConfig};
use crate::error::{Error, Result};

/// Validates a launcher configuration
pub fn validate_launcher_config(config: &LauncherConfig) -> Result<()> {
    if config.command.trim().is_empty() {
        return Err(Error::ConfigInvalid("Launcher has empty command".to_string()));
    }

    if let Some(key) = config.env.keys().find(|k| k.is_empty() || k.contains('=')) {
        return Err(Error::ConfigInvalid(format!(
            "Launcher has invalid environment variable name '{}'",
            key
        )));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &RunnerConfig) -> Result<()> {
    // Workspaces and log paths are recorded as absolute paths
    if !config.home.is_absolute() {
        return Err(Error::ConfigInvalid(format!(
            "Home directory must be an absolute path, got '{}'",
            config.home.display()
        )));
    }

    validate_launcher_config(&config.launcher)
}
