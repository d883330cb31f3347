use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "MEMBER_RUNNER_HOME";

/// Environment variable overriding the launcher command.
pub const COMMAND_ENV: &str = "MEMBER_RUNNER_COMMAND";

/// Directory name used under the user's home when nothing else is configured.
pub const DEFAULT_HOME_DIR: &str = ".member-runner";

/// Executable launched when no launcher command is configured.
pub const DEFAULT_COMMAND: &str = "member-server";

/// How to launch the managed server executable.
///
/// The executable is treated as opaque: the runner only appends its own
/// arguments (logging configuration, config file, cluster name, port) after
/// `args`, and adds `env` on top of the inherited environment.
///
/// # Examples
///
/// ```
/// use member_runner::config::LauncherConfig;
/// use std::collections::HashMap;
///
/// let launcher = LauncherConfig {
///     command: "java".to_string(),
///     args: vec!["-cp".to_string(), "member.jar".to_string(), "com.example.Member".to_string()],
///     env: HashMap::new(),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Command to execute when starting a member.
    /// This can be an absolute path or a command available in the PATH.
    pub command: String,

    /// Arguments placed between runtime options and the runner's own flags.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set when launching the member.
    /// These will be combined with the current environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

/// Main configuration for the runner.
///
/// # JSON Schema
///
/// ```json
/// {
///   "home": "/var/lib/member-runner",
///   "launcher": {
///     "command": "java",
///     "args": ["-cp", "member.jar", "com.example.Member"],
///     "env": { "JAVA_HOME": "/opt/jdk" }
///   }
/// }
/// ```
///
/// Both keys are optional; a missing `home` falls back to [`default_home`],
/// a missing `launcher` to [`LauncherConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Root directory holding the registry file and every workspace.
    #[serde(default = "default_home")]
    pub home: PathBuf,

    /// Launcher for the managed executable.
    #[serde(default)]
    pub launcher: LauncherConfig,
}

impl RunnerConfig {
    /// Creates a configuration rooted at `home`.
    pub fn new(home: impl Into<PathBuf>, launcher: LauncherConfig) -> Self {
        Self {
            home: home.into(),
            launcher,
        }
    }

    /// Builds a configuration from the process environment.
    ///
    /// `MEMBER_RUNNER_HOME` selects the home directory and
    /// `MEMBER_RUNNER_COMMAND` the launcher command; both fall back to defaults.
    pub fn from_env() -> Self {
        let mut launcher = LauncherConfig::default();
        if let Some(command) = std::env::var(COMMAND_ENV).ok().filter(|c| !c.is_empty()) {
            launcher.command = command;
        }
        Self {
            home: default_home(),
            launcher,
        }
    }

    /// Loads a configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The file contents are not valid JSON
    /// * The JSON does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        Self::parse_from_str(&content)
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Resolves the default home directory.
///
/// `$MEMBER_RUNNER_HOME` wins when set; otherwise `~/.member-runner`, or the
/// same name under the system temp directory when no user home is known.
pub fn default_home() -> PathBuf {
    match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(DEFAULT_HOME_DIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"{
            "home": "/tmp/members",
            "launcher": {
                "command": "java",
                "args": ["-cp", "member.jar", "com.example.Member"],
                "env": { "JAVA_HOME": "/opt/jdk" }
            }
        }"#;

        let config = RunnerConfig::parse_from_str(config_str).unwrap();

        assert_eq!(config.home, PathBuf::from("/tmp/members"));
        assert_eq!(config.launcher.command, "java");
        assert_eq!(
            config.launcher.args,
            vec!["-cp", "member.jar", "com.example.Member"]
        );
        assert_eq!(
            config.launcher.env.get("JAVA_HOME"),
            Some(&"/opt/jdk".to_string())
        );
    }

    #[test]
    fn test_missing_launcher_uses_default() {
        let config = RunnerConfig::parse_from_str(r#"{ "home": "/tmp/members" }"#).unwrap();
        assert_eq!(config.launcher, LauncherConfig::default());
    }

    #[test]
    fn test_malformed_config() {
        let err = RunnerConfig::parse_from_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
