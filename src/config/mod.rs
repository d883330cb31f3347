//! Configuration module for member-runner.
//!
//! This module handles parsing, validation, and access to the runner's
//! settings: where the home directory lives and how the managed member
//! executable is launched. Configuration can come from a JSON file, a string,
//! or the process environment.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use member_runner::config::RunnerConfig;
//!
//! let config = RunnerConfig::from_file("runner.json").unwrap();
//! println!("Home directory: {}", config.home.display());
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use member_runner::config::{LauncherConfig, RunnerConfig, validate_config};
//! use std::collections::HashMap;
//!
//! let launcher = LauncherConfig {
//!     command: "java".to_string(),
//!     args: vec!["-jar".to_string(), "member.jar".to_string()],
//!     env: HashMap::new(),
//! };
//! let config = RunnerConfig::new("/var/lib/member-runner", launcher);
//! validate_config(&config).unwrap();
//! ```
mod parser;
pub mod validator;

pub use parser::{
    COMMAND_ENV, DEFAULT_COMMAND, DEFAULT_HOME_DIR, HOME_ENV, LauncherConfig, RunnerConfig,
    default_home,
};
pub use validator::validate_config;
