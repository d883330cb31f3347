// src/server/process.rs
use crate::config::LauncherConfig;
use crate::error::{Error, Result};
use crate::store::Workspace;
use async_process::{Child, Command, Stdio};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Cluster name passed when neither a config file nor an explicit name is given
pub const DEFAULT_CLUSTER_NAME: &str = "dev";

/// Port passed when neither a config file nor an explicit port is given
pub const DEFAULT_PORT: &str = "5701";

/// Lifecycle state of a managed member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Not registered
    Absent,
    /// Workspace claimed, process being launched
    Starting,
    /// Spawned and registered
    Running,
    /// Signalled and deregistered
    Stopped,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessState::Absent => "absent",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Registry entry for one managed member.
///
/// Records are immutable once created: a stopped member is removed from the
/// registry, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    identity: String,
    pid: u32,
    workspace: PathBuf,
    logging_config_path: PathBuf,
    log_file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<String>,
    started_at: u64,
}

impl ProcessRecord {
    /// Create a record for a freshly spawned member, stamped with the current time
    pub fn new(
        identity: impl Into<String>,
        pid: u32,
        workspace: impl Into<PathBuf>,
        logging_config_path: impl Into<PathBuf>,
        log_file_path: impl Into<PathBuf>,
    ) -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            identity: identity.into(),
            pid,
            workspace: workspace.into(),
            logging_config_path: logging_config_path.into(),
            log_file_path: log_file_path.into(),
            cluster_name: None,
            port: None,
            started_at,
        }
    }

    /// Create a record from a claimed workspace
    pub fn for_workspace(identity: impl Into<String>, pid: u32, workspace: &Workspace) -> Self {
        Self::new(
            identity,
            pid,
            workspace.root(),
            workspace.logging_config(),
            workspace.log_file(),
        )
    }

    /// Attach the cluster name and port the member was launched with
    pub fn with_member_info(mut self, cluster_name: Option<String>, port: Option<String>) -> Self {
        self.cluster_name = cluster_name;
        self.port = port;
        self
    }

    /// Get the identity
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Get the OS process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the workspace directory
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Get the generated logging configuration path
    pub fn logging_config_path(&self) -> &Path {
        &self.logging_config_path
    }

    /// Get the log file path
    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }

    /// Get the cluster name passed at launch, if any
    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster_name.as_deref()
    }

    /// Get the port passed at launch, if any
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Get the launch time in seconds since the Unix epoch
    pub fn started_at(&self) -> u64 {
        self.started_at
    }
}

/// Options for starting a member.
///
/// A config file and an explicit cluster name or port may be combined:
/// explicit values are passed after `--config` and take precedence over the
/// file. The defaults (`dev`, `5701`) are only filled in when there is no
/// config file to take them from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Member configuration file handed to the executable
    pub config_file: Option<PathBuf>,
    /// Cluster name to join
    pub cluster_name: Option<String>,
    /// Port to listen on
    pub port: Option<String>,
    /// Runtime (JVM) options, placed before the launcher arguments
    pub runtime_options: Vec<String>,
    /// Additional arguments appended after everything else
    pub extra_args: Vec<String>,
    /// Wait for the member to exit instead of detaching
    pub foreground: bool,
}

impl StartOptions {
    /// Cluster name actually passed to the executable
    pub fn effective_cluster_name(&self) -> Option<String> {
        match (&self.cluster_name, &self.config_file) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(_)) => None,
            (None, None) => Some(DEFAULT_CLUSTER_NAME.to_string()),
        }
    }

    /// Port actually passed to the executable
    pub fn effective_port(&self) -> Option<String> {
        match (&self.port, &self.config_file) {
            (Some(port), _) => Some(port.clone()),
            (None, Some(_)) => None,
            (None, None) => Some(DEFAULT_PORT.to_string()),
        }
    }

    /// Member flags in the order they are passed: config file first, then
    /// explicit overrides, then the mode flag.
    pub fn member_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config_file) = &self.config_file {
            args.push("--config".to_string());
            args.push(config_file.display().to_string());
        }
        if let Some(name) = self.effective_cluster_name() {
            args.push("--cluster-name".to_string());
            args.push(name);
        }
        if let Some(port) = self.effective_port() {
            args.push("--port".to_string());
            args.push(port);
        }
        if self.foreground {
            args.push("--foreground".to_string());
        }
        args
    }
}

/// Full argument list for launching a member, excluding the command itself.
pub fn launch_args(
    launcher: &LauncherConfig,
    options: &StartOptions,
    workspace: &Workspace,
) -> Vec<String> {
    let mut args = options.runtime_options.clone();
    args.extend(launcher.args.iter().cloned());
    args.push("--logging-config".to_string());
    args.push(workspace.logging_config().display().to_string());
    args.extend(options.member_args());
    args.extend(options.extra_args.iter().cloned());
    args
}

/// A member process spawned by this invocation
pub struct MemberProcess {
    /// Identity the member was started under
    identity: String,
    /// Child process
    child: Child,
}

impl MemberProcess {
    /// Launch a member detached from the caller.
    ///
    /// Stdin is closed and stdout/stderr are appended to the workspace log
    /// file. On Unix the member gets its own process group so that signals
    /// aimed at the operator's terminal don't reach it.
    pub fn spawn(
        identity: &str,
        launcher: &LauncherConfig,
        options: &StartOptions,
        workspace: &Workspace,
    ) -> Result<Self> {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(workspace.log_file())
            .map_err(|e| Error::WorkspaceCreate {
                path: workspace.log_file().to_path_buf(),
                source: e,
            })?;
        let log_err = log_file.try_clone().map_err(|e| Error::WorkspaceCreate {
            path: workspace.log_file().to_path_buf(),
            source: e,
        })?;

        let mut std_command = std::process::Command::new(&launcher.command);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_command.process_group(0);
        }

        let mut command = Command::from(std_command);
        command
            .args(launch_args(launcher, options, workspace))
            .envs(&launcher.env)
            .env("MEMBER_ID", identity)
            .env("MEMBER_LOG_FILE", workspace.log_file())
            .current_dir(workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_err));

        let child = command.spawn().map_err(|e| {
            Error::Spawn(format!("Failed to launch '{}': {}", launcher.command, e))
        })?;

        Ok(Self {
            identity: identity.to_string(),
            child,
        })
    }

    /// Get the OS process id
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Wait for the member to exit
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child
            .status()
            .await
            .map_err(|e| Error::Other(format!("Failed to wait for {}: {}", self.identity, e)))
    }

    /// Kill the member and reap it; used when it cannot be registered
    pub async fn abort(mut self) {
        if let Err(e) = self.child.kill() {
            tracing::warn!(identity = %self.identity, error = %e, "Failed to kill unregistered member");
            return;
        }
        if let Err(e) = self.child.status().await {
            tracing::warn!(identity = %self.identity, error = %e, "Failed to reap unregistered member");
        }
    }
}
