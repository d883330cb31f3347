/*!
 # Member Runner

 A Rust library for supervising cluster member processes on the local machine.

 ## Overview

 Member Runner provides functionality to:
 - Start members as detached child processes under memorable identities
 - Keep a durable registry of the members it manages, safe to share between
   concurrent invocations
 - Stop members and deregister them
 - List registered members, optionally with OS liveness
 - Tail or follow a member's log output

 ## Basic Usage

 ```no_run
 use member_runner::{MemberRunner, Result, StartOptions};

 #[tokio::main]
 async fn main() -> Result<()> {
     // Home directory and launcher come from the environment
     let mut runner = MemberRunner::from_env()?;

     // Start a member with the default cluster name and port
     let identity = runner.start(StartOptions::default()).await?;
     println!("Started {}", identity);

     // Show the last 20 lines of its log
     for line in runner.tail_logs(&identity, 20).await? {
         println!("{}", line);
     }

     // Stop it again
     runner.stop(&identity).await?;
     Ok(())
 }
 ```

 ## Features

 - **Registry**: a single JSON file rewritten atomically under an exclusive
   file lock, so concurrent invocations never lose each other's updates
 - **Identities**: human-readable names that are unique within the registry
 - **Logs**: last-N lines or follow mode, streamed asynchronously
 - **Error Handling**: one error type carrying the identity, path and OS error
   involved in every failure

 ## License

 This project is licensed under the MIT license.
*/

pub mod config;
pub mod error;
pub mod server;
pub mod store;

pub use config::{LauncherConfig, RunnerConfig};
pub use error::{Error, Result};
pub use server::{NameGenerator, ProcessHealth, ProcessRecord, ProcessState, StartOptions};
pub use store::ProcessRegistry;

use futures::StreamExt;
use futures::stream::BoxStream;
use server::{MemberProcess, SignalOutcome, logs, monitor};
use std::path::Path;
use store::Workspace;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Attempts at claiming a fresh workspace before `start` gives up.
const MAX_CLAIM_ATTEMPTS: usize = 8;

/// Stream of log lines produced in follow mode
pub type LogStream = BoxStream<'static, Result<String>>;

/// Supervise member processes registered under one home directory
///
/// This struct is the main entry point: it drives each member through
/// `Absent → Starting → Running → Stopped`, with the [`ProcessRegistry`] as
/// the single source of truth for which members are managed.
/// All public methods are instrumented with `tracing` spans.
pub struct MemberRunner {
    /// Configuration
    config: RunnerConfig,
    /// Durable registry under `config.home`
    registry: ProcessRegistry,
    /// Identity source
    names: NameGenerator,
}

impl MemberRunner {
    /// Create a runner from a configuration file path
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = RunnerConfig::from_file(path)?;
        Self::new(config)
    }

    /// Create a runner configured from the environment
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument]
    pub fn from_env() -> Result<Self> {
        Self::new(RunnerConfig::from_env())
    }

    /// Create a runner from a configuration
    ///
    /// Validates the configuration and opens (creating if necessary) the
    /// home directory.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(config), fields(home = %config.home.display()))]
    pub fn new(config: RunnerConfig) -> Result<Self> {
        crate::config::validate_config(&config)?;
        let registry = ProcessRegistry::open(&config.home).map_err(|e| {
            tracing::error!(error = %e, "Failed to open process registry");
            e
        })?;
        tracing::debug!("Created MemberRunner");
        Ok(Self {
            config,
            registry,
            names: NameGenerator::new(),
        })
    }

    /// Replace the identity source, e.g. with a seeded generator
    pub fn with_name_generator(mut self, names: NameGenerator) -> Self {
        self.names = names;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Start a member and return its identity
    ///
    /// Allocates an identity, claims its workspace, spawns the member with
    /// its output appended to the workspace log, and registers it. In
    /// foreground mode the member is additionally waited for and deregistered
    /// once it exits.
    ///
    /// Nothing is registered if the workspace cannot be created or the member
    /// cannot be launched. If the member launched but could not be
    /// registered, it is killed again before the error is returned.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self, options), fields(foreground = options.foreground))]
    pub async fn start(&mut self, options: StartOptions) -> Result<String> {
        let (identity, workspace) = self.claim_workspace().await?;
        tracing::info!(identity = %identity, state = %ProcessState::Starting, "Starting member");

        let mut process =
            match MemberProcess::spawn(&identity, &self.config.launcher, &options, &workspace) {
                Ok(process) => process,
                Err(e) => {
                    tracing::error!(identity = %identity, error = %e, "Failed to spawn member");
                    workspace.discard();
                    return Err(e);
                }
            };

        let record = ProcessRecord::for_workspace(&identity, process.pid(), &workspace)
            .with_member_info(options.effective_cluster_name(), options.effective_port());
        let saved = record.clone();
        if let Err(e) = self
            .on_registry(move |registry| registry.save(&saved))
            .await
        {
            tracing::error!(identity = %identity, error = %e, "Failed to register member, killing it");
            process.abort().await;
            workspace.discard();
            return Err(e);
        }
        tracing::info!(
            identity = %identity,
            pid = record.pid(),
            state = %ProcessState::Running,
            "Member started"
        );

        if options.foreground {
            let status = process.wait().await?;
            tracing::info!(identity = %identity, %status, "Foreground member exited");
            let removed = identity.clone();
            match self
                .on_registry(move |registry| registry.remove(&removed))
                .await
            {
                // Stopped by another invocation in the meantime
                Ok(_) | Err(Error::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            tracing::info!(identity = %identity, state = %ProcessState::Stopped, "Member deregistered");
        }

        Ok(identity)
    }

    /// Pick an unused identity and claim its workspace directory.
    ///
    /// Another invocation may claim the same name between the check and the
    /// claim; the loser simply draws again.
    async fn claim_workspace(&mut self) -> Result<(String, Workspace)> {
        let home = self.registry.home().to_path_buf();
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let registered = self.on_registry(|registry| registry.find_all()).await?;
            let identity = self
                .names
                .generate(|name| registered.contains_key(name) || Workspace::exists(&home, name));

            match Workspace::claim(&home, &identity)? {
                Some(workspace) => return Ok((identity, workspace)),
                None => {
                    tracing::debug!(identity = %identity, "Identity claimed concurrently, retrying");
                }
            }
        }

        Err(Error::Other(format!(
            "Could not allocate a unique identity under {} after {} attempts",
            home.display(),
            MAX_CLAIM_ATTEMPTS
        )))
    }

    /// Stop a registered member and deregister it
    ///
    /// Sends a termination signal to the recorded pid. A member that has
    /// already exited is not an error: it is deregistered all the same. The
    /// workspace and logs are left on disk.
    ///
    /// Returns the removed record.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self, identity: &str) -> Result<ProcessRecord> {
        tracing::info!("Attempting to stop member");
        let record = self.find_async(identity).await.inspect_err(|_| {
            tracing::warn!(state = %ProcessState::Absent, "Attempted to stop a member that is not registered");
        })?;

        match monitor::terminate(record.pid())? {
            SignalOutcome::Delivered => {
                tracing::debug!(pid = record.pid(), "Termination signal delivered");
            }
            SignalOutcome::AlreadyGone => {
                tracing::info!(pid = record.pid(), "Member already exited, deregistering");
            }
        }

        let target = identity.to_string();
        let removed = self
            .on_registry(move |registry| registry.remove(&target))
            .await?;
        tracing::info!(state = %ProcessState::Stopped, "Member stopped");
        Ok(removed)
    }

    /// List registered members ordered by identity
    ///
    /// This reflects the registry only; no liveness check is made.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<ProcessRecord>> {
        let records: Vec<ProcessRecord> = self.registry.find_all()?.into_values().collect();
        tracing::debug!(count = records.len(), "Listed members");
        Ok(records)
    }

    /// List registered identities in order
    pub fn identities(&self) -> Result<Vec<String>> {
        Ok(self.registry.find_all()?.into_keys().collect())
    }

    /// List registered members together with their OS liveness
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub fn list_with_status(&self) -> Result<Vec<(ProcessRecord, ProcessHealth)>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|record| {
                let health = monitor::check_health(record.pid());
                (record, health)
            })
            .collect())
    }

    /// Liveness of one registered member
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub fn status(&self, identity: &str) -> Result<ProcessHealth> {
        let record = self.find(identity)?;
        let health = monitor::check_health(record.pid());
        tracing::trace!(health = %health);
        Ok(health)
    }

    /// Deregister members whose process is no longer alive
    ///
    /// Returns the removed records. Members whose liveness cannot be
    /// determined are kept.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub fn prune(&self) -> Result<Vec<ProcessRecord>> {
        let removed = self
            .registry
            .retain(|record| monitor::check_health(record.pid()).is_live())?;
        for record in &removed {
            tracing::info!(identity = %record.identity(), pid = record.pid(), "Pruned stale member");
        }
        Ok(removed)
    }

    /// Last `line_count` lines of a member's log, oldest first
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the member is not registered,
    /// [`Error::LogNotFound`] if it has not produced a log file yet.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub async fn tail_logs(&self, identity: &str, line_count: usize) -> Result<Vec<String>> {
        let record = self.find_async(identity).await?;
        logs::tail_lines(record.log_file_path(), line_count).await
    }

    /// Follow a member's log from its current end
    ///
    /// The returned stream never ends by itself; drop it to stop following.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self))]
    pub fn follow_logs(&self, identity: &str) -> Result<LogStream> {
        follow_record(&self.find(identity)?)
    }

    /// Write a member's log to `out`
    ///
    /// With `Some(n)` the last `n` lines are written and the call returns.
    /// With `None` the log is followed: new lines are written as they appear
    /// and the future only completes on error, so callers cancel it (for
    /// example with `tokio::select!` on Ctrl-C) to stop.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self, out))]
    pub async fn logs<W>(&self, identity: &str, line_count: Option<usize>, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match line_count {
            Some(count) => {
                for line in self.tail_logs(identity, count).await? {
                    write_line(out, &line).await?;
                }
            }
            None => {
                let mut lines = follow_record(&self.find_async(identity).await?)?;
                while let Some(line) = lines.next().await {
                    write_line(out, &line?).await?;
                }
            }
        }
        Ok(())
    }

    fn find(&self, identity: &str) -> Result<ProcessRecord> {
        self.registry
            .find(identity)?
            .ok_or_else(|| Error::NotFound(identity.to_string()))
    }

    async fn find_async(&self, identity: &str) -> Result<ProcessRecord> {
        let target = identity.to_string();
        self.on_registry(move |registry| registry.find(&target))
            .await?
            .ok_or_else(|| Error::NotFound(identity.to_string()))
    }

    /// Run a registry operation on the blocking pool.
    ///
    /// Registry access waits on a file lock, which must not stall a runtime
    /// worker thread.
    async fn on_registry<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&ProcessRegistry) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || op(&registry))
            .await
            .map_err(|e| Error::Other(format!("Registry task failed: {}", e)))?
    }
}

fn follow_record(record: &ProcessRecord) -> Result<LogStream> {
    let path = record.log_file_path().to_path_buf();
    if !path.exists() {
        return Err(Error::LogNotFound(path));
    }
    Ok(logs::follow_lines(path, logs::DEFAULT_POLL_INTERVAL).boxed())
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
