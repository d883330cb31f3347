//! Per-process workspace directories.
//!
//! Layout under the home directory:
//!
//! ```text
//! <home>/<identity>/
//!     logging.properties
//!     logs/member.log
//! ```
//!
//! Workspaces outlive the registry entry: `stop` leaves them on disk.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the log subdirectory
pub const LOGS_DIR: &str = "logs";

/// Name of the member's log file inside [`LOGS_DIR`]
pub const LOG_FILE_NAME: &str = "member.log";

/// Name of the generated logging configuration file
pub const LOGGING_CONFIG_FILE: &str = "logging.properties";

/// Paths of one member's workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    log_file: PathBuf,
    logging_config: PathBuf,
}

impl Workspace {
    /// Compute the workspace paths for `identity` without touching the disk.
    pub fn locate(home: &Path, identity: &str) -> Self {
        let root = home.join(identity);
        Self {
            log_file: root.join(LOGS_DIR).join(LOG_FILE_NAME),
            logging_config: root.join(LOGGING_CONFIG_FILE),
            root,
        }
    }

    /// Whether a workspace directory for `identity` already exists.
    pub fn exists(home: &Path, identity: &str) -> bool {
        home.join(identity).exists()
    }

    /// Claim and populate the workspace for `identity`.
    ///
    /// The root directory is created non-recursively, so of two invocations
    /// racing for the same identity exactly one wins; the loser gets `Ok(None)`
    /// and should pick another name. The winner's workspace has its `logs/`
    /// directory and logging configuration in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkspaceCreate`] if any directory or file cannot be
    /// created. A partially populated workspace is removed again.
    pub fn claim(home: &Path, identity: &str) -> Result<Option<Self>> {
        let workspace = Self::locate(home, identity);

        match fs::create_dir(&workspace.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => {
                return Err(Error::WorkspaceCreate {
                    path: workspace.root,
                    source: e,
                });
            }
        }

        if let Err(e) = workspace.populate() {
            workspace.discard();
            return Err(e);
        }

        tracing::debug!(workspace = %workspace.root.display(), "Created workspace");
        Ok(Some(workspace))
    }

    fn populate(&self) -> Result<()> {
        let logs_dir = self.root.join(LOGS_DIR);
        fs::create_dir_all(&logs_dir).map_err(|e| Error::WorkspaceCreate {
            path: logs_dir,
            source: e,
        })?;

        fs::write(&self.logging_config, logging_properties(&self.log_file)).map_err(|e| {
            Error::WorkspaceCreate {
                path: self.logging_config.clone(),
                source: e,
            }
        })
    }

    /// Remove the workspace directory, best-effort.
    ///
    /// Only used to roll back a start that never got registered.
    pub fn discard(&self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            tracing::warn!(workspace = %self.root.display(), error = %e, "Failed to remove workspace");
        }
    }

    /// Workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Log file the member writes to
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Generated logging configuration
    pub fn logging_config(&self) -> &Path {
        &self.logging_config
    }
}

/// Logging configuration handed to the member, pointing its file handler at `log_file`.
fn logging_properties(log_file: &Path) -> String {
    format!(
        "handlers = java.util.logging.FileHandler, java.util.logging.ConsoleHandler\n\
         .level = INFO\n\
         java.util.logging.FileHandler.pattern = {}\n\
         java.util.logging.FileHandler.limit = 50000\n\
         java.util.logging.FileHandler.count = 1\n\
         java.util.logging.FileHandler.maxLocks = 100\n\
         java.util.logging.FileHandler.formatter = java.util.logging.SimpleFormatter\n\
         java.util.logging.FileHandler.append = true\n\
         java.util.logging.ConsoleHandler.formatter = java.util.logging.SimpleFormatter\n",
        log_file.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_claim_creates_layout() {
        let home = TempDir::new().unwrap();
        let workspace = Workspace::claim(home.path(), "eager_hopper")
            .unwrap()
            .unwrap();

        assert_eq!(workspace.root(), home.path().join("eager_hopper"));
        assert!(workspace.root().join(LOGS_DIR).is_dir());
        assert_eq!(
            workspace.log_file(),
            home.path().join("eager_hopper/logs/member.log")
        );
        // Opened by the launcher right before the member is spawned
        assert!(!workspace.log_file().exists());

        let properties = fs::read_to_string(workspace.logging_config()).unwrap();
        assert!(properties.contains(&workspace.log_file().display().to_string()));
    }

    #[test]
    fn test_claim_existing_identity_is_refused() {
        let home = TempDir::new().unwrap();
        assert!(Workspace::claim(home.path(), "eager_hopper").unwrap().is_some());
        assert!(Workspace::exists(home.path(), "eager_hopper"));
        assert!(Workspace::claim(home.path(), "eager_hopper").unwrap().is_none());
    }

    #[test]
    fn test_claim_under_missing_home_fails() {
        let home = TempDir::new().unwrap();
        let missing = home.path().join("not-created");
        let err = Workspace::claim(&missing, "eager_hopper").unwrap_err();
        assert!(matches!(err, Error::WorkspaceCreate { .. }));
    }
}
