/// Error handling module for member-runner.
///
/// This module defines the error types used throughout the library.
/// Every variant carries the identity or path it concerns, along with the
/// underlying OS error where there is one, so an operator can act on it.
///
/// # Example
///
/// ```
/// use member_runner::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::NotFound(name)) => println!("No such process: {}", name),
///         Err(Error::LogNotFound(path)) => println!("No output yet at {}", path.display()),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the member-runner library.
///
/// This enum represents all possible error types that can be returned from
/// registry and lifecycle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The home directory could not be created.
    ///
    /// This error occurs when:
    /// - The user has no write permission on the parent directory
    /// - A regular file already occupies the path
    #[error(
        "Process directories couldn't be created at {}. This might be related to user \
         permissions, please check your write permissions there: {source}",
        path.display()
    )]
    StoreInit {
        /// Directory we attempted to create
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The registry file exists but does not hold a valid mapping.
    ///
    /// This error occurs when:
    /// - The file was edited by hand or by another program
    /// - The file was written by an incompatible version of this tool
    #[error("Process registry at {} is corrupt: {reason}", path.display())]
    StoreCorrupt {
        /// Registry file path
        path: PathBuf,
        /// What failed while decoding
        reason: String,
    },

    /// The registry could not be persisted.
    ///
    /// The previously durable file is left untouched when this is returned.
    #[error("Failed to write process registry at {}: {source}", path.display())]
    StoreWrite {
        /// Registry file path
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// No process with the given identity is registered.
    #[error("No such process: {0}")]
    NotFound(String),

    /// The managed executable could not be launched.
    ///
    /// This error occurs when:
    /// - The configured command does not exist or isn't executable
    /// - The OS refuses to create a new process
    #[error("Failed to start process: {0}")]
    Spawn(String),

    /// The per-process workspace could not be prepared.
    #[error("Failed to create process workspace at {}: {source}", path.display())]
    WorkspaceCreate {
        /// File or directory being created
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The process is registered but has not produced a log file yet.
    #[error("Log file not found: {}", .0.display())]
    LogNotFound(PathBuf),

    /// Failed to parse configuration from a file or string.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    ///
    /// This error occurs when:
    /// - The launcher command is empty
    /// - The home directory is not an absolute path
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// I/O error outside of the registry write path (reading logs, for example).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for member-runner operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error` type
/// from this module.
pub type Result<T> = std::result::Result<T, Error>;
