/// Member process management for member-runner.
///
/// This module holds everything that deals with a single member process:
/// what is recorded about it, how it is launched, how its identity is chosen,
/// how its liveness is probed, and how its log output is read.
///
/// # Components
///
/// * `process` - Process records, start options and spawning
/// * `names` - Human-readable identity generation
/// * `monitor` - OS liveness checks and termination signals
/// * `logs` - Last-N-lines and follow-mode log reading
///
/// # Examples
///
/// Building the arguments a member is launched with:
///
/// ```
/// use member_runner::server::StartOptions;
///
/// let options = StartOptions {
///     cluster_name: Some("staging".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(
///     options.member_args(),
///     vec!["--cluster-name", "staging", "--port", "5701"]
/// );
/// ```
pub mod logs;
pub mod monitor;
pub mod names;
mod process;

pub use monitor::{ProcessHealth, SignalOutcome};
pub use names::NameGenerator;
pub use process::{
    DEFAULT_CLUSTER_NAME, DEFAULT_PORT, MemberProcess, ProcessRecord, ProcessState, StartOptions,
    launch_args,
};
