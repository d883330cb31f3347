//! Persistence for managed members.
//!
//! # Components
//!
//! * `registry` - The durable identity → record mapping
//! * `lock` - Cross-process advisory locking for the registry file
//! * `workspace` - Per-member directories holding logs and generated configuration
pub mod lock;
pub mod registry;
pub mod workspace;

pub use lock::{LockMode, RegistryLock};
pub use registry::{LOCK_FILE, ProcessRegistry, REGISTRY_FILE};
pub use workspace::Workspace;
