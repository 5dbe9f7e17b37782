//! # ossie-adapter-process
//!
//! Executable device whose processes are real OS processes.
//!
//! ## Responsibilities
//! - Implement `ossie_app::ports::ExecutableDevice` with [`ProcessDevice`]:
//!   a loaded file is a host executable, `execute` spawns it with the exec
//!   parameters flattened into `KEY VALUE` arguments, `terminate` kills the
//!   process and waits for it
//! - Implement `ossie_app::ports::DeviceLauncher` with
//!   [`ProcessDeviceLauncher`], hosting the device in the calling process
//!
//! Spawned components announce themselves in the naming service designated
//! by `NAMING_CONTEXT_IOR`, so the domain must use a naming service that
//! other processes can reach.
//!
//! ## Dependency rule
//!
//! Depends on `ossie-app` (port traits) and `ossie-domain` only.

mod device;
mod error;
mod launcher;

pub use device::ProcessDevice;
pub use error::ProcessError;
pub use launcher::ProcessDeviceLauncher;
