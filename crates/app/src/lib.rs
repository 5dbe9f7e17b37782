//! # ossie-app
//!
//! Application layer — deployment use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **capability ports** for remote objects: `Resource`, `Port`,
//!   `Device`, `LoadableDevice`, `ExecutableDevice`
//! - Define **infrastructure ports**: `NamingService`, `FileSystem`,
//!   `DeviceLauncher`, `EventPublisher`
//! - Provide the orchestration services:
//!   - `DomainManager` — registration of device managers, devices, services
//!     and application factories
//!   - `DeviceManager` — boots the devices of one node
//!   - `ApplicationFactory` — plans, loads, executes and wires an assembly
//!   - `Application` — start/stop/release of a live deployment
//! - Provide **in-process infrastructure** (event bus, bounded polling)
//!
//! ## Dependency rule
//! Depends on `ossie-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod context;
pub mod event_bus;
pub mod ports;
pub mod retry;
pub mod services;
