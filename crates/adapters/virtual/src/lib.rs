//! # ossie-adapter-virtual
//!
//! In-process stand-ins for the remote objects of a domain, used by tests
//! and by nodes booted in `virtual` mode.
//!
//! ## Provided objects
//!
//! | Object | Port trait | Behaviour |
//! |--------|-----------|-----------|
//! | [`VirtualDevice`] | `ExecutableDevice` | Capacity ledger, load table; `execute` instantiates a [`VirtualResource`] and binds it at `NAME_BINDING` |
//! | [`VirtualResource`] | `Resource` | Lifecycle, properties and [`VirtualPort`]s described by a [`ComponentSpec`] |
//! | [`InMemoryFileSystem`] | `FileSystem` | Map of path to bytes |
//! | [`VirtualDeviceLauncher`] | `DeviceLauncher` | Creates a device and binds it under `DomainName1/<label>` |
//!
//! A component binary is a JSON [`ComponentSpec`] manifest, or is described
//! by a [`ComponentCatalog`] registration.
//!
//! ## Dependency rule
//!
//! Depends on `ossie-app` (port traits) and `ossie-domain` only.

mod catalog;
mod device;
mod file_system;
mod launcher;
mod resource;

pub use catalog::{ComponentCatalog, ComponentSpec};
pub use device::VirtualDevice;
pub use file_system::InMemoryFileSystem;
pub use launcher::VirtualDeviceLauncher;
pub use resource::{PortDirection, ResourceState, VirtualPort, VirtualResource};
