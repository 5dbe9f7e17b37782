//! Port definitions — traits that adapters implement.
//!
//! Remote objects are reached through synchronous, object-safe capability
//! traits held as `Arc<dyn _>`. Capabilities a device may or may not have
//! are queried explicitly (`as_loadable`, `as_executable`) instead of being
//! discovered by runtime narrowing.

pub mod device;
pub mod device_manager;
pub mod event_bus;
pub mod file_system;
pub mod launcher;
pub mod naming;
pub mod object;
pub mod resource;

pub use device::{Device, ExecutableDevice, LoadableDevice};
pub use device_manager::DeviceManagerHandle;
pub use event_bus::EventPublisher;
pub use file_system::FileSystem;
pub use launcher::DeviceLauncher;
pub use naming::NamingService;
pub use object::ObjectRef;
pub use resource::{Port, PortSupplier, PropertySet, Resource};
