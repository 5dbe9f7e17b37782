//! Device manager port — what the domain manager needs from a node.

use std::sync::Arc;

use ossie_domain::descriptor::Connection;
use ossie_domain::id::{DeviceId, DeviceManagerId};

use super::{Device, FileSystem, ObjectRef};

pub trait DeviceManagerHandle: Send + Sync {
    fn identifier(&self) -> DeviceManagerId;
    fn label(&self) -> String;
    /// Path of the device configuration descriptor.
    fn device_configuration_profile(&self) -> String;
    fn file_system(&self) -> Arc<dyn FileSystem>;
    fn registered_devices(&self) -> Vec<Arc<dyn Device>>;
    fn registered_services(&self) -> Vec<(String, ObjectRef)>;
    /// Connections declared by the node's configuration.
    fn connections(&self) -> Vec<Connection>;
    /// Implementation chosen for a device, or an empty string.
    fn component_implementation_id(&self, device: &DeviceId) -> String;
}
