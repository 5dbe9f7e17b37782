//! Software component descriptor (SCD).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Resource,
    Device,
    LoadableDevice,
    ExecutableDevice,
    ResourceFactory,
    DeviceManager,
    DomainManager,
    Service,
    Library,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub component_type: ComponentType,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub uses: Vec<String>,
}

impl ComponentDescriptor {
    /// Resources are initialized and configured once deployed.
    #[must_use]
    pub fn is_resource(&self) -> bool {
        matches!(
            self.component_type,
            ComponentType::Resource
                | ComponentType::Device
                | ComponentType::LoadableDevice
                | ComponentType::ExecutableDevice
                | ComponentType::ResourceFactory
        )
    }

    #[must_use]
    pub fn is_configurable(&self) -> bool {
        self.is_resource()
            || matches!(
                self.component_type,
                ComponentType::DeviceManager | ComponentType::DomainManager
            )
    }
}
