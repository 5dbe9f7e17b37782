//! Loader/executor — allocates, loads and runs one planned component.

use std::sync::Arc;

use ossie_domain::application::DeployedComponent;
use ossie_domain::component::RequiredComponent;
use ossie_domain::descriptor::CodeType;
use ossie_domain::error::{DeploymentError, DeploymentRequestError, OssieError};
use ossie_domain::id::ComponentId;
use ossie_domain::property::DataType;

use crate::ports::Device;
use crate::services::file_manager::FileManager;
use crate::services::journal::{DeploymentJournal, Step};
use crate::services::registry::DomainRegistry;

pub struct ComponentLoader<'a> {
    file_manager: &'a Arc<FileManager>,
    registry: &'a DomainRegistry,
}

impl<'a> ComponentLoader<'a> {
    pub fn new(file_manager: &'a Arc<FileManager>, registry: &'a DomainRegistry) -> Self {
        Self {
            file_manager,
            registry,
        }
    }

    /// Allocate capacity on the assigned device, then load and, when the
    /// code type asks for it, execute the component binary. Every side
    /// effect is recorded in `journal`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCapacity` or `InvalidState` from allocation,
    /// [`DeploymentError::BinaryNotFound`] when no file system holds the
    /// binary, [`DeploymentError::NoLoadableDevice`] /
    /// [`DeploymentError::NoExecutableDevice`] when no registered device can
    /// take it, and [`DeploymentError::InvalidProcessId`] for a failed launch.
    #[tracing::instrument(skip(self, component, journal), fields(component = %component.identifier))]
    pub fn deploy(
        &self,
        component: &RequiredComponent,
        journal: &mut DeploymentJournal,
    ) -> Result<DeployedComponent, OssieError> {
        let assigned = self
            .registry
            .device(&component.assigned_device)
            .ok_or_else(|| DeploymentRequestError::UnknownDevice {
                component: component.identifier.clone(),
                device: component.assigned_device.clone(),
            })?
            .device;

        let allocation = component.allocation_properties();
        assigned.allocate_capacity(&allocation)?;
        if !allocation.is_empty() {
            journal.record(Step::Allocation {
                device: Arc::clone(&assigned),
                capacities: allocation.clone(),
            });
        }

        let mut deployed = DeployedComponent {
            component_id: component.identifier.clone(),
            implementation_id: component.implementation_id.clone(),
            assigned_device: component.assigned_device.clone(),
            naming_name: component.naming_name.clone(),
            is_resource: component.is_resource,
            allocation,
            loaded: None,
            executed: None,
        };

        let Some(local_file) = component.local_file() else {
            return Ok(deployed);
        };
        let file_name = self.file_manager.locate(local_file)?.ok_or_else(|| {
            DeploymentError::BinaryNotFound {
                component: component.identifier.clone(),
                file: local_file.to_string(),
            }
        })?;
        let execute = component.requires_execute();
        let target = self.target_device(&component.identifier, assigned, execute)?;
        let kind = component.code_type().unwrap_or(CodeType::Executable);

        let loadable = target
            .as_loadable()
            .ok_or_else(|| DeploymentError::NoLoadableDevice(component.identifier.clone()))?;
        loadable.load(&**self.file_manager, &file_name, kind)?;
        journal.record(Step::Load {
            device: Arc::clone(&target),
            file_name: file_name.clone(),
        });
        tracing::debug!(file = %file_name, device = %target.label(), "component loaded");
        deployed.loaded = Some((target.device_id(), file_name.clone()));

        if execute {
            let executable = target
                .as_executable()
                .ok_or_else(|| DeploymentError::NoExecutableDevice(component.identifier.clone()))?;
            let pid = executable.execute(&file_name, &options(component), &component.exec_parameters())?;
            if !pid.is_valid() {
                return Err(DeploymentError::InvalidProcessId {
                    component: component.identifier.clone(),
                    pid,
                }
                .into());
            }
            journal.record(Step::Execute {
                device: Arc::clone(&target),
                pid,
            });
            tracing::debug!(%pid, device = %target.label(), "component executed");
            deployed.executed = Some((target.device_id(), pid));
        }
        Ok(deployed)
    }

    /// The assigned device when it has the needed capability, otherwise the
    /// first registered device that does.
    fn target_device(
        &self,
        component: &ComponentId,
        assigned: Arc<dyn Device>,
        execute: bool,
    ) -> Result<Arc<dyn Device>, OssieError> {
        let capable = |device: &Arc<dyn Device>| {
            if execute {
                device.as_executable().is_some()
            } else {
                device.as_loadable().is_some()
            }
        };
        if capable(&assigned) {
            return Ok(assigned);
        }
        let fallback = self
            .registry
            .devices()
            .into_iter()
            .map(|node| node.device)
            .find(|device| capable(device));
        match fallback {
            Some(device) => {
                tracing::debug!(
                    assigned = %assigned.label(),
                    fallback = %device.label(),
                    "assigned device lacks capability, using another registered device"
                );
                Ok(device)
            }
            None if execute => Err(DeploymentError::NoExecutableDevice(component.clone()).into()),
            None => Err(DeploymentError::NoLoadableDevice(component.clone()).into()),
        }
    }
}

/// Execute options derived from the component code.
fn options(component: &RequiredComponent) -> Vec<DataType> {
    let mut options = Vec::new();
    if let Some(code) = &component.code {
        options.push(DataType::new("CODE_TYPE", code.kind.as_str()));
        if let Some(entry_point) = code.entry_point.as_deref().filter(|e| !e.is_empty()) {
            options.push(DataType::new("ENTRY_POINT", entry_point));
        }
    }
    options
}
