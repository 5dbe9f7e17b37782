//! Application records — what a deployment leaves behind.

use serde::{Deserialize, Serialize};

use crate::error::InvalidStateError;
use crate::id::{ComponentId, DeviceId, ImplementationId, ProcessId};
use crate::property::DataType;

/// Caller-supplied placement of one component onto one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub component_id: ComponentId,
    pub assigned_device: DeviceId,
}

impl DeviceAssignment {
    pub fn new(component_id: impl Into<String>, assigned_device: impl Into<String>) -> Self {
        Self {
            component_id: ComponentId::new(component_id),
            assigned_device: DeviceId::new(assigned_device),
        }
    }
}

/// Everything the loader did for one component; consumed on release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedComponent {
    pub component_id: ComponentId,
    pub implementation_id: ImplementationId,
    pub assigned_device: DeviceId,
    pub naming_name: String,
    pub is_resource: bool,
    /// Capacities allocated on the assigned device.
    pub allocation: Vec<DataType>,
    /// Device and file name the binary was loaded under.
    pub loaded: Option<(DeviceId, String)>,
    /// Device and process started by execute.
    pub executed: Option<(DeviceId, ProcessId)>,
}

impl DeployedComponent {
    #[must_use]
    pub fn process_id(&self) -> Option<ProcessId> {
        self.executed.as_ref().map(|(_, pid)| *pid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    Created,
    Started,
    Stopped,
    Released,
}

impl ApplicationState {
    /// Every operation except observing is refused once released.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError::AlreadyReleased`] for a released
    /// application.
    pub fn ensure_live(self, application: &str) -> Result<(), InvalidStateError> {
        if self == Self::Released {
            return Err(InvalidStateError::AlreadyReleased(application.to_string()));
        }
        Ok(())
    }
}
