//! Device configuration descriptor (DCD) — the devices of one node.

use serde::{Deserialize, Serialize};

use super::{ComponentFile, Connection, PropertyOverride};
use crate::error::ProfileError;
use crate::id::{DeviceId, DeviceManagerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub id: DeviceManagerId,
    /// Label of the device manager.
    pub name: String,
    /// Package descriptor describing the node itself.
    pub device_manager_softpkg: String,
    #[serde(default)]
    pub component_files: Vec<ComponentFile>,
    #[serde(default)]
    pub placements: Vec<DevicePlacement>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl DeviceConfiguration {
    /// Check required sections and file references.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] describing the first violation.
    pub fn validate(&self, path: &str) -> Result<(), ProfileError> {
        let missing = |section| ProfileError::MissingSection {
            path: path.to_string(),
            section,
        };
        if self.id.as_str().is_empty() {
            return Err(missing("id"));
        }
        if self.name.is_empty() {
            return Err(missing("name"));
        }
        if self.device_manager_softpkg.is_empty() {
            return Err(missing("devicemanagersoftpkg"));
        }
        for placement in &self.placements {
            if self.component_file(&placement.file_ref).is_none() {
                return Err(ProfileError::Malformed {
                    path: path.to_string(),
                    reason: format!("unknown component file `{}`", placement.file_ref),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn component_file(&self, file_ref: &str) -> Option<&ComponentFile> {
        self.component_files.iter().find(|f| f.id == file_ref)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePlacement {
    pub file_ref: String,
    pub id: DeviceId,
    pub usage_name: String,
    #[serde(default)]
    pub properties: Vec<PropertyOverride>,
}
