//! Software assembly descriptor (SAD) — the components of one application
//! and how they connect.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ComponentFile, Connection, PropertyOverride};
use crate::error::ProfileError;
use crate::id::{ComponentId, FactoryId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareAssembly {
    pub id: FactoryId,
    pub name: String,
    #[serde(default)]
    pub component_files: Vec<ComponentFile>,
    #[serde(default)]
    pub placements: Vec<ComponentPlacement>,
    #[serde(default)]
    pub host_collocations: Vec<HostCollocation>,
    /// Instantiation id of the assembly controller.
    pub assembly_controller: ComponentId,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub external_ports: Vec<ExternalPort>,
}

impl SoftwareAssembly {
    /// Check required sections, file references and id uniqueness.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] describing the first violation.
    pub fn validate(&self, path: &str) -> Result<(), ProfileError> {
        let malformed = |reason: String| ProfileError::Malformed {
            path: path.to_string(),
            reason,
        };
        if self.id.as_str().is_empty() {
            return Err(ProfileError::MissingSection {
                path: path.to_string(),
                section: "id",
            });
        }
        if self.assembly_controller.as_str().is_empty() {
            return Err(ProfileError::MissingSection {
                path: path.to_string(),
                section: "assemblycontroller",
            });
        }
        let mut seen = BTreeSet::new();
        for placement in self.all_placements() {
            if self.component_file(&placement.file_ref).is_none() {
                return Err(malformed(format!(
                    "unknown component file `{}`",
                    placement.file_ref
                )));
            }
            for instantiation in &placement.instantiations {
                if !seen.insert(&instantiation.id) {
                    return Err(malformed(format!(
                        "duplicate component instantiation `{}`",
                        instantiation.id
                    )));
                }
            }
        }
        if seen.is_empty() {
            return Err(ProfileError::MissingSection {
                path: path.to_string(),
                section: "componentplacement",
            });
        }
        Ok(())
    }

    /// Placements at top level followed by those inside host collocations.
    pub fn all_placements(&self) -> impl Iterator<Item = &ComponentPlacement> {
        self.placements
            .iter()
            .chain(self.host_collocations.iter().flat_map(|h| h.placements.iter()))
    }

    /// Every instantiation with the placement it belongs to.
    pub fn instantiations(
        &self,
    ) -> impl Iterator<Item = (&ComponentPlacement, &ComponentInstantiation)> {
        self.all_placements()
            .flat_map(|p| p.instantiations.iter().map(move |i| (p, i)))
    }

    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.instantiations().map(|(_, i)| i.id.clone()).collect()
    }

    #[must_use]
    pub fn component_file(&self, file_ref: &str) -> Option<&ComponentFile> {
        self.component_files.iter().find(|f| f.id == file_ref)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentPlacement {
    pub file_ref: String,
    pub instantiations: Vec<ComponentInstantiation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInstantiation {
    pub id: ComponentId,
    #[serde(default)]
    pub usage_name: Option<String>,
    /// Naming-service name the component binds itself under.
    #[serde(default)]
    pub naming_service: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyOverride>,
}

/// Placements that must share one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCollocation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub placements: Vec<ComponentPlacement>,
}

/// A component port visible on the application as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalPort {
    pub port: String,
    pub component: ComponentId,
}
