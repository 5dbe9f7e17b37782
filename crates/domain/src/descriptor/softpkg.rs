//! Software package descriptor (SPD).

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::id::ImplementationId;

/// A component package: one or more implementations of the same component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftPkg {
    pub id: String,
    pub name: String,
    /// Generic property file, relative to this descriptor.
    #[serde(default)]
    pub property_file: Option<String>,
    /// Software component descriptor (SCD), relative to this descriptor.
    #[serde(default)]
    pub descriptor: Option<String>,
    #[serde(default)]
    pub implementations: Vec<Implementation>,
}

impl SoftPkg {
    /// Check required sections.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::MissingSection`] when the package declares no
    /// implementation or an implementation has an empty id.
    pub fn validate(&self, path: &str) -> Result<(), ProfileError> {
        if self.id.is_empty() {
            return Err(ProfileError::MissingSection {
                path: path.to_string(),
                section: "id",
            });
        }
        if self.implementations.is_empty() {
            return Err(ProfileError::MissingSection {
                path: path.to_string(),
                section: "implementation",
            });
        }
        if self.implementations.iter().any(|i| i.id.as_str().is_empty()) {
            return Err(ProfileError::MissingSection {
                path: path.to_string(),
                section: "implementation id",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn implementation(&self, id: &ImplementationId) -> Option<&Implementation> {
        self.implementations.iter().find(|i| &i.id == id)
    }
}

/// One concrete build of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub id: ImplementationId,
    #[serde(default)]
    pub code: Option<Code>,
    #[serde(default)]
    pub os: Option<OsAttributes>,
    #[serde(default)]
    pub processors: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Implementation-specific property file, relative to the package.
    #[serde(default)]
    pub property_file: Option<String>,
}

impl Implementation {
    #[must_use]
    pub fn depends_on(&self, other: &ImplementationId) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.implementation_ref.as_ref() == Some(other))
    }

    /// Same OS (name and version) and at least one processor in common.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        let os_matches = match (&self.os, &other.os) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        os_matches
            && self
                .processors
                .iter()
                .any(|p| other.processors.iter().any(|q| q == p))
    }

    #[must_use]
    pub fn declares_os(&self) -> bool {
        self.os.as_ref().is_some_and(|os| !os.name.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Code {
    #[serde(rename = "type")]
    pub kind: CodeType,
    pub local_file: String,
    #[serde(default)]
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    KernelModule,
    Driver,
    SharedLibrary,
    Executable,
}

impl CodeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KernelModule => "KernelModule",
            Self::Driver => "Driver",
            Self::SharedLibrary => "SharedLibrary",
            Self::Executable => "Executable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsAttributes {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Identifier of the implementation this one depends on.
    #[serde(default)]
    pub implementation_ref: Option<ImplementationId>,
}
