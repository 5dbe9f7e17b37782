//! Descriptor model — structured views of the deployment descriptors.
//!
//! Descriptors are produced by an external parser (here: serde) and are
//! consumed read-only by the orchestrator. Each top-level descriptor offers a
//! `validate` method that rejects a missing required section.

pub mod assembly;
pub mod component;
pub mod connection;
pub mod device_config;
pub mod properties;
pub mod softpkg;

use serde::{Deserialize, Serialize};

pub use assembly::{ComponentInstantiation, ComponentPlacement, HostCollocation, SoftwareAssembly};
pub use component::{ComponentDescriptor, ComponentType};
pub use connection::{Connection, EndpointTarget, ProvidesEndpoint, UsesEndpoint};
pub use device_config::{DeviceConfiguration, DevicePlacement};
pub use properties::{Action, PropertyFile, PropertyKind, SimpleProperty};
pub use softpkg::{Code, CodeType, Dependency, Implementation, OsAttributes, SoftPkg};

/// Assembly and package descriptors use these file name suffixes.
pub const SAD_SUFFIX: &str = ".sad.json";
pub const SPD_SUFFIX: &str = ".spd.json";
pub const PRF_SUFFIX: &str = ".prf.json";
pub const SCD_SUFFIX: &str = ".scd.json";
pub const DCD_SUFFIX: &str = ".dcd.json";

/// Reference from a placement to a package descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFile {
    pub id: String,
    pub file: String,
}

/// Instantiation-level value overriding a declared property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOverride {
    pub id: String,
    pub value: String,
}

/// Resolve `reference` against the directory containing `descriptor`.
///
/// Absolute references are returned unchanged.
#[must_use]
pub fn resolve_relative(descriptor: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        return reference.to_string();
    }
    match descriptor.rfind('/') {
        Some(idx) => format!("{}/{reference}", &descriptor[..idx]),
        None => reference.to_string(),
    }
}
