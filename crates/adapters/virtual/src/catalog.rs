//! Component images known to virtual devices.
//!
//! A virtual binary is a JSON manifest naming the component's ports and
//! initial properties. The catalog lets callers register manifests for
//! binaries whose file content is not a manifest.

use std::sync::{PoisonError, RwLock};

use ossie_domain::property::DataType;
use serde::{Deserialize, Serialize};

/// Ports and initial properties of a virtual component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSpec {
    pub uses: Vec<String>,
    pub provides: Vec<String>,
    pub properties: Vec<DataType>,
}

impl ComponentSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_uses(mut self, port: &str) -> Self {
        self.uses.push(port.to_string());
        self
    }

    #[must_use]
    pub fn with_provides(mut self, port: &str) -> Self {
        self.provides.push(port.to_string());
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: DataType) -> Self {
        self.properties.push(property);
        self
    }

    /// Read a manifest from binary content; anything else yields a
    /// component without ports.
    #[must_use]
    pub fn from_image(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(bytes).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "binary is not a component manifest");
            Self::default()
        })
    }
}

/// Manifests registered by binary path.
#[derive(Debug, Default)]
pub struct ComponentCatalog {
    entries: RwLock<Vec<(String, ComponentSpec)>>,
}

impl ComponentCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the manifest of the binary at `file`, replacing a previous
    /// registration.
    pub fn register(&self, file: &str, spec: ComponentSpec) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(path, _)| path != file);
        entries.push((file.to_string(), spec));
    }

    /// Manifest of a loaded file. Loaded names carry the mount point of the
    /// file system they came from, so a registration matches any name
    /// ending with it; the longest match wins.
    #[must_use]
    pub fn lookup(&self, file_name: &str) -> Option<ComponentSpec> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|(path, _)| {
                file_name == path
                    || (path.starts_with('/') && file_name.ends_with(path.as_str()))
            })
            .max_by_key(|(path, _)| path.len())
            .map(|(_, spec)| spec.clone())
    }
}
