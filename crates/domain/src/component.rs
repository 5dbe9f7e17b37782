//! Required component — the resolved deployment view of one assembly
//! component instantiation.

use serde::{Deserialize, Serialize};

use crate::descriptor::{Code, CodeType, PropertyFile, PropertyKind};
use crate::error::ProfileError;
use crate::id::{ComponentId, DeviceId, ImplementationId};
use crate::property::{self, DataType, PropertyType, PropertyValue};

/// A property declared for a component, with its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentProperty {
    pub id: String,
    pub kind: PropertyType,
    pub kinds: Vec<PropertyKind>,
    pub capacity: bool,
    pub value: Option<PropertyValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredComponent {
    pub identifier: ComponentId,
    pub usage_name: Option<String>,
    pub implementation_id: ImplementationId,
    /// Code with its local file resolved against the package location.
    pub code: Option<Code>,
    /// Absolute naming-service name the component binds under.
    pub naming_name: String,
    pub assigned_device: DeviceId,
    pub is_resource: bool,
    pub is_configurable: bool,
    pub is_assembly_controller: bool,
    properties: Vec<ComponentProperty>,
    injected: Vec<DataType>,
}

impl RequiredComponent {
    pub fn new(
        identifier: ComponentId,
        implementation_id: ImplementationId,
        assigned_device: DeviceId,
        naming_name: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            usage_name: None,
            implementation_id,
            code: None,
            naming_name: naming_name.into(),
            assigned_device,
            is_resource: false,
            is_configurable: false,
            is_assembly_controller: false,
            properties: Vec::new(),
            injected: Vec::new(),
        }
    }

    /// Accumulate the declarations of a property file. A later declaration
    /// of the same id replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] when a declared value does not
    /// parse as its declared type.
    pub fn add_property_file(&mut self, file: &PropertyFile) -> Result<(), ProfileError> {
        for simple in &file.simples {
            let declared = ComponentProperty {
                id: simple.id.clone(),
                kind: simple.kind,
                kinds: if simple.kinds.is_empty() {
                    vec![PropertyKind::Configure]
                } else {
                    simple.kinds.clone()
                },
                capacity: simple.is_capacity(),
                value: simple.data_type()?.map(|d| d.value),
            };
            match self.properties.iter_mut().find(|p| p.id == declared.id) {
                Some(existing) => *existing = declared,
                None => self.properties.push(declared),
            }
        }
        Ok(())
    }

    /// Apply an instantiation-level override, typed by the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownProperty`] when no property with that
    /// id is declared, or [`ProfileError::InvalidValue`] when the value
    /// does not parse.
    pub fn override_property(&mut self, id: &str, text: &str) -> Result<(), ProfileError> {
        let declared = self
            .properties
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ProfileError::UnknownProperty(id.to_string()))?;
        declared.value = Some(declared.kind.parse_value(id, text)?);
        Ok(())
    }

    /// Parameters injected by the deployer on top of declared exec params.
    pub fn add_exec_parameter(&mut self, id: &str, value: impl Into<PropertyValue>) {
        property::upsert(&mut self.injected, DataType::new(id, value));
    }

    #[must_use]
    pub fn properties(&self) -> &[ComponentProperty] {
        &self.properties
    }

    fn valued(&self, keep: impl Fn(&ComponentProperty) -> bool) -> Vec<DataType> {
        self.properties
            .iter()
            .filter(|p| keep(p))
            .filter_map(|p| p.value.clone().map(|value| DataType::new(p.id.clone(), value)))
            .collect()
    }

    #[must_use]
    pub fn configure_properties(&self) -> Vec<DataType> {
        self.valued(|p| p.kinds.contains(&PropertyKind::Configure))
    }

    /// Capacities consumed from the assigned device.
    #[must_use]
    pub fn allocation_properties(&self) -> Vec<DataType> {
        self.valued(|p| p.capacity)
    }

    #[must_use]
    pub fn factory_parameters(&self) -> Vec<DataType> {
        self.valued(|p| p.kinds.contains(&PropertyKind::Factoryparam))
    }

    /// Declared exec parameters followed by injected ones.
    #[must_use]
    pub fn exec_parameters(&self) -> Vec<DataType> {
        let mut params = self.valued(|p| p.kinds.contains(&PropertyKind::Execparam));
        for injected in &self.injected {
            property::upsert(&mut params, injected.clone());
        }
        params
    }

    /// Non-empty binary path, if the component ships code.
    #[must_use]
    pub fn local_file(&self) -> Option<&str> {
        self.code
            .as_ref()
            .map(|c| c.local_file.as_str())
            .filter(|f| !f.is_empty())
    }

    #[must_use]
    pub fn code_type(&self) -> Option<CodeType> {
        self.code.as_ref().map(|c| c.kind)
    }

    /// Executables, and shared libraries exposing an entry point, are run
    /// after loading.
    #[must_use]
    pub fn requires_execute(&self) -> bool {
        self.code.as_ref().is_some_and(|code| match code.kind {
            CodeType::Executable => true,
            CodeType::SharedLibrary => code.entry_point.as_deref().is_some_and(|e| !e.is_empty()),
            CodeType::KernelModule | CodeType::Driver => false,
        })
    }
}
