//! Property file descriptor (PRF).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::property::{DataType, PropertyType};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyFile {
    #[serde(default)]
    pub simples: Vec<SimpleProperty>,
}

impl PropertyFile {
    /// Check that ids are unique and declared values parse.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] describing the first violation.
    pub fn validate(&self, path: &str) -> Result<(), ProfileError> {
        let mut seen = BTreeSet::new();
        for property in &self.simples {
            if property.id.is_empty() {
                return Err(ProfileError::MissingSection {
                    path: path.to_string(),
                    section: "property id",
                });
            }
            if !seen.insert(property.id.as_str()) {
                return Err(ProfileError::Malformed {
                    path: path.to_string(),
                    reason: format!("duplicate property `{}`", property.id),
                });
            }
            property.data_type()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleProperty {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub kinds: Vec<PropertyKind>,
    #[serde(default)]
    pub action: Option<Action>,
}

impl SimpleProperty {
    /// Properties with no explicit kind are configure properties.
    #[must_use]
    pub fn has_kind(&self, kind: PropertyKind) -> bool {
        if self.kinds.is_empty() {
            return kind == PropertyKind::Configure;
        }
        self.kinds.contains(&kind)
    }

    /// An allocation property consumed from a device rather than compared.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        self.has_kind(PropertyKind::Allocation)
            && matches!(self.action, None | Some(Action::External))
    }

    /// The declared value, typed. `None` when no value is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] when the value does not parse.
    pub fn data_type(&self) -> Result<Option<DataType>, ProfileError> {
        self.value
            .as_deref()
            .map(|text| {
                self.kind.parse_value(&self.id, text).map(|value| DataType {
                    id: self.id.clone(),
                    value,
                })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Configure,
    Execparam,
    Allocation,
    Factoryparam,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    External,
}
