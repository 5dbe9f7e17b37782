//! Typed property values exchanged through `configure`, `query`,
//! allocation and exec parameters.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Declared type of a simple property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Boolean,
    Short,
    UShort,
    Long,
    ULong,
    Double,
    String,
}

impl PropertyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    /// Parse the textual form found in descriptors into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] when `text` does not parse as
    /// this type.
    pub fn parse_value(self, id: &str, text: &str) -> Result<PropertyValue, ProfileError> {
        let invalid = || ProfileError::InvalidValue {
            id: id.to_string(),
            kind: self.as_str(),
            value: text.to_string(),
        };
        let text = text.trim();
        let value = match self {
            Self::Boolean => PropertyValue::Boolean(text.parse().map_err(|_| invalid())?),
            Self::Short => PropertyValue::Short(text.parse().map_err(|_| invalid())?),
            Self::UShort => PropertyValue::UShort(text.parse().map_err(|_| invalid())?),
            Self::Long => PropertyValue::Long(text.parse().map_err(|_| invalid())?),
            Self::ULong => PropertyValue::ULong(text.parse().map_err(|_| invalid())?),
            Self::Double => PropertyValue::Double(text.parse().map_err(|_| invalid())?),
            Self::String => PropertyValue::String(text.to_string()),
        };
        Ok(value)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed property value.
///
/// Integer variants support the checked arithmetic used by capacity
/// accounting; values of different variants never compare or combine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    Boolean(bool),
    Short(i16),
    UShort(u16),
    Long(i32),
    ULong(u32),
    Double(f64),
    String(String),
}

macro_rules! integer_binop {
    ($lhs:expr, $rhs:expr, $op:ident) => {
        match ($lhs, $rhs) {
            (Self::Short(a), Self::Short(b)) => a.$op(*b).map(Self::Short),
            (Self::UShort(a), Self::UShort(b)) => a.$op(*b).map(Self::UShort),
            (Self::Long(a), Self::Long(b)) => a.$op(*b).map(Self::Long),
            (Self::ULong(a), Self::ULong(b)) => a.$op(*b).map(Self::ULong),
            _ => None,
        }
    };
}

impl PropertyValue {
    #[must_use]
    pub fn kind(&self) -> PropertyType {
        match self {
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Short(_) => PropertyType::Short,
            Self::UShort(_) => PropertyType::UShort,
            Self::Long(_) => PropertyType::Long,
            Self::ULong(_) => PropertyType::ULong,
            Self::Double(_) => PropertyType::Double,
            Self::String(_) => PropertyType::String,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    #[must_use]
    pub fn same_type(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// `true` for the integer widths that can act as capacities.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Short(_) | Self::UShort(_) | Self::Long(_) | Self::ULong(_)
        )
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Short(v) => *v == 0,
            Self::UShort(v) => *v == 0,
            Self::Long(v) => *v == 0,
            Self::ULong(v) => *v == 0,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Short(v) => *v < 0,
            Self::Long(v) => *v < 0,
            Self::Double(v) => *v < 0.0,
            _ => false,
        }
    }

    /// Order two integer values of the same width.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Short(a), Self::Short(b)) => Some(a.cmp(b)),
            (Self::UShort(a), Self::UShort(b)) => Some(a.cmp(b)),
            (Self::Long(a), Self::Long(b)) => Some(a.cmp(b)),
            (Self::ULong(a), Self::ULong(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        integer_binop!(self, other, checked_add)
    }

    #[must_use]
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        integer_binop!(self, other, checked_sub)
    }

    /// Re-parse `text` with the same declared type as `self`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] when `text` does not parse.
    pub fn reparse(&self, id: &str, text: &str) -> Result<Self, ProfileError> {
        self.kind().parse_value(id, text)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => v.fmt(f),
            Self::Short(v) => v.fmt(f),
            Self::UShort(v) => v.fmt(f),
            Self::Long(v) => v.fmt(f),
            Self::ULong(v) => v.fmt(f),
            Self::Double(v) => v.fmt(f),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// An `(id, value)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    pub id: String,
    pub value: PropertyValue,
}

impl DataType {
    pub fn new(id: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Find a property by id.
#[must_use]
pub fn find<'a>(properties: &'a [DataType], id: &str) -> Option<&'a DataType> {
    properties.iter().find(|p| p.id == id)
}

/// Replace the value of `id` if present, append otherwise.
pub fn upsert(properties: &mut Vec<DataType>, property: DataType) {
    match properties.iter_mut().find(|p| p.id == property.id) {
        Some(existing) => existing.value = property.value,
        None => properties.push(property),
    }
}
