//! Capacity ledger — allocatable numeric properties of one device.
//!
//! Every integer-typed allocation property declared on a device is
//! tracked here.
//! The first value seen for an id becomes its immutable baseline;
//! deallocation can never raise a capacity above that baseline.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::CapacityError;
use crate::property::{DataType, PropertyValue};

#[derive(Debug, Clone, Default)]
pub struct CapacityLedger {
    current: BTreeMap<String, PropertyValue>,
    original: BTreeMap<String, PropertyValue>,
}

impl CapacityLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a capacity value. Returns `false` for non-integer values,
    /// which cannot be allocated.
    pub fn record(&mut self, id: &str, value: &PropertyValue) -> bool {
        if !value.is_integer() {
            return false;
        }
        self.original
            .entry(id.to_string())
            .or_insert_with(|| value.clone());
        self.current.insert(id.to_string(), value.clone());
        true
    }

    #[must_use]
    pub fn current(&self, id: &str) -> Option<&PropertyValue> {
        self.current.get(id)
    }

    #[must_use]
    pub fn original(&self, id: &str) -> Option<&PropertyValue> {
        self.original.get(id)
    }

    /// Subtract every requested amount, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`CapacityError`] for an unknown id, a type mismatch, a
    /// negative amount or insufficient capacity. The ledger is left
    /// untouched on error.
    pub fn allocate(&mut self, requested: &[DataType]) -> Result<(), CapacityError> {
        let mut next = self.current.clone();
        for request in requested {
            let current = Self::checked_entry(&next, request)?;
            let remaining = match request.value.compare(current) {
                Some(Ordering::Greater) | None => None,
                Some(_) => current.checked_sub(&request.value),
            }
            .ok_or_else(|| CapacityError::Insufficient {
                id: request.id.clone(),
                requested: request.value.to_string(),
                available: current.to_string(),
            })?;
            next.insert(request.id.clone(), remaining);
        }
        self.current = next;
        Ok(())
    }

    /// Add every requested amount back, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`CapacityError`] for an unknown id, a type mismatch, a
    /// negative amount, or when the result would exceed the baseline. The
    /// ledger is left untouched on error.
    pub fn deallocate(&mut self, requested: &[DataType]) -> Result<(), CapacityError> {
        let mut next = self.current.clone();
        for request in requested {
            let current = Self::checked_entry(&next, request)?;
            let exceeds = || CapacityError::ExceedsOriginal(request.id.clone());
            let restored = current.checked_add(&request.value).ok_or_else(exceeds)?;
            let original = self.original.get(&request.id).ok_or_else(exceeds)?;
            if restored.compare(original) == Some(Ordering::Greater) {
                return Err(exceeds());
            }
            next.insert(request.id.clone(), restored);
        }
        self.current = next;
        Ok(())
    }

    fn checked_entry<'a>(
        values: &'a BTreeMap<String, PropertyValue>,
        request: &DataType,
    ) -> Result<&'a PropertyValue, CapacityError> {
        let current = values
            .get(&request.id)
            .ok_or_else(|| CapacityError::UnknownProperty(request.id.clone()))?;
        if !current.same_type(&request.value) {
            return Err(CapacityError::TypeMismatch {
                id: request.id.clone(),
                expected: current.type_name(),
                found: request.value.type_name(),
            });
        }
        if request.value.is_negative() {
            return Err(CapacityError::Negative(request.id.clone()));
        }
        Ok(current)
    }

    /// Every tracked capacity has reached zero.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.current.is_empty() && self.current.values().all(PropertyValue::is_zero)
    }

    /// Every tracked capacity equals its baseline.
    #[must_use]
    pub fn is_at_baseline(&self) -> bool {
        self.current
            .iter()
            .all(|(id, value)| self.original.get(id) == Some(value))
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<DataType> {
        self.current
            .iter()
            .map(|(id, value)| DataType::new(id.clone(), value.clone()))
            .collect()
    }
}
