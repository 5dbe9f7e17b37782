//! Device — a registered resource with allocatable capacity.
//!
//! [`DeviceCore`] holds the state machine shared by every device
//! implementation; adapters wrap it in a device-scoped lock.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capacity::CapacityLedger;
use crate::error::{CapacityError, InvalidStateError, OssieError};
use crate::id::DeviceId;
use crate::property::{DataType, PropertyValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminState {
    Locked,
    Unlocked,
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageState {
    Idle,
    Active,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceManagerState {
    Unregistered,
    Registered,
    ShuttingDown,
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Locked => "LOCKED",
            Self::Unlocked => "UNLOCKED",
            Self::ShuttingDown => "SHUTTING_DOWN",
        })
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        })
    }
}

impl fmt::Display for UsageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Busy => "BUSY",
        })
    }
}

/// State shared by every device implementation.
#[derive(Debug, Clone)]
pub struct DeviceCore {
    identifier: DeviceId,
    label: String,
    software_profile: String,
    admin: AdminState,
    operational: OperationalState,
    usage: UsageState,
    properties: BTreeMap<String, PropertyValue>,
    capacities: CapacityLedger,
}

impl DeviceCore {
    /// A freshly launched device is unlocked, enabled and idle.
    pub fn new(
        identifier: DeviceId,
        label: impl Into<String>,
        software_profile: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            label: label.into(),
            software_profile: software_profile.into(),
            admin: AdminState::Unlocked,
            operational: OperationalState::Enabled,
            usage: UsageState::Idle,
            properties: BTreeMap::new(),
            capacities: CapacityLedger::new(),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &DeviceId {
        &self.identifier
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn software_profile(&self) -> &str {
        &self.software_profile
    }

    #[must_use]
    pub fn admin_state(&self) -> AdminState {
        self.admin
    }

    #[must_use]
    pub fn operational_state(&self) -> OperationalState {
        self.operational
    }

    #[must_use]
    pub fn usage_state(&self) -> UsageState {
        self.usage
    }

    pub fn set_admin_state(&mut self, state: AdminState) {
        self.admin = state;
    }

    pub fn set_operational_state(&mut self, state: OperationalState) {
        self.operational = state;
    }

    /// Track the package's allocation properties as capacities. The first
    /// value declared for each becomes its baseline. Non-integer values are
    /// kept as plain properties.
    pub fn declare_capacities(&mut self, capacities: &[DataType]) {
        for capacity in capacities {
            if !self.capacities.record(&capacity.id, &capacity.value) {
                self.properties
                    .insert(capacity.id.clone(), capacity.value.clone());
            }
        }
    }

    /// Store configured values. A value for a declared capacity resets its
    /// current amount; everything else is a plain property.
    pub fn configure(&mut self, properties: &[DataType]) {
        for property in properties {
            let is_capacity = self.capacities.current(&property.id).is_some()
                && self.capacities.record(&property.id, &property.value);
            if !is_capacity {
                self.properties
                    .insert(property.id.clone(), property.value.clone());
            }
        }
    }

    /// Return the requested properties, or every property when `ids` is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::UnknownProperty`] for an id that was never
    /// configured.
    pub fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError> {
        if ids.is_empty() {
            let mut all: Vec<DataType> = self
                .properties
                .iter()
                .map(|(id, value)| DataType::new(id.clone(), value.clone()))
                .collect();
            all.extend(self.capacities.snapshot());
            return Ok(all);
        }
        ids.iter()
            .map(|id| {
                self.properties
                    .get(id)
                    .or_else(|| self.capacities.current(id))
                    .map(|value| DataType::new(id.clone(), value.clone()))
                    .ok_or_else(|| CapacityError::UnknownProperty(id.clone()).into())
            })
            .collect()
    }

    /// Device must be unlocked and enabled.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] otherwise.
    pub fn ensure_operable(&self) -> Result<(), InvalidStateError> {
        if self.admin != AdminState::Unlocked {
            return Err(InvalidStateError::Admin {
                device: self.identifier.clone(),
                state: self.admin,
            });
        }
        self.ensure_enabled()
    }

    /// Terminate and deallocate stay allowed while shutting down; only a
    /// locked or disabled device refuses them.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] otherwise.
    pub fn ensure_teardown_allowed(&self) -> Result<(), InvalidStateError> {
        if self.admin == AdminState::Locked {
            return Err(InvalidStateError::Admin {
                device: self.identifier.clone(),
                state: self.admin,
            });
        }
        self.ensure_enabled()
    }

    fn ensure_enabled(&self) -> Result<(), InvalidStateError> {
        if self.operational == OperationalState::Disabled {
            return Err(InvalidStateError::Operational {
                device: self.identifier.clone(),
                state: self.operational,
            });
        }
        Ok(())
    }

    /// Consume capacity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the device is unlocked and enabled,
    /// `InvalidCapacity` when the device is busy or the request is invalid.
    /// Capacities are unchanged on error.
    pub fn allocate_capacity(&mut self, requested: &[DataType]) -> Result<(), OssieError> {
        if requested.is_empty() {
            return Ok(());
        }
        self.ensure_operable()?;
        if self.usage == UsageState::Busy {
            return Err(CapacityError::Busy(self.identifier.clone()).into());
        }
        self.capacities.allocate(requested)?;
        self.usage = if self.capacities.is_exhausted() {
            UsageState::Busy
        } else {
            UsageState::Active
        };
        Ok(())
    }

    /// Return capacity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when the device is locked or disabled,
    /// `InvalidCapacity` when the device is idle or the request would exceed
    /// the original bound. Capacities are unchanged on error.
    pub fn deallocate_capacity(&mut self, requested: &[DataType]) -> Result<(), OssieError> {
        if requested.is_empty() {
            return Ok(());
        }
        self.ensure_teardown_allowed()?;
        if self.usage == UsageState::Idle {
            return Err(CapacityError::Idle(self.identifier.clone()).into());
        }
        self.capacities.deallocate(requested)?;
        self.usage = if self.capacities.is_at_baseline() {
            UsageState::Idle
        } else {
            UsageState::Active
        };
        Ok(())
    }

    #[must_use]
    pub fn capacities(&self) -> &CapacityLedger {
        &self.capacities
    }

    /// Refuse new work while the device tears down its processes.
    pub fn begin_shutdown(&mut self) {
        self.admin = AdminState::ShuttingDown;
    }

    /// Terminal state after shutdown.
    pub fn release(&mut self) {
        self.admin = AdminState::Locked;
        self.usage = UsageState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_with_slots(n: u32) -> DeviceCore {
        let mut core = DeviceCore::new(DeviceId::new("DCE:dev-1"), "GPP_1", "/GPP.spd.json");
        core.declare_capacities(&slots(n));
        core.configure(&[DataType::new("os_name", "Linux")]);
        core
    }

    fn slots(n: u32) -> Vec<DataType> {
        vec![DataType::new("slots", PropertyValue::ULong(n))]
    }

    #[test]
    fn should_start_unlocked_enabled_and_idle() {
        let core = device_with_slots(4);
        assert_eq!(core.admin_state(), AdminState::Unlocked);
        assert_eq!(core.operational_state(), OperationalState::Enabled);
        assert_eq!(core.usage_state(), UsageState::Idle);
    }

    #[test]
    fn should_become_active_then_busy_when_capacity_runs_out() {
        let mut core = device_with_slots(4);
        core.allocate_capacity(&slots(2)).unwrap();
        assert_eq!(core.usage_state(), UsageState::Active);
        core.allocate_capacity(&slots(2)).unwrap();
        assert_eq!(core.usage_state(), UsageState::Busy);
    }

    #[test]
    fn should_reject_allocation_when_busy() {
        let mut core = device_with_slots(1);
        core.allocate_capacity(&slots(1)).unwrap();
        let err = core.allocate_capacity(&slots(1)).unwrap_err();
        assert!(matches!(err, OssieError::InvalidCapacity(CapacityError::Busy(_))));
    }

    #[test]
    fn should_reject_allocation_when_locked() {
        let mut core = device_with_slots(4);
        core.set_admin_state(AdminState::Locked);
        let err = core.allocate_capacity(&slots(1)).unwrap_err();
        assert!(matches!(err, OssieError::InvalidState(_)));
    }

    #[test]
    fn should_reject_allocation_when_disabled() {
        let mut core = device_with_slots(4);
        core.set_operational_state(OperationalState::Disabled);
        let err = core.allocate_capacity(&slots(1)).unwrap_err();
        assert!(matches!(err, OssieError::InvalidState(_)));
    }

    #[test]
    fn should_reject_deallocation_when_idle() {
        let mut core = device_with_slots(4);
        let err = core.deallocate_capacity(&slots(1)).unwrap_err();
        assert!(matches!(err, OssieError::InvalidCapacity(CapacityError::Idle(_))));
    }

    #[test]
    fn should_allow_deallocation_while_shutting_down() {
        let mut core = device_with_slots(4);
        core.allocate_capacity(&slots(3)).unwrap();
        core.set_admin_state(AdminState::ShuttingDown);
        core.deallocate_capacity(&slots(3)).unwrap();
        assert_eq!(core.usage_state(), UsageState::Idle);
    }

    #[test]
    fn should_follow_allocation_scenario_on_four_slots() {
        let mut core = device_with_slots(4);
        core.allocate_capacity(&slots(2)).unwrap();
        let err = core.allocate_capacity(&slots(3)).unwrap_err();
        assert!(matches!(
            err,
            OssieError::InvalidCapacity(CapacityError::Insufficient { .. })
        ));
        core.deallocate_capacity(&slots(2)).unwrap();
        core.allocate_capacity(&slots(3)).unwrap();
        assert_eq!(core.usage_state(), UsageState::Active);
        assert_eq!(
            core.capacities().current("slots"),
            Some(&PropertyValue::ULong(1))
        );
    }

    #[test]
    fn should_query_configured_and_capacity_properties() {
        let core = device_with_slots(4);
        let all = core.query(&[]).unwrap();
        assert_eq!(all.len(), 2);
        let one = core.query(&["slots".to_string()]).unwrap();
        assert_eq!(one[0].value, PropertyValue::ULong(4));
        assert!(core.query(&["missing".to_string()]).is_err());
    }

    #[test]
    fn should_not_allocate_a_configured_integer_that_is_not_a_capacity() {
        let mut core = device_with_slots(1);
        core.configure(&[DataType::new("priority", PropertyValue::Long(5))]);

        let err = core
            .allocate_capacity(&[DataType::new("priority", PropertyValue::Long(5))])
            .unwrap_err();

        assert!(matches!(
            err,
            OssieError::InvalidCapacity(CapacityError::UnknownProperty(id)) if id == "priority"
        ));
        assert_eq!(core.capacities().current("priority"), None);
        assert_eq!(
            core.query(&["priority".to_string()]).unwrap()[0].value,
            PropertyValue::Long(5)
        );
    }

    #[test]
    fn should_turn_busy_when_declared_capacities_run_out_despite_integer_properties() {
        let mut core = device_with_slots(1);
        core.configure(&[DataType::new("priority", PropertyValue::Long(5))]);

        core.allocate_capacity(&slots(1)).unwrap();

        assert_eq!(core.usage_state(), UsageState::Busy);
    }

    #[test]
    fn should_keep_baseline_when_a_capacity_is_configured_again() {
        let mut core = device_with_slots(4);
        core.configure(&slots(2));
        assert_eq!(core.capacities().current("slots"), Some(&PropertyValue::ULong(2)));
        assert_eq!(core.capacities().original("slots"), Some(&PropertyValue::ULong(4)));
    }

    #[test]
    fn should_allow_teardown_while_shutting_down_but_not_once_locked() {
        let mut core = device_with_slots(4);
        core.begin_shutdown();
        assert!(core.ensure_operable().is_err());
        assert!(core.ensure_teardown_allowed().is_ok());
        core.release();
        assert!(core.ensure_teardown_allowed().is_err());
    }

    #[test]
    fn should_end_locked_after_release() {
        let mut core = device_with_slots(4);
        core.begin_shutdown();
        assert!(core.ensure_operable().is_err());
        core.release();
        assert_eq!(core.admin_state(), AdminState::Locked);
    }
}
