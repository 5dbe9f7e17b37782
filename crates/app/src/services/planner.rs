//! Deployment planning — turns an assembly and a device assignment into
//! the list of required components.

use std::collections::BTreeMap;

use ossie_domain::application::DeviceAssignment;
use ossie_domain::descriptor::{
    self, Code, ComponentInstantiation, ComponentPlacement, Implementation, SoftwareAssembly,
};
use ossie_domain::component::RequiredComponent;
use ossie_domain::error::{DeploymentError, DeploymentRequestError, OssieError, ProfileError};
use ossie_domain::id::{ComponentId, DeviceId};
use ossie_domain::launch::{COMPONENT_IDENTIFIER, NAME_BINDING, NAMING_CONTEXT_IOR};
use ossie_domain::matcher;
use ossie_domain::naming;

use crate::services::profiles::ProfileLoader;
use crate::services::registry::DomainRegistry;

/// Validate a device assignment against an assembly before anything is
/// deployed.
///
/// # Errors
///
/// Returns [`DeploymentRequestError::EmptyAssignments`] for an empty
/// sequence, [`DeploymentRequestError::UnknownComponent`] for an id the
/// assembly does not instantiate,
/// [`DeploymentRequestError::ConflictingAssignment`] when one component is
/// assigned to two devices,
/// [`DeploymentRequestError::UnassignedComponents`] listing every
/// component without an assignment, and
/// [`DeploymentRequestError::CollocationViolation`] when two components of
/// one host collocation are assigned to different devices.
pub fn check_assignments(
    assembly: &SoftwareAssembly,
    assignments: &[DeviceAssignment],
) -> Result<BTreeMap<ComponentId, DeviceId>, DeploymentRequestError> {
    if assignments.is_empty() {
        return Err(DeploymentRequestError::EmptyAssignments);
    }
    let known = assembly.component_ids();
    let mut by_component: BTreeMap<ComponentId, DeviceId> = BTreeMap::new();
    for assignment in assignments {
        if !known.contains(&assignment.component_id) {
            return Err(DeploymentRequestError::UnknownComponent(
                assignment.component_id.clone(),
            ));
        }
        if let Some(first) = by_component.get(&assignment.component_id) {
            if *first != assignment.assigned_device {
                return Err(DeploymentRequestError::ConflictingAssignment {
                    component: assignment.component_id.clone(),
                    first: first.clone(),
                    second: assignment.assigned_device.clone(),
                });
            }
            continue;
        }
        by_component.insert(
            assignment.component_id.clone(),
            assignment.assigned_device.clone(),
        );
    }
    let unassigned: Vec<ComponentId> = known
        .into_iter()
        .filter(|id| !by_component.contains_key(id))
        .collect();
    if !unassigned.is_empty() {
        return Err(DeploymentRequestError::UnassignedComponents(unassigned));
    }
    for collocation in &assembly.host_collocations {
        let mut members = collocation
            .placements
            .iter()
            .flat_map(|p| p.instantiations.iter().map(|i| &i.id));
        let Some(first) = members.next() else {
            continue;
        };
        for other in members {
            if by_component.get(other) != by_component.get(first) {
                return Err(DeploymentRequestError::CollocationViolation {
                    first: first.clone(),
                    second: other.clone(),
                });
            }
        }
    }
    Ok(by_component)
}

/// Check that every assigned device is registered and hosts its
/// components in the domain process.
///
/// # Errors
///
/// Returns [`DeploymentRequestError::UnknownDevice`] for an unregistered
/// device and [`DeploymentRequestError::OutOfProcessDevice`] for a device
/// whose components run as separate processes.
pub fn check_devices(
    registry: &DomainRegistry,
    assignments: &BTreeMap<ComponentId, DeviceId>,
) -> Result<(), DeploymentRequestError> {
    for (component, device) in assignments {
        let node = registry
            .device(device)
            .ok_or_else(|| DeploymentRequestError::UnknownDevice {
                component: component.clone(),
                device: device.clone(),
            })?;
        if !node.device.hosts_in_process() {
            return Err(DeploymentRequestError::OutOfProcessDevice {
                component: component.clone(),
                device: device.clone(),
            });
        }
    }
    Ok(())
}

/// Name a component binds under inside the application context.
///
/// An explicit naming-service name wins (a legacy `DomainName1/` prefix is
/// dropped), then the usage name, then the instantiation id.
#[must_use]
pub fn binding_name(app_context: &str, instantiation: &ComponentInstantiation) -> String {
    let name = instantiation
        .naming_service
        .as_deref()
        .map(naming::strip_domain_prefix)
        .or(instantiation.usage_name.as_deref())
        .unwrap_or(instantiation.id.as_str());
    naming::join(app_context, name)
}

pub struct DeploymentPlanner<'a> {
    profiles: &'a ProfileLoader,
    registry: &'a DomainRegistry,
    naming_ior: String,
}

impl<'a> DeploymentPlanner<'a> {
    pub fn new(
        profiles: &'a ProfileLoader,
        registry: &'a DomainRegistry,
        naming_ior: impl Into<String>,
    ) -> Self {
        Self {
            profiles,
            registry,
            naming_ior: naming_ior.into(),
        }
    }

    /// Resolve every instantiation of `assembly` to an implementation and
    /// its properties.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProfile` for an unreadable descriptor,
    /// [`DeploymentRequestError::UnknownDevice`] for an assignment to an
    /// unregistered device and [`DeploymentError::NoMatchingImplementation`]
    /// when no implementation fits the assigned device.
    pub fn plan(
        &self,
        assembly: &SoftwareAssembly,
        assembly_profile: &str,
        app_context: &str,
        assignments: &BTreeMap<ComponentId, DeviceId>,
    ) -> Result<Vec<RequiredComponent>, OssieError> {
        assembly
            .instantiations()
            .map(|(placement, instantiation)| {
                let device = assignments.get(&instantiation.id).ok_or_else(|| {
                    DeploymentRequestError::UnassignedComponents(vec![instantiation.id.clone()])
                })?;
                self.plan_component(
                    assembly,
                    assembly_profile,
                    app_context,
                    placement,
                    instantiation,
                    device,
                )
            })
            .collect()
    }

    fn plan_component(
        &self,
        assembly: &SoftwareAssembly,
        assembly_profile: &str,
        app_context: &str,
        placement: &ComponentPlacement,
        instantiation: &ComponentInstantiation,
        device: &DeviceId,
    ) -> Result<RequiredComponent, OssieError> {
        let file = assembly.component_file(&placement.file_ref).ok_or_else(|| {
            ProfileError::Malformed {
                path: assembly_profile.to_string(),
                reason: format!("unknown component file `{}`", placement.file_ref),
            }
        })?;
        let spd_path = descriptor::resolve_relative(assembly_profile, &file.file);
        let spd = self.profiles.software_package(&spd_path)?;

        let device_implementations = self.device_implementations(&instantiation.id, device)?;
        let implementation = matcher::match_implementation(
            &spd.implementations,
            &device_implementations,
        )
        .ok_or_else(|| DeploymentError::NoMatchingImplementation(instantiation.id.to_string()))?;

        let name = binding_name(app_context, instantiation);
        let mut component = RequiredComponent::new(
            instantiation.id.clone(),
            implementation.id.clone(),
            device.clone(),
            name.clone(),
        );
        component.usage_name.clone_from(&instantiation.usage_name);
        component.code = implementation.code.as_ref().map(|code| Code {
            local_file: if code.local_file.is_empty() {
                String::new()
            } else {
                descriptor::resolve_relative(&spd_path, &code.local_file)
            },
            ..code.clone()
        });
        match self.profiles.package_descriptor(&spd_path, &spd)? {
            Some(scd) => {
                component.is_resource = scd.is_resource();
                component.is_configurable = scd.is_configurable();
            }
            None => {
                component.is_resource = true;
                component.is_configurable = true;
            }
        }
        for prf in self
            .profiles
            .package_properties(&spd_path, &spd, implementation)?
        {
            component.add_property_file(&prf)?;
        }
        for property in &instantiation.properties {
            component.override_property(&property.id, &property.value)?;
        }
        component.is_assembly_controller = instantiation.id == assembly.assembly_controller;
        component.add_exec_parameter(NAME_BINDING, name);
        component.add_exec_parameter(COMPONENT_IDENTIFIER, instantiation.id.as_str());
        component.add_exec_parameter(NAMING_CONTEXT_IOR, self.naming_ior.as_str());

        tracing::debug!(
            component = %instantiation.id,
            implementation = %implementation.id,
            device = %device,
            "component planned"
        );
        Ok(component)
    }

    /// The implementation the owning device manager launched for `device`;
    /// every implementation of the device package when none was recorded.
    fn device_implementations(
        &self,
        component: &ComponentId,
        device: &DeviceId,
    ) -> Result<Vec<Implementation>, OssieError> {
        let node = self
            .registry
            .device(device)
            .ok_or_else(|| DeploymentRequestError::UnknownDevice {
                component: component.clone(),
                device: device.clone(),
            })?;
        let spd_path = format!(
            "{}{}",
            naming::device_manager_mount(&node.manager_label),
            node.device.software_profile()
        );
        let spd = self.profiles.software_package(&spd_path)?;
        let chosen = self
            .registry
            .device_manager(&node.manager)
            .map(|manager| manager.component_implementation_id(device))
            .unwrap_or_default();
        let implementations = spd
            .implementations
            .iter()
            .filter(|imp| chosen.is_empty() || imp.id.as_str() == chosen)
            .cloned()
            .collect();
        Ok(implementations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembly() -> SoftwareAssembly {
        serde_json::from_value(serde_json::json!({
            "id": "DCE:wave",
            "name": "Wave",
            "component_files": [{"id": "amp", "file": "Amp/Amp.spd.json"}],
            "placements": [
                {"file_ref": "amp", "instantiations": [{"id": "A_1", "usage_name": "Amp"}]}
            ],
            "host_collocations": [{
                "placements": [{"file_ref": "amp", "instantiations": [
                    {"id": "B_1", "naming_service": "DomainName1/Bee"},
                    {"id": "C_1"}
                ]}]
            }],
            "assembly_controller": "A_1"
        }))
        .unwrap()
    }

    #[test]
    fn should_reject_empty_assignment_sequence() {
        assert!(matches!(
            check_assignments(&assembly(), &[]),
            Err(DeploymentRequestError::EmptyAssignments)
        ));
    }

    #[test]
    fn should_list_exactly_the_unassigned_components() {
        let err = check_assignments(
            &assembly(),
            &[
                DeviceAssignment::new("A_1", "gpp"),
                DeviceAssignment::new("C_1", "gpp"),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DeploymentRequestError::UnassignedComponents(ids) if ids == vec![ComponentId::new("B_1")]
        ));
    }

    #[test]
    fn should_reject_assignment_of_unknown_component() {
        let err = check_assignments(
            &assembly(),
            &[
                DeviceAssignment::new("A_1", "gpp"),
                DeviceAssignment::new("B_1", "gpp"),
                DeviceAssignment::new("C_1", "gpp"),
                DeviceAssignment::new("Z_9", "gpp"),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DeploymentRequestError::UnknownComponent(id) if id == ComponentId::new("Z_9")
        ));
    }

    #[test]
    fn should_reject_component_assigned_to_two_devices() {
        let err = check_assignments(
            &assembly(),
            &[
                DeviceAssignment::new("A_1", "gpp"),
                DeviceAssignment::new("A_1", "dsp"),
                DeviceAssignment::new("B_1", "gpp"),
                DeviceAssignment::new("C_1", "gpp"),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DeploymentRequestError::ConflictingAssignment { component, first, second }
                if component == ComponentId::new("A_1")
                    && first == DeviceId::new("gpp")
                    && second == DeviceId::new("dsp")
        ));
    }

    #[test]
    fn should_accept_a_repeated_identical_assignment() {
        let assigned = check_assignments(
            &assembly(),
            &[
                DeviceAssignment::new("A_1", "gpp"),
                DeviceAssignment::new("A_1", "gpp"),
                DeviceAssignment::new("B_1", "gpp"),
                DeviceAssignment::new("C_1", "gpp"),
            ],
        )
        .unwrap();
        assert_eq!(assigned.len(), 3);
    }

    #[test]
    fn should_reject_split_host_collocation() {
        let err = check_assignments(
            &assembly(),
            &[
                DeviceAssignment::new("A_1", "gpp"),
                DeviceAssignment::new("B_1", "gpp"),
                DeviceAssignment::new("C_1", "dsp"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, DeploymentRequestError::CollocationViolation { .. }));
    }

    #[test]
    fn should_name_components_under_application_context() {
        let sad = assembly();
        let names: Vec<String> = sad
            .instantiations()
            .map(|(_, i)| binding_name("DomainName1/Wave_1", i))
            .collect();
        assert_eq!(
            names,
            vec![
                "DomainName1/Wave_1/Amp",
                "DomainName1/Wave_1/Bee",
                "DomainName1/Wave_1/C_1",
            ]
        );
    }
}
