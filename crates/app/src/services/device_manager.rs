//! Device manager — boots and registers the devices of one node.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use ossie_domain::descriptor::{
    self, Connection, DeviceConfiguration, DevicePlacement, Implementation, PropertyKind,
    SimpleProperty,
};
use ossie_domain::error::{
    ComponentFailure, DeploymentError, InvalidReferenceError, OssieError, PartialFailure,
    ProfileError,
};
use ossie_domain::device::DeviceManagerState;
use ossie_domain::id::{DeviceId, DeviceManagerId};
use ossie_domain::launch::DeviceLaunchArgs;
use ossie_domain::matcher;
use ossie_domain::naming;
use ossie_domain::property::{self, DataType};

use crate::ports::{
    Device, DeviceLauncher, DeviceManagerHandle, EventPublisher, FileSystem, NamingService,
    ObjectRef,
};
use crate::retry::{PollPolicy, poll_until};
use crate::services::domain_manager::DomainManager;
use crate::services::profiles::ProfileLoader;

/// Collaborators of a device manager.
pub struct NodeEnvironment<P> {
    pub domain: Arc<DomainManager<P>>,
    pub naming: Arc<dyn NamingService>,
    pub launcher: Arc<dyn DeviceLauncher>,
    /// The node's own file system, holding its descriptors and binaries.
    pub file_system: Arc<dyn FileSystem>,
    pub poll: PollPolicy,
}

#[derive(Default)]
struct Registered {
    devices: Vec<Arc<dyn Device>>,
    services: Vec<(String, ObjectRef)>,
    implementations: BTreeMap<DeviceId, String>,
}

/// Device package properties split by how they reach the device.
#[derive(Default)]
struct DeviceProperties {
    capacities: Vec<DataType>,
    configure: Vec<DataType>,
}

impl DeviceProperties {
    fn insert(&mut self, simple: &SimpleProperty, value: DataType) {
        let target = if simple.is_capacity() {
            &mut self.capacities
        } else {
            &mut self.configure
        };
        property::upsert(target, value);
    }
}

pub struct DeviceManager<P> {
    env: NodeEnvironment<P>,
    profiles: ProfileLoader,
    profile: String,
    configuration: DeviceConfiguration,
    node: Implementation,
    state: RwLock<DeviceManagerState>,
    registered: RwLock<Registered>,
    this: Weak<Self>,
}

impl<P: EventPublisher + Send + Sync + 'static> DeviceManager<P> {
    /// Read the node's device configuration at `profile` and the package
    /// describing the node itself.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when either descriptor is
    /// missing or malformed.
    pub fn load(env: NodeEnvironment<P>, profile: &str) -> Result<Arc<Self>, OssieError> {
        let profiles = ProfileLoader::new(Arc::clone(&env.file_system));
        let configuration = profiles.device_configuration(profile)?;
        let spd_path =
            descriptor::resolve_relative(profile, &configuration.device_manager_softpkg);
        let node = profiles
            .software_package(&spd_path)?
            .implementations
            .into_iter()
            .next()
            .ok_or_else(|| ProfileError::MissingSection {
                path: spd_path,
                section: "implementation",
            })?;
        Ok(Arc::new_cyclic(|this| Self {
            env,
            profiles,
            profile: profile.to_string(),
            configuration,
            node,
            state: RwLock::new(DeviceManagerState::Unregistered),
            registered: RwLock::new(Registered::default()),
            this: this.clone(),
        }))
    }

    #[must_use]
    pub fn state(&self) -> DeviceManagerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: DeviceManagerState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn handle(&self) -> Option<Arc<dyn DeviceManagerHandle>> {
        self.this
            .upgrade()
            .map(|this| this as Arc<dyn DeviceManagerHandle>)
    }

    /// Register with the domain, then launch every device placed in the
    /// node configuration. Devices are booted independently: one failing
    /// device does not keep the others from registering.
    ///
    /// # Errors
    ///
    /// Returns the domain's error when the node cannot register and
    /// [`OssieError::PartialFailure`] listing every device that failed to
    /// boot.
    #[tracing::instrument(skip(self), fields(node = %self.configuration.name))]
    pub async fn boot(&self) -> Result<(), OssieError> {
        let handle = self
            .handle()
            .ok_or_else(|| InvalidReferenceError::new("device manager", self.configuration.id.as_str()))?;
        self.set_state(DeviceManagerState::Registered);
        if let Err(err) = self.env.domain.register_device_manager(handle).await {
            self.set_state(DeviceManagerState::Unregistered);
            return Err(err);
        }
        tracing::info!(devices = self.configuration.placements.len(), "device manager registered");

        let mut failures = Vec::new();
        for placement in &self.configuration.placements {
            if let Err(error) = self.boot_device(placement).await {
                tracing::error!(device = %placement.id, error = %error, "device failed to boot");
                failures.push(ComponentFailure {
                    component: placement.id.to_string(),
                    error,
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PartialFailure {
                operation: "boot",
                failures,
            }
            .into())
        }
    }

    async fn boot_device(&self, placement: &DevicePlacement) -> Result<(), OssieError> {
        let file = self
            .configuration
            .component_file(&placement.file_ref)
            .ok_or_else(|| ProfileError::Malformed {
                path: self.profile.clone(),
                reason: format!("unknown component file `{}`", placement.file_ref),
            })?;
        let spd_path = descriptor::resolve_relative(&self.profile, &file.file);
        let spd = self.profiles.software_package(&spd_path)?;
        let implementation = matcher::match_node_implementation(&spd.implementations, &self.node)
            .ok_or_else(|| DeploymentError::NoMatchingImplementation(placement.id.to_string()))?;
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .implementations
            .insert(placement.id.clone(), implementation.id.to_string());

        let args = DeviceLaunchArgs {
            device_mgr_ior: self.configuration.id.to_string(),
            profile_name: spd_path.clone(),
            device_id: placement.id.clone(),
            device_label: placement.usage_name.clone(),
            naming_context_ior: Some(self.env.naming.stringify()),
        };
        self.env.launcher.launch(&args)?;
        tracing::debug!(device = %placement.id, implementation = %implementation.id, "device launched");

        let binding = naming::in_domain(&placement.usage_name);
        let naming = &self.env.naming;
        let object = poll_until(&self.env.poll, &binding, || match naming.resolve(&binding) {
            Ok(object) => Ok(Some(object)),
            Err(err) if err.is_name_not_found() => Ok(None),
            Err(err) => Err(err),
        })
        .await?;
        let device = object
            .as_device()
            .ok_or_else(|| DeploymentError::NotAResource(binding.clone()))?;

        device.initialize()?;
        let properties = self.device_properties(&spd_path, &spd, implementation, placement)?;
        if !properties.capacities.is_empty() {
            device.declare_capacities(&properties.capacities)?;
        }
        if !properties.configure.is_empty() {
            device.configure(&properties.configure)?;
        }
        self.register_device(device).await
    }

    /// Capacity and configure properties of a device package with the
    /// placement overrides applied.
    fn device_properties(
        &self,
        spd_path: &str,
        spd: &descriptor::SoftPkg,
        implementation: &Implementation,
        placement: &DevicePlacement,
    ) -> Result<DeviceProperties, OssieError> {
        let files = self.profiles.package_properties(spd_path, spd, implementation)?;
        let simples: Vec<_> = files.iter().flat_map(|f| f.simples.iter()).collect();
        let mut properties = DeviceProperties::default();
        for simple in &simples {
            if !(simple.has_kind(PropertyKind::Configure) || simple.is_capacity()) {
                continue;
            }
            if let Some(value) = simple.data_type()? {
                properties.insert(simple, value);
            }
        }
        for overridden in &placement.properties {
            let simple = simples
                .iter()
                .find(|s| s.id == overridden.id)
                .ok_or_else(|| ProfileError::UnknownProperty(overridden.id.clone()))?;
            let value = simple.kind.parse_value(&simple.id, &overridden.value)?;
            properties.insert(simple, DataType::new(simple.id.clone(), value));
        }
        Ok(properties)
    }

    /// Record a device of this node and, while registered, forward it to
    /// the domain. Registering a device twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the domain's registration error.
    #[tracing::instrument(skip(self, device), fields(device = %device.label()))]
    pub async fn register_device(&self, device: Arc<dyn Device>) -> Result<(), OssieError> {
        let id = device.device_id();
        {
            let mut registered = self.registered.write().unwrap_or_else(PoisonError::into_inner);
            if registered.devices.iter().any(|d| d.device_id() == id) {
                return Ok(());
            }
            registered.devices.push(Arc::clone(&device));
        }
        if self.state() == DeviceManagerState::Registered {
            self.env
                .domain
                .register_device(device, &self.configuration.id)
                .await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for a device this node does
    /// not hold.
    #[tracing::instrument(skip(self))]
    pub async fn unregister_device(&self, id: &DeviceId) -> Result<(), OssieError> {
        {
            let mut registered = self.registered.write().unwrap_or_else(PoisonError::into_inner);
            let idx = registered
                .devices
                .iter()
                .position(|d| &d.device_id() == id)
                .ok_or_else(|| InvalidReferenceError::new("device", id.as_str()))?;
            registered.devices.remove(idx);
        }
        if self.state() == DeviceManagerState::Registered {
            self.env.domain.unregister_device(id).await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the domain's registration error.
    #[tracing::instrument(skip(self, object))]
    pub async fn register_service(&self, name: &str, object: ObjectRef) -> Result<(), OssieError> {
        {
            let mut registered = self.registered.write().unwrap_or_else(PoisonError::into_inner);
            if registered.services.iter().any(|(n, _)| n == name) {
                return Ok(());
            }
            registered.services.push((name.to_string(), object.clone()));
        }
        if self.state() == DeviceManagerState::Registered {
            self.env
                .domain
                .register_service(object, &self.configuration.id, name)
                .await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for a service this node
    /// does not hold.
    #[tracing::instrument(skip(self))]
    pub async fn unregister_service(&self, name: &str) -> Result<(), OssieError> {
        {
            let mut registered = self.registered.write().unwrap_or_else(PoisonError::into_inner);
            let idx = registered
                .services
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(|| InvalidReferenceError::new("service", name))?;
            registered.services.remove(idx);
        }
        if self.state() == DeviceManagerState::Registered {
            self.env.domain.unregister_service(name).await?;
        }
        Ok(())
    }

    /// Release and unregister every device, newest first, then leave the
    /// domain. Every step is attempted; failures are logged.
    #[tracing::instrument(skip(self), fields(node = %self.configuration.name))]
    pub async fn shutdown(&self) {
        if self.state() == DeviceManagerState::ShuttingDown {
            return;
        }
        let was_registered = self.state() == DeviceManagerState::Registered;
        self.set_state(DeviceManagerState::ShuttingDown);
        let registered = std::mem::take(&mut *self.registered.write().unwrap_or_else(PoisonError::into_inner));

        for (name, _) in registered.services.iter().rev() {
            if was_registered {
                if let Err(err) = self.env.domain.unregister_service(name).await {
                    tracing::warn!(service = %name, error = %err, "service unregistration failed");
                }
            }
        }
        for device in registered.devices.iter().rev() {
            let id = device.device_id();
            if was_registered {
                if let Err(err) = self.env.domain.unregister_device(&id).await {
                    tracing::warn!(device = %id, error = %err, "device unregistration failed");
                }
            }
            if let Err(err) = device.release_object() {
                tracing::warn!(device = %id, error = %err, "device release failed");
            }
        }
        if was_registered {
            if let Err(err) = self
                .env
                .domain
                .unregister_device_manager(&self.configuration.id)
                .await
            {
                tracing::warn!(error = %err, "device manager unregistration failed");
            }
        }
        tracing::info!("device manager shut down");
    }
}

impl<P: EventPublisher + Send + Sync + 'static> DeviceManagerHandle for DeviceManager<P> {
    fn identifier(&self) -> DeviceManagerId {
        self.configuration.id.clone()
    }

    fn label(&self) -> String {
        self.configuration.name.clone()
    }

    fn device_configuration_profile(&self) -> String {
        self.profile.clone()
    }

    fn file_system(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.env.file_system)
    }

    fn registered_devices(&self) -> Vec<Arc<dyn Device>> {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .devices
            .clone()
    }

    fn registered_services(&self) -> Vec<(String, ObjectRef)> {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .services
            .clone()
    }

    fn connections(&self) -> Vec<Connection> {
        self.configuration.connections.clone()
    }

    fn component_implementation_id(&self, device: &DeviceId) -> String {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .implementations
            .get(device)
            .cloned()
            .unwrap_or_default()
    }
}
