//! Domain manager — registry and coordinator of one deployment domain.

use std::sync::Arc;

use ossie_domain::descriptor::{self, Connection, EndpointTarget};
use ossie_domain::error::{InvalidReferenceError, NotRegisteredError, OssieError};
use ossie_domain::event::{EventType, SourceCategory};
use ossie_domain::id::{DeviceId, DeviceManagerId, FactoryId};
use ossie_domain::naming;

use crate::context::DomainContext;
use crate::ports::{Device, DeviceManagerHandle, EventPublisher, ObjectRef};
use crate::services::application::{Application, ReleaseReport};
use crate::services::application_factory::ApplicationFactory;
use crate::services::file_manager::FileManager;
use crate::services::registry::{DeviceNode, PendingConnection, ServiceConnection, ServiceNode};
use crate::services::wiring;

pub struct DomainManager<P> {
    ctx: Arc<DomainContext<P>>,
}

impl<P: EventPublisher + Send + Sync + 'static> DomainManager<P> {
    pub fn new(ctx: Arc<DomainContext<P>>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<DomainContext<P>> {
        &self.ctx
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.ctx.identifier
    }

    #[must_use]
    pub fn file_manager(&self) -> &Arc<FileManager> {
        &self.ctx.file_manager
    }

    #[must_use]
    pub fn device_managers(&self) -> Vec<Arc<dyn DeviceManagerHandle>> {
        self.ctx.registry.device_managers()
    }

    #[must_use]
    pub fn devices(&self) -> Vec<DeviceNode> {
        self.ctx.registry.devices()
    }

    #[must_use]
    pub fn services(&self) -> Vec<ServiceNode> {
        self.ctx.registry.services()
    }

    #[must_use]
    pub fn application_factories(&self) -> Vec<Arc<ApplicationFactory<P>>> {
        self.ctx.factories()
    }

    #[must_use]
    pub fn applications(&self) -> Vec<Arc<Application<P>>> {
        self.ctx.applications()
    }

    /// Register a node: mount its file system under `/<label>`, then
    /// register every device and service it already holds. Registering a
    /// manager twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFileName` when the mount point is taken, or the
    /// first device/service registration error.
    #[tracing::instrument(skip(self, manager), fields(manager = %manager.label()))]
    pub async fn register_device_manager(
        &self,
        manager: Arc<dyn DeviceManagerHandle>,
    ) -> Result<(), OssieError> {
        let id = manager.identifier();
        if !self.ctx.registry.add_device_manager(Arc::clone(&manager)) {
            tracing::debug!("device manager already registered");
            return Ok(());
        }
        let label = manager.label();
        if let Err(err) = self
            .ctx
            .file_manager
            .mount(&naming::device_manager_mount(&label), manager.file_system())
        {
            let _ = self.ctx.registry.remove_device_manager(&id);
            return Err(err);
        }
        self.ctx
            .emit(EventType::ObjectAdded, id.as_str(), &label, SourceCategory::DeviceManager)
            .await;
        tracing::info!(manager = %id, "device manager registered");

        for device in manager.registered_devices() {
            self.register_device(device, &id).await?;
        }
        for (name, object) in manager.registered_services() {
            self.register_service(object, &id, &name).await?;
        }
        Ok(())
    }

    /// Remove a node with its devices, services and file system mount.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for an unknown manager.
    #[tracing::instrument(skip(self))]
    pub async fn unregister_device_manager(&self, id: &DeviceManagerId) -> Result<(), OssieError> {
        let manager = self
            .ctx
            .registry
            .device_manager(id)
            .ok_or_else(|| InvalidReferenceError::new("device manager", id.as_str()))?;
        for service in self.services().into_iter().filter(|s| &s.manager == id) {
            self.unregister_service(&service.name).await?;
        }
        for device in self.devices().into_iter().filter(|d| &d.manager == id) {
            self.unregister_device(&device.identifier).await?;
        }
        self.ctx.registry.remove_device_manager(id)?;
        let label = manager.label();
        if let Err(err) = self
            .ctx
            .file_manager
            .unmount(&naming::device_manager_mount(&label))
        {
            tracing::warn!(error = %err, "device manager file system was not mounted");
        }
        self.ctx
            .emit(EventType::ObjectRemoved, id.as_str(), &label, SourceCategory::DeviceManager)
            .await;
        tracing::info!("device manager unregistered");
        Ok(())
    }

    /// Register a device of a registered node and establish the node's
    /// service connections that use it. Registering a device twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NotRegisteredError::DeviceManager`] when `manager` is not
    /// registered.
    #[tracing::instrument(skip(self, device), fields(device = %device.label()))]
    pub async fn register_device(
        &self,
        device: Arc<dyn Device>,
        manager: &DeviceManagerId,
    ) -> Result<(), OssieError> {
        let owner = self
            .ctx
            .registry
            .device_manager(manager)
            .ok_or_else(|| NotRegisteredError::DeviceManager(manager.to_string()))?;
        let node = DeviceNode {
            identifier: device.device_id(),
            label: device.label(),
            device,
            manager: manager.clone(),
            manager_label: owner.label(),
        };
        if !self.ctx.registry.add_device(node.clone()) {
            tracing::debug!("device already registered");
            return Ok(());
        }
        for connection in owner
            .connections()
            .into_iter()
            .filter(|c| c.provides.service_name().is_some() && uses_device(c, &node))
        {
            self.establish(manager, connection);
        }
        self.ctx
            .emit(
                EventType::ObjectAdded,
                node.identifier.as_str(),
                &node.label,
                SourceCategory::Device,
            )
            .await;
        tracing::info!(device = %node.identifier, "device registered");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for an unknown device.
    #[tracing::instrument(skip(self))]
    pub async fn unregister_device(&self, id: &DeviceId) -> Result<(), OssieError> {
        let node = self.ctx.registry.remove_device(id)?;
        self.ctx
            .emit(
                EventType::ObjectRemoved,
                id.as_str(),
                &node.label,
                SourceCategory::Device,
            )
            .await;
        tracing::info!("device unregistered");
        Ok(())
    }

    /// Register a service and resolve every pending connection waiting for
    /// it. Registering a name twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NotRegisteredError::DeviceManager`] when `manager` is not
    /// registered.
    #[tracing::instrument(skip(self, object))]
    pub async fn register_service(
        &self,
        object: ObjectRef,
        manager: &DeviceManagerId,
        name: &str,
    ) -> Result<(), OssieError> {
        if self.ctx.registry.device_manager(manager).is_none() {
            return Err(NotRegisteredError::DeviceManager(manager.to_string()).into());
        }
        let added = self.ctx.registry.add_service(ServiceNode {
            name: name.to_string(),
            object,
            manager: manager.clone(),
        });
        if !added {
            tracing::debug!("service already registered");
            return Ok(());
        }
        for pending in self.ctx.registry.take_pending_for(name) {
            self.establish(&pending.manager, pending.connection);
        }
        self.ctx
            .emit(EventType::ObjectAdded, name, name, SourceCategory::Service)
            .await;
        tracing::info!("service registered");
        Ok(())
    }

    /// Unregister a service; connections using it are disconnected and
    /// queued again until the service returns.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for an unknown service.
    #[tracing::instrument(skip(self))]
    pub async fn unregister_service(&self, name: &str) -> Result<(), OssieError> {
        self.ctx.registry.remove_service(name)?;
        for established in self.ctx.registry.take_established_for(name) {
            if let Err(err) = established.port.disconnect_port(&established.connection.id) {
                tracing::warn!(connection = %established.connection.id, error = %err, "service disconnect failed");
            }
            self.ctx.registry.push_pending(PendingConnection {
                manager: established.manager,
                connection: established.connection,
            });
        }
        self.ctx
            .emit(EventType::ObjectRemoved, name, name, SourceCategory::Service)
            .await;
        tracing::info!("service unregistered");
        Ok(())
    }

    /// Connect a node-declared service connection now, or queue it until
    /// its service registers.
    fn establish(&self, manager: &DeviceManagerId, connection: Connection) {
        if self.ctx.registry.is_established(manager, &connection.id) {
            return;
        }
        let service = connection.provides.service_name().unwrap_or_default();
        if self.ctx.registry.service(service).is_none() {
            tracing::debug!(connection = %connection.id, service, "service connection pending");
            self.ctx.registry.push_pending(PendingConnection {
                manager: manager.clone(),
                connection,
            });
            return;
        }
        match wiring::connect_service(&self.ctx.registry, self.ctx.naming.as_ref(), &connection) {
            Ok(port) => self.ctx.registry.record_established(ServiceConnection {
                manager: manager.clone(),
                connection,
                port,
            }),
            Err(err) => {
                tracing::warn!(connection = %connection.id, error = %err, "service connection failed, keeping it pending");
                self.ctx.registry.push_pending(PendingConnection {
                    manager: manager.clone(),
                    connection,
                });
            }
        }
    }

    /// Install an assembly and create its application factory. Installing
    /// an assembly whose id is already installed is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the assembly or any
    /// package, property or component descriptor it references is missing
    /// or malformed.
    #[tracing::instrument(skip(self))]
    pub async fn install_application(&self, profile: &str) -> Result<FactoryId, OssieError> {
        let assembly = self.ctx.profiles.software_assembly(profile)?;
        for file in &assembly.component_files {
            self.ctx
                .profiles
                .validate_package(&descriptor::resolve_relative(profile, &file.file))?;
        }
        if self.ctx.factory(&assembly.id).is_some() {
            tracing::debug!(factory = %assembly.id, "assembly already installed");
            return Ok(assembly.id);
        }
        let factory = Arc::new(ApplicationFactory::load(Arc::clone(&self.ctx), profile)?);
        let id = factory.identifier().clone();
        self.ctx.add_factory(Arc::clone(&factory));
        self.ctx
            .emit(
                EventType::ObjectAdded,
                id.as_str(),
                factory.name(),
                SourceCategory::ApplicationFactory,
            )
            .await;
        tracing::info!(factory = %id, "application installed");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns [`NotRegisteredError::ApplicationFactory`] for an unknown id.
    #[tracing::instrument(skip(self))]
    pub async fn uninstall_application(&self, id: &FactoryId) -> Result<(), OssieError> {
        let factory = self
            .ctx
            .remove_factory(id)
            .ok_or_else(|| NotRegisteredError::ApplicationFactory(id.to_string()))?;
        self.ctx
            .emit(
                EventType::ObjectRemoved,
                id.as_str(),
                factory.name(),
                SourceCategory::ApplicationFactory,
            )
            .await;
        tracing::info!("application uninstalled");
        Ok(())
    }

    /// Release every live application and uninstall every factory.
    #[tracing::instrument(skip(self), fields(domain = %self.ctx.name))]
    pub async fn shutdown(&self) -> Vec<ReleaseReport> {
        let mut reports = Vec::new();
        for application in self.applications().into_iter().rev() {
            match application.release_object().await {
                Ok(report) => reports.push(report),
                Err(err) => tracing::warn!(application = %application.name(), error = %err, "release failed"),
            }
        }
        for factory in self.application_factories() {
            if let Err(err) = self.uninstall_application(factory.identifier()).await {
                tracing::warn!(factory = %factory.identifier(), error = %err, "uninstall failed");
            }
        }
        reports
    }
}

/// Whether the uses side of `connection` designates `device`.
fn uses_device(connection: &Connection, device: &DeviceNode) -> bool {
    match &connection.uses.target {
        EndpointTarget::Component(id) => id.as_str() == device.identifier.as_str(),
        EndpointTarget::NamingService(name) => naming::strip_domain_prefix(name) == device.label,
    }
}
