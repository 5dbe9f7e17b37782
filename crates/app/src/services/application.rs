//! Application — the live handle of a deployed assembly.

use std::sync::{Arc, Mutex, PoisonError};

use ossie_domain::application::{ApplicationState, DeployedComponent, DeviceAssignment};
use ossie_domain::error::{
    ComponentFailure, DeploymentError, InvalidReferenceError, OssieError, PartialFailure, PortError,
};
use ossie_domain::event::{EventType, SourceCategory};
use ossie_domain::id::{ApplicationId, ComponentId, DeviceId, ImplementationId, ProcessId};
use ossie_domain::property::DataType;

use crate::context::DomainContext;
use crate::ports::{Device, EventPublisher, PropertySet, Resource};
use crate::services::wiring::ConnectionRecord;

/// Failures swallowed while releasing an application.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub failures: Vec<ComponentFailure>,
}

impl ReleaseReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, component: &str, step: &str, error: OssieError) {
        tracing::warn!(component, step, error = %error, "release step failed");
        self.failures.push(ComponentFailure {
            component: component.to_string(),
            error,
        });
    }
}

pub struct Application<P> {
    ctx: Arc<DomainContext<P>>,
    identifier: ApplicationId,
    name: String,
    profile: String,
    naming_context: String,
    components: Vec<DeployedComponent>,
    assembly_controller_id: ComponentId,
    assembly_controller: Arc<dyn Resource>,
    connections: Mutex<Vec<ConnectionRecord>>,
    state: Mutex<ApplicationState>,
}

/// Everything a successful deployment hands over to its application.
pub(crate) struct Deployment {
    pub name: String,
    pub profile: String,
    pub naming_context: String,
    pub components: Vec<DeployedComponent>,
    pub assembly_controller_id: ComponentId,
    pub assembly_controller: Arc<dyn Resource>,
    pub connections: Vec<ConnectionRecord>,
}

impl<P: EventPublisher + Send + Sync + 'static> Application<P> {
    pub(crate) fn new(ctx: Arc<DomainContext<P>>, deployment: Deployment) -> Self {
        Self {
            ctx,
            identifier: ApplicationId::generate(),
            name: deployment.name,
            profile: deployment.profile,
            naming_context: deployment.naming_context,
            components: deployment.components,
            assembly_controller_id: deployment.assembly_controller_id,
            assembly_controller: deployment.assembly_controller,
            connections: Mutex::new(deployment.connections),
            state: Mutex::new(ApplicationState::Created),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &ApplicationId {
        &self.identifier
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the assembly descriptor this application was created from.
    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    #[must_use]
    pub fn naming_context(&self) -> &str {
        &self.naming_context
    }

    #[must_use]
    pub fn state(&self) -> ApplicationState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn component_devices(&self) -> Vec<DeviceAssignment> {
        self.components
            .iter()
            .map(|c| DeviceAssignment {
                component_id: c.component_id.clone(),
                assigned_device: c.assigned_device.clone(),
            })
            .collect()
    }

    #[must_use]
    pub fn component_implementations(&self) -> Vec<(ComponentId, ImplementationId)> {
        self.components
            .iter()
            .map(|c| (c.component_id.clone(), c.implementation_id.clone()))
            .collect()
    }

    #[must_use]
    pub fn component_naming_contexts(&self) -> Vec<(ComponentId, String)> {
        self.components
            .iter()
            .map(|c| (c.component_id.clone(), c.naming_name.clone()))
            .collect()
    }

    #[must_use]
    pub fn component_process_ids(&self) -> Vec<(ComponentId, ProcessId)> {
        self.components
            .iter()
            .filter_map(|c| c.process_id().map(|pid| (c.component_id.clone(), pid)))
            .collect()
    }

    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionRecord> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn assembly_controller_id(&self) -> &ComponentId {
        &self.assembly_controller_id
    }

    #[must_use]
    pub fn assembly_controller(&self) -> Arc<dyn Resource> {
        Arc::clone(&self.assembly_controller)
    }

    fn ensure_live(&self) -> Result<(), OssieError> {
        self.state().ensure_live(&self.name)?;
        Ok(())
    }

    /// Resource bound for a component, resolved through the naming service.
    fn resource(&self, component: &DeployedComponent) -> Result<Arc<dyn Resource>, OssieError> {
        self.ctx
            .naming
            .resolve(&component.naming_name)?
            .as_resource()
            .ok_or_else(|| DeploymentError::NotAResource(component.naming_name.clone()).into())
    }

    /// Run `call` on every resource component, the assembly controller
    /// `first` or last, collecting every failure.
    fn fan_out(
        &self,
        operation: &'static str,
        controller_first: bool,
        call: impl Fn(&dyn Resource) -> Result<(), OssieError>,
    ) -> Result<(), OssieError> {
        self.ensure_live()?;
        let (controller, others): (Vec<&DeployedComponent>, Vec<&DeployedComponent>) = self
            .components
            .iter()
            .filter(|c| c.is_resource)
            .partition(|c| c.component_id == self.assembly_controller_id);
        let ordered: Vec<&DeployedComponent> = if controller_first {
            controller.into_iter().chain(others).collect()
        } else {
            others.into_iter().chain(controller).collect()
        };
        let mut failures = Vec::new();
        for component in ordered {
            if let Err(error) = self.resource(component).and_then(|r| call(r.as_ref())) {
                tracing::warn!(component = %component.component_id, operation, error = %error, "component call failed");
                failures.push(ComponentFailure {
                    component: component.component_id.to_string(),
                    error,
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PartialFailure {
                operation,
                failures,
            }
            .into())
        }
    }

    /// Start every component, the assembly controller last.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` once released and [`OssieError::PartialFailure`]
    /// listing every component that failed to start; the others are started.
    #[tracing::instrument(skip(self), fields(application = %self.name))]
    pub fn start(&self) -> Result<(), OssieError> {
        self.fan_out("start", false, |r| r.start())?;
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ApplicationState::Started;
        tracing::info!("application started");
        Ok(())
    }

    /// Stop every component, the assembly controller first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` once released and [`OssieError::PartialFailure`]
    /// listing every component that failed to stop; the others are stopped.
    #[tracing::instrument(skip(self), fields(application = %self.name))]
    pub fn stop(&self) -> Result<(), OssieError> {
        self.fan_out("stop", true, |r| r.stop())?;
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ApplicationState::Stopped;
        tracing::info!("application stopped");
        Ok(())
    }

    fn device(&self, id: &DeviceId) -> Result<Arc<dyn Device>, OssieError> {
        self.ctx
            .registry
            .device(id)
            .map(|node| node.device)
            .ok_or_else(|| InvalidReferenceError::new("device", id.as_str()).into())
    }

    /// Tear the application down: disconnect every connection, then per
    /// component (newest first) release, terminate, unload and deallocate;
    /// finally destroy the naming context and leave the domain.
    ///
    /// Each failing step is recorded in the report and the teardown goes on.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError::AlreadyReleased`](ossie_domain::error::InvalidStateError)
    /// when called on a released application.
    #[tracing::instrument(skip(self), fields(application = %self.name))]
    pub async fn release_object(&self) -> Result<ReleaseReport, OssieError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.ensure_live(&self.name)?;
            *state = ApplicationState::Released;
        }
        let mut report = ReleaseReport::default();

        let connections =
            std::mem::take(&mut *self.connections.lock().unwrap_or_else(PoisonError::into_inner));
        for record in connections {
            match record.port.disconnect_port(&record.connection.id) {
                Ok(()) | Err(OssieError::Port(PortError::NotConnected { .. })) => {}
                Err(err) => report.record(record.connection.id.as_str(), "disconnect", err),
            }
        }

        for component in self.components.iter().rev() {
            self.release_component(component, &mut report);
        }

        if let Err(err) = self.ctx.naming.destroy_context(&self.naming_context) {
            report.record(&self.naming_context, "destroy naming context", err);
        }
        self.ctx.remove_application(&self.identifier);
        self.ctx
            .emit(
                EventType::ObjectRemoved,
                self.identifier.as_str(),
                &self.name,
                SourceCategory::Application,
            )
            .await;
        tracing::info!(failures = report.failures.len(), "application released");
        Ok(report)
    }

    fn release_component(&self, component: &DeployedComponent, report: &mut ReleaseReport) {
        let id = component.component_id.as_str();
        if component.is_resource {
            if let Err(err) = self.resource(component).and_then(|r| r.release_object()) {
                report.record(id, "release", err);
            }
        }
        if let Some((device, pid)) = &component.executed {
            let result = self.device(device).and_then(|d| match d.as_executable() {
                Some(executable) => executable.terminate(*pid),
                None => Err(DeploymentError::NoExecutableDevice(component.component_id.clone()).into()),
            });
            if let Err(err) = result {
                report.record(id, "terminate", err);
            }
        }
        if let Some((device, file_name)) = &component.loaded {
            let result = self.device(device).and_then(|d| match d.as_loadable() {
                Some(loadable) => loadable.unload(file_name),
                None => Err(DeploymentError::NoLoadableDevice(component.component_id.clone()).into()),
            });
            if let Err(err) = result {
                report.record(id, "unload", err);
            }
        }
        if !component.allocation.is_empty() {
            let result = self
                .device(&component.assigned_device)
                .and_then(|d| d.deallocate_capacity(&component.allocation));
            if let Err(err) = result {
                report.record(id, "deallocate", err);
            }
        }
        tracing::debug!(component = id, "component released");
    }
}

impl<P: EventPublisher + Send + Sync + 'static> PropertySet for Application<P> {
    /// Configure the assembly controller.
    fn configure(&self, properties: &[DataType]) -> Result<(), OssieError> {
        self.ensure_live()?;
        self.assembly_controller.configure(properties)
    }

    /// Query the assembly controller.
    fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError> {
        self.ensure_live()?;
        self.assembly_controller.query(ids)
    }
}
