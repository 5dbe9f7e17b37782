//! Application factory — turns an installed assembly into running
//! applications.

use std::collections::BTreeMap;
use std::sync::Arc;

use ossie_domain::application::{DeployedComponent, DeviceAssignment};
use ossie_domain::component::RequiredComponent;
use ossie_domain::descriptor::SoftwareAssembly;
use ossie_domain::error::{DeploymentError, NamingError, OssieError};
use ossie_domain::event::{EventType, SourceCategory};
use ossie_domain::id::{ComponentId, DeviceId, FactoryId};
use ossie_domain::naming;
use ossie_domain::property::DataType;

use crate::context::DomainContext;
use crate::ports::{EventPublisher, ObjectRef, Resource};
use crate::retry::poll_until;
use crate::services::application::{Application, Deployment};
use crate::services::journal::{DeploymentJournal, Step};
use crate::services::loader::ComponentLoader;
use crate::services::planner::{self, DeploymentPlanner};
use crate::services::wiring::ConnectionResolver;

pub struct ApplicationFactory<P> {
    ctx: Arc<DomainContext<P>>,
    identifier: FactoryId,
    name: String,
    profile: String,
    assembly: SoftwareAssembly,
}

impl<P: EventPublisher + Send + Sync + 'static> ApplicationFactory<P> {
    /// Read and validate the assembly descriptor at `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidProfile`] when the descriptor is missing,
    /// malformed or incomplete.
    pub fn load(ctx: Arc<DomainContext<P>>, profile: &str) -> Result<Self, OssieError> {
        let assembly = ctx.profiles.software_assembly(profile)?;
        Ok(Self {
            ctx,
            identifier: assembly.id.clone(),
            name: assembly.name.clone(),
            profile: profile.to_string(),
            assembly,
        })
    }

    #[must_use]
    pub fn identifier(&self) -> &FactoryId {
        &self.identifier
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn software_profile(&self) -> &str {
        &self.profile
    }

    #[must_use]
    pub fn assembly(&self) -> &SoftwareAssembly {
        &self.assembly
    }

    /// Deploy the assembly as application `name`.
    ///
    /// Components are planned, allocated, loaded, executed, initialized,
    /// configured and wired in that order. Any failure undoes every side
    /// effect made so far before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDeploymentRequest` for an incomplete or inconsistent
    /// assignment (nothing is touched in that case), `InvalidCapacity` when
    /// a device cannot host a component, [`OssieError::Timeout`] when a
    /// launched component never registers, and [`OssieError::Deployment`]
    /// for every other deployment failure.
    #[tracing::instrument(skip(self, initial_configuration, assignments), fields(factory = %self.name))]
    pub async fn create(
        &self,
        name: &str,
        initial_configuration: &[DataType],
        assignments: &[DeviceAssignment],
    ) -> Result<Arc<Application<P>>, OssieError> {
        let assignments = planner::check_assignments(&self.assembly, assignments)?;
        planner::check_devices(&self.ctx.registry, &assignments)?;
        let mut journal = DeploymentJournal::new();
        let result = self
            .deploy(name, initial_configuration, &assignments, &mut journal)
            .await;
        match result {
            Ok(deployment) => {
                journal.commit();
                let application = Arc::new(Application::new(Arc::clone(&self.ctx), deployment));
                self.ctx.add_application(Arc::clone(&application));
                self.ctx
                    .emit(
                        EventType::ObjectAdded,
                        application.identifier().as_str(),
                        application.name(),
                        SourceCategory::Application,
                    )
                    .await;
                tracing::info!(
                    application = %application.identifier(),
                    context = %application.naming_context(),
                    "application created"
                );
                Ok(application)
            }
            Err(err) => {
                tracing::error!(error = %err, steps = journal.len(), "application creation failed, rolling back");
                journal.rollback();
                Err(err)
            }
        }
    }

    async fn deploy(
        &self,
        name: &str,
        initial_configuration: &[DataType],
        assignments: &BTreeMap<ComponentId, DeviceId>,
        journal: &mut DeploymentJournal,
    ) -> Result<Deployment, OssieError> {
        let app_context = self.bind_context(name)?;
        journal.record(Step::NamingContext {
            naming: Arc::clone(&self.ctx.naming),
            path: app_context.clone(),
        });

        let planned = DeploymentPlanner::new(
            &self.ctx.profiles,
            &self.ctx.registry,
            self.ctx.naming.stringify(),
        )
        .plan(&self.assembly, &self.profile, &app_context, assignments)?;

        let loader = ComponentLoader::new(&self.ctx.file_manager, &self.ctx.registry);
        let mut components = Vec::with_capacity(planned.len());
        for component in &planned {
            components.push(loader.deploy(component, journal)?);
        }

        let mut objects = BTreeMap::new();
        let mut assembly_controller = None;
        for (component, deployed) in planned.iter().zip(&components) {
            if !component.is_resource {
                continue;
            }
            let object = self.wait_for_binding(deployed).await?;
            let resource = object
                .as_resource()
                .ok_or_else(|| DeploymentError::NotAResource(deployed.naming_name.clone()))?;
            self.start_resource(component, &resource, initial_configuration, journal)?;
            if component.is_assembly_controller {
                assembly_controller = Some(resource);
            }
            objects.insert(component.identifier.clone(), object);
        }
        let assembly_controller = assembly_controller
            .ok_or_else(|| DeploymentError::MissingAssemblyController(name.to_string()))?;

        let resolver = ConnectionResolver::new(
            self.ctx.naming.as_ref(),
            &self.ctx.registry,
            &app_context,
            &objects,
        );
        let mut connections = Vec::with_capacity(self.assembly.connections.len());
        for connection in &self.assembly.connections {
            let record = resolver.connect(connection)?;
            journal.record(Step::Connection {
                port: Arc::clone(&record.port),
                connection: connection.id.clone(),
            });
            connections.push(record);
        }

        Ok(Deployment {
            name: name.to_string(),
            profile: self.profile.clone(),
            naming_context: app_context,
            components,
            assembly_controller_id: self.assembly.assembly_controller.clone(),
            assembly_controller,
            connections,
        })
    }

    /// Bind the first free `DomainName1/<name>_<n>` context.
    fn bind_context(&self, name: &str) -> Result<String, OssieError> {
        let mut n = 1;
        loop {
            let path = naming::application_context(name, n);
            match self.ctx.naming.bind_new_context(&path) {
                Ok(()) => return Ok(path),
                Err(OssieError::Naming(NamingError::AlreadyBound(_))) => n += 1,
                Err(err) => return Err(err),
            }
        }
    }

    async fn wait_for_binding(&self, component: &DeployedComponent) -> Result<ObjectRef, OssieError> {
        let naming = &self.ctx.naming;
        poll_until(&self.ctx.poll, &component.naming_name, || {
            match naming.resolve(&component.naming_name) {
                Ok(object) => Ok(Some(object)),
                Err(err) if err.is_name_not_found() => Ok(None),
                Err(err) => Err(err),
            }
        })
        .await
    }

    /// Initialize and configure a freshly bound resource. The assembly
    /// controller also receives the caller's initial configuration ahead
    /// of its descriptor properties.
    fn start_resource(
        &self,
        component: &RequiredComponent,
        resource: &Arc<dyn Resource>,
        initial_configuration: &[DataType],
        journal: &mut DeploymentJournal,
    ) -> Result<(), OssieError> {
        resource.initialize()?;
        journal.record(Step::Initialize {
            component: component.identifier.to_string(),
            resource: Arc::clone(resource),
        });
        let properties = component.configure_properties();
        if component.is_assembly_controller {
            if !initial_configuration.is_empty() {
                resource.configure(initial_configuration)?;
            }
            if !properties.is_empty() {
                resource.configure(&properties)?;
            }
        } else if component.is_configurable && !properties.is_empty() {
            resource.configure(&properties)?;
        }
        tracing::debug!(component = %component.identifier, "component initialized");
        Ok(())
    }
}
