//! Connection wiring — resolves both endpoints of a declared connection
//! and connects the uses port.

use std::collections::BTreeMap;
use std::sync::Arc;

use ossie_domain::descriptor::{Connection, EndpointTarget, ProvidesEndpoint};
use ossie_domain::error::{DeploymentError, NotRegisteredError, OssieError};
use ossie_domain::id::{ComponentId, DeviceId};
use ossie_domain::naming;

use crate::ports::{NamingService, ObjectRef, Port};
use crate::services::registry::DomainRegistry;

/// A connection made on behalf of an application, undone on release.
#[derive(Clone)]
pub struct ConnectionRecord {
    pub connection: Connection,
    pub port: Arc<dyn Port>,
}

impl std::fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.connection.id)
            .field("port", &self.port.name())
            .finish()
    }
}

/// Resolves connection endpoints for one application.
pub struct ConnectionResolver<'a> {
    naming: &'a dyn NamingService,
    registry: &'a DomainRegistry,
    app_context: &'a str,
    components: &'a BTreeMap<ComponentId, ObjectRef>,
}

impl<'a> ConnectionResolver<'a> {
    pub fn new(
        naming: &'a dyn NamingService,
        registry: &'a DomainRegistry,
        app_context: &'a str,
        components: &'a BTreeMap<ComponentId, ObjectRef>,
    ) -> Self {
        Self {
            naming,
            registry,
            app_context,
            components,
        }
    }

    /// Resolve both endpoints of `connection` and connect its uses port.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::UnresolvedEndpoint`] when an endpoint
    /// cannot be resolved or narrowed, and the port error when the connect
    /// call itself fails.
    pub fn connect(&self, connection: &Connection) -> Result<ConnectionRecord, OssieError> {
        let unresolved = |endpoint: &str| DeploymentError::UnresolvedEndpoint {
            connection: connection.id.clone(),
            endpoint: endpoint.to_string(),
        };
        let uses_object = self
            .target(&connection.uses.target)
            .ok_or_else(|| unresolved(&connection.uses.port))?;
        let port = uses_object
            .as_resource()
            .ok_or_else(|| unresolved(&connection.uses.port))?
            .get_port(&connection.uses.port)
            .map_err(|_| unresolved(&connection.uses.port))?;

        let provides = match &connection.provides {
            ProvidesEndpoint::Port { port, target } => {
                let object = self.target(target).ok_or_else(|| unresolved(port))?;
                let provided = object
                    .as_resource()
                    .ok_or_else(|| unresolved(port))?
                    .get_port(port)
                    .map_err(|_| unresolved(port))?;
                ObjectRef::Port(provided)
            }
            ProvidesEndpoint::FindBy(name) => self.find_by(name).map_err(|_| unresolved(name))?,
            ProvidesEndpoint::Service(name) => self
                .registry
                .service(name)
                .map(|s| s.object)
                .ok_or_else(|| unresolved(name))?,
        };

        port.connect_port(provides, &connection.id)?;
        tracing::debug!(connection = %connection.id, port = %connection.uses.port, "port connected");
        Ok(ConnectionRecord {
            connection: connection.clone(),
            port,
        })
    }

    fn target(&self, target: &EndpointTarget) -> Option<ObjectRef> {
        match target {
            EndpointTarget::Component(id) => self.components.get(id).cloned(),
            EndpointTarget::NamingService(name) => self.find_by(name).ok(),
        }
    }

    /// Naming-service lookup: the application context first, then the
    /// domain root.
    fn find_by(&self, name: &str) -> Result<ObjectRef, OssieError> {
        let name = naming::strip_domain_prefix(name);
        self.naming
            .resolve(&naming::join(self.app_context, name))
            .or_else(|err| {
                if err.is_name_not_found() {
                    self.naming.resolve(&naming::in_domain(name))
                } else {
                    Err(err)
                }
            })
    }
}

/// Connect a node-declared connection whose provides side is a registered
/// service; the uses side is one of the node's devices.
///
/// # Errors
///
/// Returns [`NotRegisteredError::Service`] when the service is missing and
/// [`DeploymentError::UnresolvedEndpoint`] when the uses side cannot be
/// resolved.
pub fn connect_service(
    registry: &DomainRegistry,
    naming_service: &dyn NamingService,
    connection: &Connection,
) -> Result<Arc<dyn Port>, OssieError> {
    let unresolved = || DeploymentError::UnresolvedEndpoint {
        connection: connection.id.clone(),
        endpoint: connection.uses.port.clone(),
    };
    let service_name = connection.provides.service_name().unwrap_or_default();
    let service = registry
        .service(service_name)
        .ok_or_else(|| NotRegisteredError::Service(service_name.to_string()))?;
    let uses = match &connection.uses.target {
        EndpointTarget::Component(id) => registry
            .device(&DeviceId::new(id.as_str()))
            .map(|node| ObjectRef::Device(node.device))
            .ok_or_else(unresolved)?,
        EndpointTarget::NamingService(name) => naming_service
            .resolve(&naming::in_domain(naming::strip_domain_prefix(name)))
            .map_err(|_| unresolved())?,
    };
    let port = uses
        .as_resource()
        .ok_or_else(unresolved)?
        .get_port(&connection.uses.port)
        .map_err(|_| unresolved())?;
    port.connect_port(service.object, &connection.id)?;
    tracing::debug!(connection = %connection.id, service = service_name, "service connection established");
    Ok(port)
}
