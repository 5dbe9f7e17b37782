//! Virtual resources and their ports.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ossie_app::ports::{ObjectRef, Port, PortSupplier, PropertySet, Resource};
use ossie_domain::error::{InvalidReferenceError, OssieError, PortError, ProfileError};
use ossie_domain::id::ConnectionId;
use ossie_domain::property::{self, DataType, PropertyValue};

use crate::catalog::ComponentSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Uses,
    Provides,
}

/// A port holding the targets of its connections.
pub struct VirtualPort {
    name: String,
    direction: PortDirection,
    connections: Mutex<BTreeMap<ConnectionId, ObjectRef>>,
}

impl VirtualPort {
    #[must_use]
    pub fn new(name: &str, direction: PortDirection) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            direction,
            connections: Mutex::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.lock().keys().cloned().collect()
    }

    #[must_use]
    pub fn target(&self, id: &ConnectionId) -> Option<ObjectRef> {
        self.lock().get(id).cloned()
    }

    fn disconnect_all(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, ObjectRef>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Port for VirtualPort {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn connect_port(&self, target: ObjectRef, connection_id: &ConnectionId) -> Result<(), OssieError> {
        if self.direction != PortDirection::Uses {
            return Err(PortError::NotUsesPort(self.name.clone()).into());
        }
        let mut connections = self.lock();
        if connections.contains_key(connection_id) {
            return Err(PortError::AlreadyConnected {
                port: self.name.clone(),
                connection: connection_id.clone(),
            }
            .into());
        }
        connections.insert(connection_id.clone(), target);
        Ok(())
    }

    fn disconnect_port(&self, connection_id: &ConnectionId) -> Result<(), OssieError> {
        self.lock()
            .remove(connection_id)
            .map(|_| ())
            .ok_or_else(|| {
                PortError::NotConnected {
                    port: self.name.clone(),
                    connection: connection_id.clone(),
                }
                .into()
            })
    }

    fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.lock().contains_key(connection_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Constructed,
    Initialized,
    Started,
    Stopped,
    Released,
}

/// A component instantiated in process by a virtual device.
pub struct VirtualResource {
    identifier: String,
    ports: BTreeMap<String, Arc<VirtualPort>>,
    properties: Mutex<Vec<DataType>>,
    exec_parameters: Vec<(String, String)>,
    state: Mutex<ResourceState>,
}

impl VirtualResource {
    /// Build a resource from its manifest. Exec-time parameters become
    /// string-valued properties, overridden by later configuration.
    #[must_use]
    pub fn new(
        identifier: &str,
        spec: &ComponentSpec,
        exec_parameters: Vec<(String, String)>,
    ) -> Arc<Self> {
        let ports = spec
            .uses
            .iter()
            .map(|name| (name, PortDirection::Uses))
            .chain(spec.provides.iter().map(|name| (name, PortDirection::Provides)))
            .map(|(name, direction)| (name.clone(), VirtualPort::new(name, direction)))
            .collect();
        let mut properties = spec.properties.clone();
        for (id, value) in &exec_parameters {
            property::upsert(
                &mut properties,
                DataType::new(id.clone(), PropertyValue::String(value.clone())),
            );
        }
        Arc::new(Self {
            identifier: identifier.to_string(),
            ports,
            properties: Mutex::new(properties),
            exec_parameters,
            state: Mutex::new(ResourceState::Constructed),
        })
    }

    #[must_use]
    pub fn state(&self) -> ResourceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn exec_parameters(&self) -> &[(String, String)] {
        &self.exec_parameters
    }

    #[must_use]
    pub fn port(&self, name: &str) -> Option<Arc<VirtualPort>> {
        self.ports.get(name).cloned()
    }

    /// Process death: the object is gone without a release call.
    pub(crate) fn kill(&self) {
        for port in self.ports.values() {
            port.disconnect_all();
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ResourceState::Released;
    }

    fn transition(&self, to: ResourceState) -> Result<(), OssieError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == ResourceState::Released {
            return Err(InvalidReferenceError::new("component", self.identifier.clone()).into());
        }
        *state = to;
        Ok(())
    }

    fn ensure_alive(&self) -> Result<(), OssieError> {
        if self.state() == ResourceState::Released {
            return Err(InvalidReferenceError::new("component", self.identifier.clone()).into());
        }
        Ok(())
    }
}

impl PropertySet for VirtualResource {
    fn configure(&self, properties: &[DataType]) -> Result<(), OssieError> {
        self.ensure_alive()?;
        let mut stored = self.properties.lock().unwrap_or_else(PoisonError::into_inner);
        for property in properties {
            property::upsert(&mut stored, property.clone());
        }
        Ok(())
    }

    fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError> {
        self.ensure_alive()?;
        let stored = self.properties.lock().unwrap_or_else(PoisonError::into_inner);
        if ids.is_empty() {
            return Ok(stored.clone());
        }
        ids.iter()
            .map(|id| {
                property::find(&stored, id)
                    .cloned()
                    .ok_or_else(|| ProfileError::UnknownProperty(id.clone()).into())
            })
            .collect()
    }
}

impl PortSupplier for VirtualResource {
    fn get_port(&self, name: &str) -> Result<Arc<dyn Port>, OssieError> {
        self.ensure_alive()?;
        self.ports
            .get(name)
            .map(|port| Arc::clone(port) as Arc<dyn Port>)
            .ok_or_else(|| PortError::UnknownPort(name.to_string()).into())
    }
}

impl Resource for VirtualResource {
    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    fn initialize(&self) -> Result<(), OssieError> {
        self.transition(ResourceState::Initialized)
    }

    fn start(&self) -> Result<(), OssieError> {
        self.transition(ResourceState::Started)
    }

    fn stop(&self) -> Result<(), OssieError> {
        self.transition(ResourceState::Stopped)
    }

    fn release_object(&self) -> Result<(), OssieError> {
        self.ensure_alive()?;
        tracing::debug!(component = %self.identifier, "virtual component released");
        self.kill();
        Ok(())
    }
}
