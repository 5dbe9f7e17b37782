//! Domain registry — device managers, devices and services currently
//! registered with the domain, plus service connections.
//!
//! All operations take one registry-scoped lock; concurrent registrations
//! from several device managers never interleave.

use std::sync::{Arc, PoisonError, RwLock};

use ossie_domain::descriptor::Connection;
use ossie_domain::error::{InvalidReferenceError, OssieError};
use ossie_domain::id::{ConnectionId, DeviceId, DeviceManagerId};

use crate::ports::{Device, DeviceManagerHandle, ObjectRef, Port};

#[derive(Clone)]
pub struct DeviceNode {
    pub identifier: DeviceId,
    pub label: String,
    pub device: Arc<dyn Device>,
    pub manager: DeviceManagerId,
    pub manager_label: String,
}

#[derive(Clone)]
pub struct ServiceNode {
    pub name: String,
    pub object: ObjectRef,
    pub manager: DeviceManagerId,
}

/// A node-declared connection waiting for its service to register.
#[derive(Debug, Clone)]
pub struct PendingConnection {
    pub manager: DeviceManagerId,
    pub connection: Connection,
}

/// A node-declared connection currently established to a service.
#[derive(Clone)]
pub struct ServiceConnection {
    pub manager: DeviceManagerId,
    pub connection: Connection,
    pub port: Arc<dyn Port>,
}

#[derive(Default)]
struct RegistryState {
    managers: Vec<Arc<dyn DeviceManagerHandle>>,
    devices: Vec<DeviceNode>,
    services: Vec<ServiceNode>,
    pending: Vec<PendingConnection>,
    established: Vec<ServiceConnection>,
}

#[derive(Default)]
pub struct DomainRegistry {
    state: RwLock<RegistryState>,
}

impl DomainRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&RegistryState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut RegistryState) -> T) -> T {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns `false` when a manager with the same identifier is present.
    pub fn add_device_manager(&self, manager: Arc<dyn DeviceManagerHandle>) -> bool {
        self.write(|s| {
            let id = manager.identifier();
            if s.managers.iter().any(|m| m.identifier() == id) {
                return false;
            }
            s.managers.push(manager);
            true
        })
    }

    /// Remove a manager together with its devices, services and connections.
    ///
    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for an unknown manager.
    pub fn remove_device_manager(
        &self,
        id: &DeviceManagerId,
    ) -> Result<Arc<dyn DeviceManagerHandle>, OssieError> {
        self.write(|s| {
            let idx = s
                .managers
                .iter()
                .position(|m| &m.identifier() == id)
                .ok_or_else(|| InvalidReferenceError::new("device manager", id.as_str()))?;
            s.devices.retain(|d| &d.manager != id);
            s.services.retain(|svc| &svc.manager != id);
            s.pending.retain(|p| &p.manager != id);
            s.established.retain(|c| &c.manager != id);
            Ok(s.managers.remove(idx))
        })
    }

    #[must_use]
    pub fn device_manager(&self, id: &DeviceManagerId) -> Option<Arc<dyn DeviceManagerHandle>> {
        self.read(|s| s.managers.iter().find(|m| &m.identifier() == id).cloned())
    }

    #[must_use]
    pub fn device_managers(&self) -> Vec<Arc<dyn DeviceManagerHandle>> {
        self.read(|s| s.managers.clone())
    }

    /// Returns `false` when a device with the same identifier is present.
    pub fn add_device(&self, node: DeviceNode) -> bool {
        self.write(|s| {
            if s.devices.iter().any(|d| d.identifier == node.identifier) {
                return false;
            }
            s.devices.push(node);
            true
        })
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for an unknown device.
    pub fn remove_device(&self, id: &DeviceId) -> Result<DeviceNode, OssieError> {
        self.write(|s| {
            let idx = s
                .devices
                .iter()
                .position(|d| &d.identifier == id)
                .ok_or_else(|| InvalidReferenceError::new("device", id.as_str()))?;
            Ok(s.devices.remove(idx))
        })
    }

    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<DeviceNode> {
        self.read(|s| s.devices.iter().find(|d| &d.identifier == id).cloned())
    }

    #[must_use]
    pub fn devices(&self) -> Vec<DeviceNode> {
        self.read(|s| s.devices.clone())
    }

    /// Returns `false` when a service with the same name is present.
    pub fn add_service(&self, node: ServiceNode) -> bool {
        self.write(|s| {
            if s.services.iter().any(|svc| svc.name == node.name) {
                return false;
            }
            s.services.push(node);
            true
        })
    }

    /// # Errors
    ///
    /// Returns [`OssieError::InvalidReference`] for an unknown service.
    pub fn remove_service(&self, name: &str) -> Result<ServiceNode, OssieError> {
        self.write(|s| {
            let idx = s
                .services
                .iter()
                .position(|svc| svc.name == name)
                .ok_or_else(|| InvalidReferenceError::new("service", name))?;
            Ok(s.services.remove(idx))
        })
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<ServiceNode> {
        self.read(|s| s.services.iter().find(|svc| svc.name == name).cloned())
    }

    #[must_use]
    pub fn services(&self) -> Vec<ServiceNode> {
        self.read(|s| s.services.clone())
    }

    pub fn push_pending(&self, pending: PendingConnection) {
        self.write(|s| {
            let duplicate = s.pending.iter().any(|p| {
                p.manager == pending.manager && p.connection.id == pending.connection.id
            });
            if !duplicate {
                s.pending.push(pending);
            }
        });
    }

    /// Remove and return the pending connections that wait for `service`.
    pub fn take_pending_for(&self, service: &str) -> Vec<PendingConnection> {
        self.write(|s| {
            let (matching, rest) = std::mem::take(&mut s.pending)
                .into_iter()
                .partition(|p| p.connection.provides.service_name() == Some(service));
            s.pending = rest;
            matching
        })
    }

    #[must_use]
    pub fn pending(&self) -> Vec<PendingConnection> {
        self.read(|s| s.pending.clone())
    }

    pub fn record_established(&self, connection: ServiceConnection) {
        self.write(|s| s.established.push(connection));
    }

    /// Remove and return the established connections to `service`.
    pub fn take_established_for(&self, service: &str) -> Vec<ServiceConnection> {
        self.write(|s| {
            let (matching, rest) = std::mem::take(&mut s.established)
                .into_iter()
                .partition(|c| c.connection.provides.service_name() == Some(service));
            s.established = rest;
            matching
        })
    }

    #[must_use]
    pub fn is_established(&self, manager: &DeviceManagerId, id: &ConnectionId) -> bool {
        self.read(|s| {
            s.established
                .iter()
                .any(|c| &c.manager == manager && &c.connection.id == id)
        })
    }
}
