//! Resource ports — the lifecycle, property and port capabilities of a
//! deployed component.

use std::sync::Arc;

use ossie_domain::error::OssieError;
use ossie_domain::id::ConnectionId;
use ossie_domain::property::DataType;

use super::ObjectRef;

pub trait PropertySet: Send + Sync {
    /// Apply property values.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is rejected by the object.
    fn configure(&self, properties: &[DataType]) -> Result<(), OssieError>;

    /// Read property values; every property when `ids` is empty.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown property id.
    fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError>;
}

pub trait PortSupplier: Send + Sync {
    /// Look up a port by name.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownPort`](ossie_domain::error::PortError)
    /// when the object has no such port.
    fn get_port(&self, name: &str) -> Result<Arc<dyn Port>, OssieError>;
}

/// A deployable component.
pub trait Resource: PropertySet + PortSupplier {
    fn identifier(&self) -> String;

    /// # Errors
    ///
    /// Returns an error when the component cannot initialize.
    fn initialize(&self) -> Result<(), OssieError>;

    /// # Errors
    ///
    /// Returns an error when the component cannot start.
    fn start(&self) -> Result<(), OssieError>;

    /// # Errors
    ///
    /// Returns an error when the component cannot stop.
    fn stop(&self) -> Result<(), OssieError>;

    /// Tear down the component; the reference is dead afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error when the component cannot release its resources.
    fn release_object(&self) -> Result<(), OssieError>;
}

/// A data port. Uses ports initiate connections to a target object.
pub trait Port: Send + Sync {
    fn name(&self) -> String;

    /// # Errors
    ///
    /// Returns a [`PortError`](ossie_domain::error::PortError) when the port
    /// cannot connect or the id is already in use.
    fn connect_port(&self, target: ObjectRef, connection_id: &ConnectionId)
    -> Result<(), OssieError>;

    /// # Errors
    ///
    /// Returns [`PortError::NotConnected`](ossie_domain::error::PortError)
    /// for an unknown connection id.
    fn disconnect_port(&self, connection_id: &ConnectionId) -> Result<(), OssieError>;

    fn is_connected(&self, connection_id: &ConnectionId) -> bool;
}
