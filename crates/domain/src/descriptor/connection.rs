//! Connection declarations shared by assembly and device configuration
//! descriptors.

use serde::{Deserialize, Serialize};

use crate::id::{ComponentId, ConnectionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub uses: UsesEndpoint,
    pub provides: ProvidesEndpoint,
}

/// Where an endpoint object is found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointTarget {
    /// A component instantiation (or device) declared in the same descriptor.
    Component(ComponentId),
    /// A naming-service name.
    NamingService(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsesEndpoint {
    pub port: String,
    pub target: EndpointTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvidesEndpoint {
    /// A named provides port of a target object.
    Port { port: String, target: EndpointTarget },
    /// An object found by naming-service name, connected as a whole.
    FindBy(String),
    /// A service registered with the domain manager.
    Service(String),
}

impl ProvidesEndpoint {
    /// Name of the domain service this endpoint waits for, if any.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Self::Service(name) => Some(name),
            _ => None,
        }
    }
}
