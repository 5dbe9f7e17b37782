//! Object references — opaque capability handles returned by naming
//! resolution.

use std::fmt;
use std::sync::Arc;

use super::{Device, Port, Resource};

/// A reference bound in the naming service.
///
/// In-process objects are held as live handles; objects living in another
/// process are only known by their stringified reference.
#[derive(Clone)]
pub enum ObjectRef {
    Resource(Arc<dyn Resource>),
    Device(Arc<dyn Device>),
    Port(Arc<dyn Port>),
    Stringified(String),
}

impl ObjectRef {
    /// Narrow to the resource capability. Devices are resources.
    #[must_use]
    pub fn as_resource(&self) -> Option<Arc<dyn Resource>> {
        match self {
            Self::Resource(resource) => Some(Arc::clone(resource)),
            Self::Device(device) => Some(Arc::clone(device) as Arc<dyn Resource>),
            Self::Port(_) | Self::Stringified(_) => None,
        }
    }

    #[must_use]
    pub fn as_device(&self) -> Option<Arc<dyn Device>> {
        match self {
            Self::Device(device) => Some(Arc::clone(device)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_port(&self) -> Option<Arc<dyn Port>> {
        match self {
            Self::Port(port) => Some(Arc::clone(port)),
            _ => None,
        }
    }

    /// Identity comparison: both references designate the same object.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Resource(a), Self::Resource(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Self::Device(a), Self::Device(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Self::Port(a), Self::Port(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Self::Stringified(a), Self::Stringified(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(r) => f.debug_tuple("Resource").field(&r.identifier()).finish(),
            Self::Device(d) => f.debug_tuple("Device").field(&d.identifier()).finish(),
            Self::Port(p) => f.debug_tuple("Port").field(&p.name()).finish(),
            Self::Stringified(s) => f.debug_tuple("Stringified").field(s).finish(),
        }
    }
}
