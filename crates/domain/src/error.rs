//! Common error types used across the workspace.
//!
//! Every layer converts into [`OssieError`] through `#[from]`; each variant
//! wraps a typed source error describing the failure.

use std::time::Duration;

use crate::device::{AdminState, OperationalState};
use crate::id::{ComponentId, ConnectionId, DeviceId, ProcessId};

/// Top-level error returned by every domain and application operation.
#[derive(Debug, thiserror::Error)]
pub enum OssieError {
    #[error("invalid object reference: {0}")]
    InvalidReference(#[from] InvalidReferenceError),

    #[error("invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(#[from] CapacityError),

    #[error("invalid profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    #[error("invalid file name: {0}")]
    InvalidFileName(#[from] FileNameError),

    #[error("deployment request error: {0}")]
    DeploymentRequest(#[from] DeploymentRequestError),

    #[error("deployment error: {0}")]
    Deployment(#[from] DeploymentError),

    #[error("not registered: {0}")]
    NotRegistered(#[from] NotRegisteredError),

    #[error("timeout: {0}")]
    Timeout(#[from] TimeoutError),

    #[error("naming error: {0}")]
    Naming(#[from] NamingError),

    #[error("port error: {0}")]
    Port(#[from] PortError),

    #[error("partial failure: {0}")]
    PartialFailure(#[from] PartialFailure),

    #[error("backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl OssieError {
    /// Wrap an adapter-level error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }

    /// `true` when the error reports a missing naming-service binding.
    #[must_use]
    pub fn is_name_not_found(&self) -> bool {
        matches!(self, Self::Naming(NamingError::NotFound(_)))
    }
}

/// A reference that does not designate a live, registered object.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} `{id}`")]
pub struct InvalidReferenceError {
    pub kind: &'static str,
    pub id: String,
}

impl InvalidReferenceError {
    pub fn new(kind: &'static str, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Operation attempted in an incompatible lifecycle state.
#[derive(Debug, thiserror::Error)]
pub enum InvalidStateError {
    #[error("device `{device}` is {state}")]
    Admin { device: DeviceId, state: AdminState },

    #[error("device `{device}` is {state}")]
    Operational {
        device: DeviceId,
        state: OperationalState,
    },

    #[error("application `{0}` is already released")]
    AlreadyReleased(String),

    #[error("device manager `{0}` is shutting down")]
    ShuttingDown(String),
}

/// Allocation or deallocation violated a type, bound or existence constraint.
#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("invalid property id `{0}`")]
    UnknownProperty(String),

    #[error("type mismatch for `{id}`: expected {expected}, found {found}")]
    TypeMismatch {
        id: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("property `{0}` is not a numeric capacity")]
    NotNumeric(String),

    #[error("negative amount requested for `{0}`")]
    Negative(String),

    #[error("insufficient capacity for `{id}`: requested {requested}, available {available}")]
    Insufficient {
        id: String,
        requested: String,
        available: String,
    },

    #[error("deallocation of `{0}` exceeds original bound")]
    ExceedsOriginal(String),

    #[error("device `{0}` is busy")]
    Busy(DeviceId),

    #[error("device `{0}` is idle, nothing to deallocate")]
    Idle(DeviceId),
}

/// A descriptor file is missing, malformed or lacks a required section.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("descriptor `{0}` does not exist")]
    Missing(String),

    #[error("descriptor `{path}` is malformed: {reason}")]
    Malformed { path: String, reason: String },

    #[error("descriptor `{path}` lacks required section `{section}`")]
    MissingSection { path: String, section: &'static str },

    #[error("value `{value}` is not a valid {kind} for property `{id}`")]
    InvalidValue {
        id: String,
        kind: &'static str,
        value: String,
    },

    #[error("unknown property `{0}`")]
    UnknownProperty(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FileNameError {
    #[error("file `{0}` does not exist")]
    NotFound(String),

    #[error("file `{0}` is not loaded")]
    NotLoaded(String),

    #[error("file name `{0}` is not valid")]
    Invalid(String),

    #[error("mount point `{0}` is already in use")]
    MountPointInUse(String),
}

/// The caller-supplied device assignment is incomplete or inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentRequestError {
    #[error("device assignment sequence is empty")]
    EmptyAssignments,

    #[error("components without device assignment: {}", join_ids(.0))]
    UnassignedComponents(Vec<ComponentId>),

    #[error("component `{component}` is assigned to unknown device `{device}`")]
    UnknownDevice {
        component: ComponentId,
        device: DeviceId,
    },

    #[error("collocated components `{first}` and `{second}` are assigned to different devices")]
    CollocationViolation {
        first: ComponentId,
        second: ComponentId,
    },

    #[error("assignment names unknown component `{0}`")]
    UnknownComponent(ComponentId),

    #[error("component `{component}` is assigned to both `{first}` and `{second}`")]
    ConflictingAssignment {
        component: ComponentId,
        first: DeviceId,
        second: DeviceId,
    },

    #[error("component `{component}` is assigned to device `{device}`, which cannot host components in the domain process")]
    OutOfProcessDevice {
        component: ComponentId,
        device: DeviceId,
    },
}

/// An internal deployment step failed.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error("no implementation of `{0}` matches its device")]
    NoMatchingImplementation(String),

    #[error("application `{0}` has no initialized assembly controller")]
    MissingAssemblyController(String),

    #[error("binary `{file}` of component `{component}` not found in any file system")]
    BinaryNotFound { component: ComponentId, file: String },

    #[error("no loadable device available for component `{0}`")]
    NoLoadableDevice(ComponentId),

    #[error("no executable device available for component `{0}`")]
    NoExecutableDevice(ComponentId),

    #[error("execute of `{file}` failed: missing parameter `{parameter}`")]
    MissingExecParameter {
        file: String,
        parameter: &'static str,
    },

    #[error("component `{component}` returned invalid process id {pid}")]
    InvalidProcessId { component: ComponentId, pid: ProcessId },

    #[error("unknown process {0}")]
    InvalidProcess(ProcessId),

    #[error("object bound for component `{0}` is not a resource")]
    NotAResource(String),

    #[error("connection `{connection}` could not resolve endpoint `{endpoint}`")]
    UnresolvedEndpoint {
        connection: ConnectionId,
        endpoint: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotRegisteredError {
    #[error("device manager `{0}`")]
    DeviceManager(String),

    #[error("service `{0}`")]
    Service(String),

    #[error("application factory `{0}`")]
    ApplicationFactory(String),
}

/// A bounded wait exceeded its budget.
#[derive(Debug, thiserror::Error)]
#[error("gave up waiting for {what} after {waited:?}")]
pub struct TimeoutError {
    pub what: String,
    pub waited: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("name `{0}` not found")]
    NotFound(String),

    #[error("name `{0}` is already bound")]
    AlreadyBound(String),

    #[error("name `{0}` is not a naming context")]
    NotContext(String),

    #[error("name `{0}` is not valid")]
    InvalidName(String),

    #[error("naming reference `{0}` is not valid")]
    InvalidReference(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("port `{0}` does not exist")]
    UnknownPort(String),

    #[error("connection `{connection}` is not present on port `{port}`")]
    NotConnected {
        port: String,
        connection: ConnectionId,
    },

    #[error("connection `{connection}` already exists on port `{port}`")]
    AlreadyConnected {
        port: String,
        connection: ConnectionId,
    },

    #[error("port `{0}` cannot initiate connections")]
    NotUsesPort(String),
}

/// Aggregate report from a best-effort fan-out.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed for {count} component(s)", count = .failures.len())]
pub struct PartialFailure {
    pub operation: &'static str,
    pub failures: Vec<ComponentFailure>,
}

/// One failed element of a fan-out.
#[derive(Debug)]
pub struct ComponentFailure {
    pub component: String,
    pub error: OssieError,
}

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(ComponentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
