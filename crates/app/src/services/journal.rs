//! Deployment journal — every side effect of an in-flight deployment, so
//! that an aborted `create` leaves nothing behind.

use std::sync::Arc;

use ossie_domain::error::OssieError;
use ossie_domain::id::{ConnectionId, ProcessId};
use ossie_domain::property::DataType;

use crate::ports::{Device, NamingService, Port, Resource};

pub enum Step {
    NamingContext {
        naming: Arc<dyn NamingService>,
        path: String,
    },
    Allocation {
        device: Arc<dyn Device>,
        capacities: Vec<DataType>,
    },
    Load {
        device: Arc<dyn Device>,
        file_name: String,
    },
    Execute {
        device: Arc<dyn Device>,
        pid: ProcessId,
    },
    Initialize {
        component: String,
        resource: Arc<dyn Resource>,
    },
    Connection {
        port: Arc<dyn Port>,
        connection: ConnectionId,
    },
}

impl Step {
    fn label(&self) -> String {
        match self {
            Self::NamingContext { path, .. } => format!("naming context {path}"),
            Self::Allocation { device, .. } => format!("allocation on {}", device.label()),
            Self::Load { file_name, .. } => format!("load of {file_name}"),
            Self::Execute { pid, .. } => format!("process {pid}"),
            Self::Initialize { component, .. } => format!("component {component}"),
            Self::Connection { connection, .. } => format!("connection {connection}"),
        }
    }

    fn undo(self) -> Result<(), OssieError> {
        match self {
            Self::NamingContext { naming, path } => naming.destroy_context(&path),
            Self::Allocation { device, capacities } => device.deallocate_capacity(&capacities),
            Self::Load { device, file_name } => match device.as_loadable() {
                Some(loadable) => loadable.unload(&file_name),
                None => Ok(()),
            },
            Self::Execute { device, pid } => match device.as_executable() {
                Some(executable) => executable.terminate(pid),
                None => Ok(()),
            },
            Self::Initialize { resource, .. } => resource.release_object(),
            Self::Connection { port, connection } => port.disconnect_port(&connection),
        }
    }
}

#[derive(Default)]
pub struct DeploymentJournal {
    steps: Vec<Step>,
}

impl DeploymentJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Keep every side effect; the deployment succeeded.
    pub fn commit(mut self) {
        self.steps.clear();
    }

    /// Undo every recorded side effect, newest first. Failures are logged
    /// and do not stop the rollback.
    pub fn rollback(mut self) {
        while let Some(step) = self.steps.pop() {
            let label = step.label();
            match step.undo() {
                Ok(()) => tracing::debug!(step = %label, "rolled back"),
                Err(err) => tracing::warn!(step = %label, error = %err, "rollback step failed"),
            }
        }
    }
}

impl Drop for DeploymentJournal {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            tracing::warn!(pending = self.steps.len(), "deployment journal dropped without commit, rolling back");
            let journal = Self {
                steps: std::mem::take(&mut self.steps),
            };
            journal.rollback();
        }
    }
}
