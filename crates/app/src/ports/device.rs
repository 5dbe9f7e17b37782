//! Device ports — capacity, loading and execution.

use ossie_domain::descriptor::CodeType;
use ossie_domain::device::{AdminState, OperationalState, UsageState};
use ossie_domain::error::OssieError;
use ossie_domain::id::{DeviceId, ProcessId};
use ossie_domain::property::DataType;

use super::{FileSystem, Resource};

/// A registered device with allocatable capacity.
pub trait Device: Resource {
    fn device_id(&self) -> DeviceId;
    fn label(&self) -> String;
    /// Package descriptor path, relative to the owning node's file system.
    fn software_profile(&self) -> String;
    fn admin_state(&self) -> AdminState;
    fn set_admin_state(&self, state: AdminState);
    fn operational_state(&self) -> OperationalState;
    fn usage_state(&self) -> UsageState;

    /// Declare the allocation properties of the device package. Only these
    /// can be allocated.
    ///
    /// # Errors
    ///
    /// Returns an adapter error when the device cannot record them.
    fn declare_capacities(&self, capacities: &[DataType]) -> Result<(), OssieError>;

    /// # Errors
    ///
    /// Returns `InvalidState` when the device is locked or disabled and
    /// `InvalidCapacity` when the request cannot be satisfied.
    fn allocate_capacity(&self, requested: &[DataType]) -> Result<(), OssieError>;

    /// # Errors
    ///
    /// Returns `InvalidState` when the device is locked or disabled and
    /// `InvalidCapacity` when the request exceeds the original bound.
    fn deallocate_capacity(&self, requested: &[DataType]) -> Result<(), OssieError>;

    /// `false` when components executed here run in their own process and
    /// can only bind a stringified reference.
    fn hosts_in_process(&self) -> bool {
        true
    }

    fn as_loadable(&self) -> Option<&dyn LoadableDevice> {
        None
    }

    fn as_executable(&self) -> Option<&dyn ExecutableDevice> {
        None
    }
}

pub trait LoadableDevice: Send + Sync {
    /// Load `file_name` from `fs`. Loading the same name again only
    /// increments its load count.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFileName` when the file does not exist in `fs`.
    fn load(&self, fs: &dyn FileSystem, file_name: &str, kind: CodeType)
    -> Result<(), OssieError>;

    /// # Errors
    ///
    /// Returns `InvalidFileName` when the file is not loaded.
    fn unload(&self, file_name: &str) -> Result<(), OssieError>;
}

pub trait ExecutableDevice: LoadableDevice {
    /// Run a loaded file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless unlocked and enabled, `InvalidFileName`
    /// for a file that was never loaded, and a deployment error when the
    /// naming parameters are missing or the process cannot start.
    fn execute(
        &self,
        file_name: &str,
        options: &[DataType],
        parameters: &[DataType],
    ) -> Result<ProcessId, OssieError>;

    /// Kill a process and wait for it to exit. Allowed while the device
    /// is shutting down.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when locked or disabled, and
    /// `InvalidProcess` for an unknown process id.
    fn terminate(&self, pid: ProcessId) -> Result<(), OssieError>;
}
