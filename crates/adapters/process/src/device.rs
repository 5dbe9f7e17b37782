//! Executable device backed by the host process table.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ossie_app::ports::{
    Device, ExecutableDevice, FileSystem, LoadableDevice, NamingService, ObjectRef, Port,
    PortSupplier, PropertySet, Resource,
};
use ossie_domain::descriptor::CodeType;
use ossie_domain::device::{AdminState, DeviceCore, OperationalState, UsageState};
use ossie_domain::error::{DeploymentError, FileNameError, OssieError, PortError};
use ossie_domain::id::{DeviceId, ProcessId};
use ossie_domain::launch::{self, ComponentLaunchArgs, DeviceLaunchArgs, LaunchArgsError};
use ossie_domain::load::LoadTable;
use ossie_domain::naming;
use ossie_domain::property::DataType;

use crate::error::ProcessError;

#[derive(Default)]
struct Loaded {
    table: LoadTable,
    programs: BTreeMap<String, PathBuf>,
}

/// A device running loaded executables as child processes.
pub struct ProcessDevice {
    core: Mutex<DeviceCore>,
    loaded: Mutex<Loaded>,
    children: Mutex<BTreeMap<ProcessId, Child>>,
    naming: Arc<dyn NamingService>,
}

impl ProcessDevice {
    #[must_use]
    pub fn new(args: &DeviceLaunchArgs, naming: Arc<dyn NamingService>) -> Arc<Self> {
        Arc::new(Self {
            core: Mutex::new(DeviceCore::new(
                args.device_id.clone(),
                args.device_label.clone(),
                args.profile_name.clone(),
            )),
            loaded: Mutex::new(Loaded::default()),
            children: Mutex::new(BTreeMap::new()),
            naming,
        })
    }

    #[must_use]
    pub fn object(self: &Arc<Self>) -> ObjectRef {
        ObjectRef::Device(Arc::clone(self) as Arc<dyn Device>)
    }

    /// Processes still running; exited ones are reaped.
    #[must_use]
    pub fn running(&self) -> Vec<ProcessId> {
        let mut children = self.lock_children();
        children.retain(|pid, child| match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(%pid, %status, "process exited");
                false
            }
            Ok(None) | Err(_) => true,
        });
        children.keys().copied().collect()
    }

    fn lock_core(&self) -> MutexGuard<'_, DeviceCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_loaded(&self) -> MutexGuard<'_, Loaded> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_children(&self) -> MutexGuard<'_, BTreeMap<ProcessId, Child>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn kill_and_wait(child: &mut Child) -> Result<(), ProcessError> {
        let pid = child.id();
        match child.kill() {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::InvalidInput => {}
            Err(source) => return Err(ProcessError::Stop { pid, source }),
        }
        child
            .wait()
            .map(|status| tracing::debug!(pid, %status, "process stopped"))
            .map_err(|source| ProcessError::Stop { pid, source })
    }
}

impl PropertySet for ProcessDevice {
    fn configure(&self, properties: &[DataType]) -> Result<(), OssieError> {
        self.lock_core().configure(properties);
        Ok(())
    }

    fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError> {
        self.lock_core().query(ids)
    }
}

impl PortSupplier for ProcessDevice {
    fn get_port(&self, name: &str) -> Result<Arc<dyn Port>, OssieError> {
        Err(PortError::UnknownPort(name.to_string()).into())
    }
}

impl Resource for ProcessDevice {
    fn identifier(&self) -> String {
        self.lock_core().identifier().to_string()
    }

    fn initialize(&self) -> Result<(), OssieError> {
        Ok(())
    }

    fn start(&self) -> Result<(), OssieError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), OssieError> {
        Ok(())
    }

    fn release_object(&self) -> Result<(), OssieError> {
        let label = {
            let mut core = self.lock_core();
            core.begin_shutdown();
            core.label().to_string()
        };
        let children = std::mem::take(&mut *self.lock_children());
        for (pid, mut child) in children {
            if let Err(err) = Self::kill_and_wait(&mut child) {
                tracing::warn!(%pid, error = %err, "failed to stop process during release");
            }
        }
        self.lock_core().release();
        if let Err(err) = self.naming.unbind(&naming::in_domain(&label)) {
            tracing::debug!(device = %label, error = %err, "device binding already gone");
        }
        tracing::info!(device = %label, "process device released");
        Ok(())
    }
}

impl Device for ProcessDevice {
    fn device_id(&self) -> DeviceId {
        self.lock_core().identifier().clone()
    }

    fn label(&self) -> String {
        self.lock_core().label().to_string()
    }

    fn software_profile(&self) -> String {
        self.lock_core().software_profile().to_string()
    }

    fn admin_state(&self) -> AdminState {
        self.lock_core().admin_state()
    }

    fn set_admin_state(&self, state: AdminState) {
        self.lock_core().set_admin_state(state);
    }

    fn operational_state(&self) -> OperationalState {
        self.lock_core().operational_state()
    }

    fn usage_state(&self) -> UsageState {
        self.lock_core().usage_state()
    }

    /// Components run as child processes and bind a stringified reference.
    fn hosts_in_process(&self) -> bool {
        false
    }

    fn declare_capacities(&self, capacities: &[DataType]) -> Result<(), OssieError> {
        self.lock_core().declare_capacities(capacities);
        Ok(())
    }

    fn allocate_capacity(&self, requested: &[DataType]) -> Result<(), OssieError> {
        self.lock_core().allocate_capacity(requested)
    }

    fn deallocate_capacity(&self, requested: &[DataType]) -> Result<(), OssieError> {
        self.lock_core().deallocate_capacity(requested)
    }

    fn as_loadable(&self) -> Option<&dyn LoadableDevice> {
        Some(self)
    }

    fn as_executable(&self) -> Option<&dyn ExecutableDevice> {
        Some(self)
    }
}

impl LoadableDevice for ProcessDevice {
    /// Loading records the host path of the file; only files backed by the
    /// local disk can be run.
    fn load(&self, fs: &dyn FileSystem, file_name: &str, kind: CodeType) -> Result<(), OssieError> {
        self.lock_core().ensure_operable()?;
        if !fs.exists(file_name)? {
            return Err(FileNameError::NotFound(file_name.to_string()).into());
        }
        let program = fs
            .local_path(file_name)
            .ok_or_else(|| FileNameError::Invalid(file_name.to_string()))?;
        let mut loaded = self.lock_loaded();
        if loaded.table.load(file_name) {
            tracing::debug!(file = file_name, kind = kind.as_str(), program = %program.display(), "program loaded");
            loaded.programs.insert(file_name.to_string(), program);
        }
        Ok(())
    }

    fn unload(&self, file_name: &str) -> Result<(), OssieError> {
        let mut loaded = self.lock_loaded();
        if loaded.table.unload(file_name)? {
            loaded.programs.remove(file_name);
        }
        Ok(())
    }
}

impl ExecutableDevice for ProcessDevice {
    fn execute(
        &self,
        file_name: &str,
        _options: &[DataType],
        parameters: &[DataType],
    ) -> Result<ProcessId, OssieError> {
        self.lock_core().ensure_operable()?;
        let program = self
            .lock_loaded()
            .programs
            .get(file_name)
            .cloned()
            .ok_or_else(|| FileNameError::NotLoaded(file_name.to_string()))?;
        let args = ComponentLaunchArgs::from_parameters(parameters).map_err(|err| {
            let parameter = match err {
                LaunchArgsError::Missing(parameter) => parameter,
                LaunchArgsError::DanglingKey(_) | LaunchArgsError::InvalidValue { .. } => "",
            };
            DeploymentError::MissingExecParameter {
                file: file_name.to_string(),
                parameter,
            }
        })?;

        let mut child = Command::new(&program)
            .args(launch::parameters_to_args(parameters))
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;
        let Ok(raw) = i32::try_from(child.id()) else {
            let pid = ProcessId::new(-1);
            if let Err(err) = Self::kill_and_wait(&mut child) {
                tracing::warn!(error = %err, "failed to stop process with unrepresentable pid");
            }
            return Err(DeploymentError::InvalidProcessId {
                component: args.component_identifier,
                pid,
            }
            .into());
        };
        let pid = ProcessId::new(raw);
        tracing::info!(%pid, program = %program.display(), binding = %args.name_binding, "process spawned");
        self.lock_children().insert(pid, child);
        Ok(pid)
    }

    fn terminate(&self, pid: ProcessId) -> Result<(), OssieError> {
        self.lock_core().ensure_teardown_allowed()?;
        let mut child = self
            .lock_children()
            .remove(&pid)
            .ok_or(DeploymentError::InvalidProcess(pid))?;
        Self::kill_and_wait(&mut child)?;
        Ok(())
    }
}
