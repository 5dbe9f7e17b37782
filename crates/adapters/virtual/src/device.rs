//! Virtual executable device.
//!
//! `execute` instantiates the loaded component in process and binds it in
//! the naming service at its `NAME_BINDING`, which is what a spawned
//! component process would do on start.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ossie_app::ports::{
    Device, ExecutableDevice, FileSystem, LoadableDevice, NamingService, ObjectRef, Port,
    PortSupplier, PropertySet, Resource,
};
use ossie_domain::descriptor::CodeType;
use ossie_domain::device::{AdminState, DeviceCore, OperationalState, UsageState};
use ossie_domain::error::{DeploymentError, FileNameError, OssieError, PortError};
use ossie_domain::id::{DeviceId, ProcessId};
use ossie_domain::launch::{ComponentLaunchArgs, DeviceLaunchArgs, LaunchArgsError};
use ossie_domain::load::LoadTable;
use ossie_domain::naming;
use ossie_domain::property::DataType;

use crate::catalog::{ComponentCatalog, ComponentSpec};
use crate::resource::VirtualResource;

struct Process {
    binding: String,
    resource: Arc<VirtualResource>,
}

#[derive(Default)]
struct Loaded {
    table: LoadTable,
    images: BTreeMap<String, ComponentSpec>,
}

/// An executable device whose processes are in-process components.
pub struct VirtualDevice {
    core: Mutex<DeviceCore>,
    loaded: Mutex<Loaded>,
    processes: Mutex<BTreeMap<ProcessId, Process>>,
    next_pid: AtomicI32,
    naming: Arc<dyn NamingService>,
    catalog: Arc<ComponentCatalog>,
}

impl VirtualDevice {
    #[must_use]
    pub fn new(
        args: &DeviceLaunchArgs,
        naming: Arc<dyn NamingService>,
        catalog: Arc<ComponentCatalog>,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: Mutex::new(DeviceCore::new(
                args.device_id.clone(),
                args.device_label.clone(),
                args.profile_name.clone(),
            )),
            loaded: Mutex::new(Loaded::default()),
            processes: Mutex::new(BTreeMap::new()),
            next_pid: AtomicI32::new(1),
            naming,
            catalog,
        })
    }

    #[must_use]
    pub fn object(self: &Arc<Self>) -> ObjectRef {
        ObjectRef::Device(Arc::clone(self) as Arc<dyn Device>)
    }

    /// Load count of a file.
    #[must_use]
    pub fn load_count(&self, file_name: &str) -> u32 {
        self.lock_loaded().table.count(file_name)
    }

    #[must_use]
    pub fn process_ids(&self) -> Vec<ProcessId> {
        self.lock_processes().keys().copied().collect()
    }

    /// Component running as `pid`.
    #[must_use]
    pub fn process(&self, pid: ProcessId) -> Option<Arc<VirtualResource>> {
        self.lock_processes().get(&pid).map(|p| Arc::clone(&p.resource))
    }

    fn lock_core(&self) -> MutexGuard<'_, DeviceCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_loaded(&self) -> MutexGuard<'_, Loaded> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_processes(&self) -> MutexGuard<'_, BTreeMap<ProcessId, Process>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn end(&self, pid: ProcessId, process: &Process) {
        process.resource.kill();
        if let Err(err) = self.naming.unbind(&process.binding) {
            tracing::debug!(%pid, error = %err, "process binding already gone");
        }
    }
}

impl PropertySet for VirtualDevice {
    fn configure(&self, properties: &[DataType]) -> Result<(), OssieError> {
        self.lock_core().configure(properties);
        Ok(())
    }

    fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError> {
        self.lock_core().query(ids)
    }
}

impl PortSupplier for VirtualDevice {
    fn get_port(&self, name: &str) -> Result<Arc<dyn Port>, OssieError> {
        Err(PortError::UnknownPort(name.to_string()).into())
    }
}

impl Resource for VirtualDevice {
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

    /// Kill every process, then leave the device locked and unbound.
    fn release_object(&self) -> Result<(), OssieError> {
        let label = {
            let mut core = self.lock_core();
            core.begin_shutdown();
            core.label().to_string()
        };
        let processes = std::mem::take(&mut *self.lock_processes());
        for (pid, process) in &processes {
            self.end(*pid, process);
        }
        self.lock_core().release();
        if let Err(err) = self.naming.unbind(&naming::in_domain(&label)) {
            tracing::debug!(device = %label, error = %err, "device binding already gone");
        }
        tracing::info!(device = %label, killed = processes.len(), "virtual device released");
        Ok(())
    }
}

impl Device for VirtualDevice {
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

impl LoadableDevice for VirtualDevice {
    fn load(&self, fs: &dyn FileSystem, file_name: &str, kind: CodeType) -> Result<(), OssieError> {
        self.lock_core().ensure_operable()?;
        if !fs.exists(file_name)? {
            return Err(FileNameError::NotFound(file_name.to_string()).into());
        }
        let mut loaded = self.lock_loaded();
        if loaded.table.is_loaded(file_name) {
            loaded.table.load(file_name);
            return Ok(());
        }
        let spec = match self.catalog.lookup(file_name) {
            Some(spec) => spec,
            None => ComponentSpec::from_image(&fs.read(file_name)?),
        };
        loaded.table.load(file_name);
        loaded.images.insert(file_name.to_string(), spec);
        tracing::debug!(file = file_name, kind = kind.as_str(), "image loaded");
        Ok(())
    }

    fn unload(&self, file_name: &str) -> Result<(), OssieError> {
        let mut loaded = self.lock_loaded();
        if loaded.table.unload(file_name)? {
            loaded.images.remove(file_name);
            tracing::debug!(file = file_name, "image unloaded");
        }
        Ok(())
    }
}

impl ExecutableDevice for VirtualDevice {
    fn execute(
        &self,
        file_name: &str,
        _options: &[DataType],
        parameters: &[DataType],
    ) -> Result<ProcessId, OssieError> {
        self.lock_core().ensure_operable()?;
        let spec = self
            .lock_loaded()
            .images
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

        let resource = VirtualResource::new(args.component_identifier.as_str(), &spec, args.extras);
        self.naming.rebind(
            &args.name_binding,
            ObjectRef::Resource(Arc::clone(&resource) as Arc<dyn Resource>),
        )?;
        let pid = ProcessId::new(self.next_pid.fetch_add(1, Ordering::SeqCst));
        self.lock_processes().insert(
            pid,
            Process {
                binding: args.name_binding,
                resource,
            },
        );
        tracing::debug!(file = file_name, %pid, "virtual process started");
        Ok(pid)
    }

    fn terminate(&self, pid: ProcessId) -> Result<(), OssieError> {
        self.lock_core().ensure_teardown_allowed()?;
        let process = self
            .lock_processes()
            .remove(&pid)
            .ok_or(DeploymentError::InvalidProcess(pid))?;
        self.end(pid, &process);
        tracing::debug!(%pid, "virtual process terminated");
        Ok(())
    }
}
