//! In-memory collaborators shared by the service tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ossie_domain::application::DeviceAssignment;
use ossie_domain::descriptor::CodeType;
use ossie_domain::device::{AdminState, DeviceCore, OperationalState, UsageState};
use ossie_domain::error::{
    DeploymentError, FileNameError, NamingError, OssieError, PortError,
};
use ossie_domain::id::{ConnectionId, DeviceId, DeviceManagerId, ProcessId};
use ossie_domain::launch::{ComponentLaunchArgs, DeviceLaunchArgs, LaunchArgsError};
use ossie_domain::load::LoadTable;
use ossie_domain::naming;
use ossie_domain::property::{DataType, PropertyValue};

use crate::context::DomainContext;
use crate::event_bus::InProcessEventBus;
use crate::ports::{
    Device, DeviceLauncher, ExecutableDevice, FileSystem, LoadableDevice, NamingService,
    ObjectRef, Port, PortSupplier, PropertySet, Resource,
};
use crate::retry::PollPolicy;
use crate::services::file_manager::tests::MapFileSystem;
use crate::services::registry::DeviceNode;

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

enum Entry {
    Context,
    Object(ObjectRef),
}

#[derive(Default)]
pub(crate) struct FakeNaming {
    entries: Mutex<BTreeMap<String, Entry>>,
}

fn key(path: &str) -> String {
    naming::components(path).join("/")
}

impl FakeNaming {
    /// Naming service holding only the domain root context.
    pub(crate) fn with_domain() -> Arc<Self> {
        let naming = Self::default();
        naming
            .entries
            .lock()
            .unwrap()
            .insert(naming::DOMAIN_ROOT.to_string(), Entry::Context);
        Arc::new(naming)
    }

    fn check_parent(entries: &BTreeMap<String, Entry>, key: &str) -> Result<(), OssieError> {
        match key.rsplit_once('/') {
            None => Ok(()),
            Some((parent, _)) => match entries.get(parent) {
                Some(Entry::Context) => Ok(()),
                Some(Entry::Object(_)) => Err(NamingError::NotContext(parent.to_string()).into()),
                None => Err(NamingError::NotFound(parent.to_string()).into()),
            },
        }
    }

    pub(crate) fn bound(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl NamingService for FakeNaming {
    fn bind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError> {
        let key = key(path);
        let mut entries = self.entries.lock().unwrap();
        Self::check_parent(&entries, &key)?;
        if entries.contains_key(&key) {
            return Err(NamingError::AlreadyBound(key).into());
        }
        entries.insert(key, Entry::Object(object));
        Ok(())
    }

    fn rebind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError> {
        let key = key(path);
        let mut entries = self.entries.lock().unwrap();
        Self::check_parent(&entries, &key)?;
        entries.insert(key, Entry::Object(object));
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<ObjectRef, OssieError> {
        let key = key(path);
        match self.entries.lock().unwrap().get(&key) {
            Some(Entry::Object(object)) => Ok(object.clone()),
            Some(Entry::Context) => Err(NamingError::NotContext(key).into()),
            None => Err(NamingError::NotFound(key).into()),
        }
    }

    fn unbind(&self, path: &str) -> Result<(), OssieError> {
        let key = key(path);
        self.entries
            .lock()
            .unwrap()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| NamingError::NotFound(key).into())
    }

    fn bind_new_context(&self, path: &str) -> Result<(), OssieError> {
        let key = key(path);
        let mut entries = self.entries.lock().unwrap();
        Self::check_parent(&entries, &key)?;
        if entries.contains_key(&key) {
            return Err(NamingError::AlreadyBound(key).into());
        }
        entries.insert(key, Entry::Context);
        Ok(())
    }

    fn destroy_context(&self, path: &str) -> Result<(), OssieError> {
        let key = key(path);
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&key) {
            Some(Entry::Context) => {}
            Some(Entry::Object(_)) => return Err(NamingError::NotContext(key).into()),
            None => return Err(NamingError::NotFound(key).into()),
        }
        let prefix = format!("{key}/");
        entries.retain(|k, _| k != &key && !k.starts_with(&prefix));
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<String>, OssieError> {
        let key = key(path);
        let entries = self.entries.lock().unwrap();
        if !key.is_empty() && !matches!(entries.get(&key), Some(Entry::Context)) {
            return Err(NamingError::NotFound(key).into());
        }
        let prefix = if key.is_empty() { String::new() } else { format!("{key}/") };
        Ok(entries
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn stringify(&self) -> String {
        "memory:fake".to_string()
    }
}

pub(crate) struct FakePort {
    name: String,
    uses: bool,
    connections: Mutex<Vec<ConnectionId>>,
}

impl FakePort {
    pub(crate) fn uses(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            uses: true,
            connections: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn provides(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            uses: false,
            connections: Mutex::new(Vec::new()),
        })
    }
}

impl Port for FakePort {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn connect_port(&self, _target: ObjectRef, connection_id: &ConnectionId) -> Result<(), OssieError> {
        if !self.uses {
            return Err(PortError::NotUsesPort(self.name.clone()).into());
        }
        let mut connections = self.connections.lock().unwrap();
        if connections.contains(connection_id) {
            return Err(PortError::AlreadyConnected {
                port: self.name.clone(),
                connection: connection_id.clone(),
            }
            .into());
        }
        connections.push(connection_id.clone());
        Ok(())
    }

    fn disconnect_port(&self, connection_id: &ConnectionId) -> Result<(), OssieError> {
        let mut connections = self.connections.lock().unwrap();
        let before = connections.len();
        connections.retain(|c| c != connection_id);
        if connections.len() == before {
            return Err(PortError::NotConnected {
                port: self.name.clone(),
                connection: connection_id.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.connections.lock().unwrap().contains(connection_id)
    }
}

/// Resource with an `out` uses port and an `in` provides port, logging
/// every lifecycle call as `<id>:<call>`.
pub(crate) struct FakeResource {
    id: String,
    log: CallLog,
    properties: Mutex<Vec<DataType>>,
    out: Arc<FakePort>,
    input: Arc<FakePort>,
    pub(crate) fail_start: AtomicBool,
    pub(crate) fail_configure: AtomicBool,
}

impl FakeResource {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Self::logging(id, &CallLog::default())
    }

    pub(crate) fn logging(id: &str, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            log: Arc::clone(log),
            properties: Mutex::new(Vec::new()),
            out: FakePort::uses("out"),
            input: FakePort::provides("in"),
            fail_start: AtomicBool::new(false),
            fail_configure: AtomicBool::new(false),
        })
    }

    pub(crate) fn object(self: &Arc<Self>) -> ObjectRef {
        ObjectRef::Resource(Arc::clone(self) as Arc<dyn Resource>)
    }

    pub(crate) fn out_port(&self) -> Arc<FakePort> {
        Arc::clone(&self.out)
    }

    fn note(&self, call: &str) {
        self.log.lock().unwrap().push(format!("{}:{call}", self.id));
    }
}

impl PropertySet for FakeResource {
    fn configure(&self, properties: &[DataType]) -> Result<(), OssieError> {
        self.note("configure");
        if self.fail_configure.load(Ordering::SeqCst) {
            return Err(PortError::UnknownPort("configure".to_string()).into());
        }
        let mut stored = self.properties.lock().unwrap();
        for property in properties {
            ossie_domain::property::upsert(&mut stored, property.clone());
        }
        Ok(())
    }

    fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError> {
        let stored = self.properties.lock().unwrap();
        Ok(stored
            .iter()
            .filter(|p| ids.is_empty() || ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

impl PortSupplier for FakeResource {
    fn get_port(&self, name: &str) -> Result<Arc<dyn Port>, OssieError> {
        match name {
            "out" => Ok(Arc::clone(&self.out) as Arc<dyn Port>),
            "in" => Ok(Arc::clone(&self.input) as Arc<dyn Port>),
            other => Err(PortError::UnknownPort(other.to_string()).into()),
        }
    }
}

impl Resource for FakeResource {
    fn identifier(&self) -> String {
        self.id.clone()
    }

    fn initialize(&self) -> Result<(), OssieError> {
        self.note("initialize");
        Ok(())
    }

    fn start(&self) -> Result<(), OssieError> {
        self.note("start");
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(PortError::UnknownPort("start".to_string()).into());
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), OssieError> {
        self.note("stop");
        Ok(())
    }

    fn release_object(&self) -> Result<(), OssieError> {
        self.note("release");
        Ok(())
    }
}

/// Executable device: `execute` binds a fresh [`FakeResource`] at the
/// requested name binding.
pub(crate) struct FakeDevice {
    core: Mutex<DeviceCore>,
    loads: Mutex<LoadTable>,
    processes: Mutex<BTreeMap<ProcessId, String>>,
    next_pid: AtomicI32,
    naming: Option<Arc<FakeNaming>>,
    pub(crate) log: CallLog,
    pub(crate) out_of_process: AtomicBool,
}

impl FakeDevice {
    pub(crate) fn new(
        id: &str,
        label: &str,
        slots: u32,
        naming: Option<Arc<FakeNaming>>,
    ) -> Arc<Self> {
        let mut core = DeviceCore::new(DeviceId::new(id), label, "/devices/GPP/GPP.spd.json");
        core.declare_capacities(&[DataType::new("slots", PropertyValue::ULong(slots))]);
        Arc::new(Self {
            core: Mutex::new(core),
            loads: Mutex::new(LoadTable::new()),
            processes: Mutex::new(BTreeMap::new()),
            next_pid: AtomicI32::new(100),
            naming,
            log: CallLog::default(),
            out_of_process: AtomicBool::new(false),
        })
    }

    pub(crate) fn with_slots(id: &str, label: &str, slots: u32) -> Arc<Self> {
        Self::new(id, label, slots, None)
    }

    pub(crate) fn object(self: &Arc<Self>) -> ObjectRef {
        ObjectRef::Device(Arc::clone(self) as Arc<dyn Device>)
    }

    pub(crate) fn is_loaded(&self, file_name: &str) -> bool {
        self.loads.lock().unwrap().is_loaded(file_name)
    }

    pub(crate) fn running(&self) -> usize {
        self.processes.lock().unwrap().len()
    }

    pub(crate) fn slots(&self) -> PropertyValue {
        self.core
            .lock()
            .unwrap()
            .capacities()
            .current("slots")
            .cloned()
            .unwrap()
    }
}

impl PropertySet for FakeDevice {
    fn configure(&self, properties: &[DataType]) -> Result<(), OssieError> {
        self.core.lock().unwrap().configure(properties);
        Ok(())
    }

    fn query(&self, ids: &[String]) -> Result<Vec<DataType>, OssieError> {
        self.core.lock().unwrap().query(ids)
    }
}

impl PortSupplier for FakeDevice {
    fn get_port(&self, name: &str) -> Result<Arc<dyn Port>, OssieError> {
        Err(PortError::UnknownPort(name.to_string()).into())
    }
}

impl Resource for FakeDevice {
    fn identifier(&self) -> String {
        self.core.lock().unwrap().identifier().to_string()
    }

    fn initialize(&self) -> Result<(), OssieError> {
        self.log.lock().unwrap().push("initialize".to_string());
        Ok(())
    }

    fn start(&self) -> Result<(), OssieError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), OssieError> {
        Ok(())
    }

    fn release_object(&self) -> Result<(), OssieError> {
        self.log.lock().unwrap().push("release".to_string());
        self.core.lock().unwrap().release();
        Ok(())
    }
}

impl Device for FakeDevice {
    fn device_id(&self) -> DeviceId {
        self.core.lock().unwrap().identifier().clone()
    }

    fn label(&self) -> String {
        self.core.lock().unwrap().label().to_string()
    }

    fn software_profile(&self) -> String {
        self.core.lock().unwrap().software_profile().to_string()
    }

    fn admin_state(&self) -> AdminState {
        self.core.lock().unwrap().admin_state()
    }

    fn set_admin_state(&self, state: AdminState) {
        self.core.lock().unwrap().set_admin_state(state);
    }

    fn operational_state(&self) -> OperationalState {
        self.core.lock().unwrap().operational_state()
    }

    fn usage_state(&self) -> UsageState {
        self.core.lock().unwrap().usage_state()
    }

    fn hosts_in_process(&self) -> bool {
        !self.out_of_process.load(Ordering::SeqCst)
    }

    fn declare_capacities(&self, capacities: &[DataType]) -> Result<(), OssieError> {
        self.core.lock().unwrap().declare_capacities(capacities);
        Ok(())
    }

    fn allocate_capacity(&self, requested: &[DataType]) -> Result<(), OssieError> {
        self.core.lock().unwrap().allocate_capacity(requested)
    }

    fn deallocate_capacity(&self, requested: &[DataType]) -> Result<(), OssieError> {
        self.core.lock().unwrap().deallocate_capacity(requested)
    }

    fn as_loadable(&self) -> Option<&dyn LoadableDevice> {
        Some(self)
    }

    fn as_executable(&self) -> Option<&dyn ExecutableDevice> {
        Some(self)
    }
}

impl LoadableDevice for FakeDevice {
    fn load(&self, fs: &dyn FileSystem, file_name: &str, _kind: CodeType) -> Result<(), OssieError> {
        if !fs.exists(file_name)? {
            return Err(FileNameError::NotFound(file_name.to_string()).into());
        }
        self.loads.lock().unwrap().load(file_name);
        self.log.lock().unwrap().push(format!("load:{file_name}"));
        Ok(())
    }

    fn unload(&self, file_name: &str) -> Result<(), OssieError> {
        self.loads.lock().unwrap().unload(file_name)?;
        self.log.lock().unwrap().push(format!("unload:{file_name}"));
        Ok(())
    }
}

impl ExecutableDevice for FakeDevice {
    fn execute(
        &self,
        file_name: &str,
        _options: &[DataType],
        parameters: &[DataType],
    ) -> Result<ProcessId, OssieError> {
        self.core.lock().unwrap().ensure_operable()?;
        if !self.is_loaded(file_name) {
            return Err(FileNameError::NotLoaded(file_name.to_string()).into());
        }
        let args = ComponentLaunchArgs::from_parameters(parameters).map_err(|err| match err {
            LaunchArgsError::Missing(parameter) => DeploymentError::MissingExecParameter {
                file: file_name.to_string(),
                parameter,
            },
            _ => DeploymentError::MissingExecParameter {
                file: file_name.to_string(),
                parameter: "",
            },
        })?;
        if let Some(naming) = &self.naming {
            let resource = FakeResource::logging(args.component_identifier.as_str(), &self.log);
            naming.rebind(&args.name_binding, resource.object())?;
        }
        let pid = ProcessId::new(self.next_pid.fetch_add(1, Ordering::SeqCst));
        self.processes.lock().unwrap().insert(pid, args.name_binding);
        self.log.lock().unwrap().push(format!("execute:{file_name}"));
        Ok(pid)
    }

    fn terminate(&self, pid: ProcessId) -> Result<(), OssieError> {
        self.core.lock().unwrap().ensure_teardown_allowed()?;
        let binding = self
            .processes
            .lock()
            .unwrap()
            .remove(&pid)
            .ok_or(DeploymentError::InvalidProcess(pid))?;
        if let Some(naming) = &self.naming {
            let _ = naming.unbind(&binding);
        }
        self.log.lock().unwrap().push(format!("terminate:{pid}"));
        Ok(())
    }
}

/// Launcher that binds a prepared device under `DomainName1/<label>`.
pub(crate) struct FakeLauncher {
    pub(crate) naming: Arc<FakeNaming>,
    pub(crate) devices: BTreeMap<String, Arc<FakeDevice>>,
    pub(crate) launched: Mutex<Vec<DeviceLaunchArgs>>,
}

impl DeviceLauncher for FakeLauncher {
    fn launch(&self, args: &DeviceLaunchArgs) -> Result<(), OssieError> {
        self.launched.lock().unwrap().push(args.clone());
        if let Some(device) = self.devices.get(&args.device_label) {
            self.naming
                .rebind(&naming::in_domain(&args.device_label), device.object())?;
        }
        Ok(())
    }
}

pub(crate) const WAVE_SAD: &str = "/waveforms/Wave/Wave.sad.json";

/// Domain root holding the `Wave` assembly: two `Amp` resources wired
/// `Amp_1.out -> Amp_2.in`, each taking one GPP slot.
pub(crate) fn domain_files() -> MapFileSystem {
    let sad = serde_json::json!({
        "id": "DCE:wave",
        "name": "Wave",
        "component_files": [{"id": "amp", "file": "/components/Amp/Amp.spd.json"}],
        "placements": [{"file_ref": "amp", "instantiations": [
            {"id": "Amp_1", "usage_name": "Amp", "properties": [{"id": "gain", "value": "3"}]},
            {"id": "Amp_2", "usage_name": "Amp2"}
        ]}],
        "assembly_controller": "Amp_1",
        "connections": [{
            "id": "c1",
            "uses": {"port": "out", "target": {"component": "Amp_1"}},
            "provides": {"port": {"port": "in", "target": {"component": "Amp_2"}}}
        }]
    });
    let spd = serde_json::json!({
        "id": "DCE:amp",
        "name": "Amp",
        "property_file": "Amp.prf.json",
        "descriptor": "Amp.scd.json",
        "implementations": [{
            "id": "amp-linux",
            "code": {"type": "executable", "local_file": "amp"},
            "os": {"name": "Linux", "version": "2.6"},
            "processors": ["x86"]
        }]
    });
    let prf = serde_json::json!({"simples": [
        {"id": "gain", "type": "long", "value": "1", "kinds": ["configure"]},
        {"id": "slots", "type": "ulong", "value": "1", "kinds": ["allocation"]}
    ]});
    let scd = serde_json::json!({"component_type": "resource"});
    let fs = MapFileSystem::default();
    fs.insert(WAVE_SAD, sad.to_string().into_bytes());
    fs.insert("/components/Amp/Amp.spd.json", spd.to_string().into_bytes());
    fs.insert("/components/Amp/Amp.prf.json", prf.to_string().into_bytes());
    fs.insert("/components/Amp/Amp.scd.json", scd.to_string().into_bytes());
    fs.insert("/components/Amp/amp", Vec::new());
    fs
}

/// Node file system carrying the GPP package.
pub(crate) fn node_files() -> MapFileSystem {
    let spd = serde_json::json!({
        "id": "DCE:gpp-spd",
        "name": "GPP",
        "implementations": [{
            "id": "gpp-linux",
            "os": {"name": "Linux", "version": "2.6"},
            "processors": ["x86"]
        }]
    });
    let fs = MapFileSystem::default();
    fs.insert("/devices/GPP/GPP.spd.json", spd.to_string().into_bytes());
    fs
}

pub(crate) type TestContext = DomainContext<Arc<InProcessEventBus>>;

/// A domain with node `Node1` mounted and one registered GPP of `slots`.
pub(crate) struct TestDomain {
    pub(crate) ctx: Arc<TestContext>,
    pub(crate) bus: Arc<InProcessEventBus>,
    pub(crate) naming: Arc<FakeNaming>,
    pub(crate) device: Arc<FakeDevice>,
}

pub(crate) fn test_domain(slots: u32) -> TestDomain {
    let naming = FakeNaming::with_domain();
    let bus = Arc::new(InProcessEventBus::new(64));
    let ctx = DomainContext::new(
        "DCE:domain",
        naming::DOMAIN_ROOT,
        Arc::clone(&naming) as Arc<dyn NamingService>,
        Arc::new(domain_files()),
        Arc::clone(&bus),
    )
    .with_poll_policy(PollPolicy {
        timeout: Duration::from_millis(50),
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(5),
    });
    ctx.file_manager
        .mount("/Node1", Arc::new(node_files()))
        .unwrap();
    let device = FakeDevice::new("DCE:gpp", "GPP1", slots, Some(Arc::clone(&naming)));
    ctx.registry.add_device(DeviceNode {
        identifier: DeviceId::new("DCE:gpp"),
        label: "GPP1".to_string(),
        device: Arc::clone(&device) as Arc<dyn Device>,
        manager: DeviceManagerId::new("DCE:node"),
        manager_label: "Node1".to_string(),
    });
    TestDomain {
        ctx: Arc::new(ctx),
        bus,
        naming,
        device,
    }
}

/// Both `Wave` components assigned to the fixture GPP.
pub(crate) fn wave_assignments() -> Vec<DeviceAssignment> {
    vec![
        DeviceAssignment::new("Amp_1", "DCE:gpp"),
        DeviceAssignment::new("Amp_2", "DCE:gpp"),
    ]
}
