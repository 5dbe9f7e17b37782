//! End-to-end deployment tests for the full nodebooter stack.
//!
//! Each test lays out an SDR root in a temporary directory (JSON
//! descriptors, component manifests as binaries), boots a domain with one
//! virtual node and deploys through the real services.

use std::path::Path;

use ossie_app::ports::{Device, Port, PropertySet};
use ossie_domain::application::ApplicationState;
use ossie_domain::device::UsageState;
use ossie_domain::error::{
    CapacityError, DeploymentRequestError, InvalidStateError, OssieError, PortError,
};
use ossie_domain::event::{EventType, SourceCategory};
use ossie_domain::id::ComponentId;
use ossie_domain::property::PropertyValue;
use ossie_nodebooter::{ApplicationConfig, BootError, Config, NodeBooter, NodeConfig};
use serde_json::{Value, json};

const NODE_DCD: &str = "/nodes/Node1/DeviceManager.dcd.json";
const WAVE_SAD: &str = "/waveforms/Wave/Wave.sad.json";
const SMALL_SAD: &str = "/waveforms/Small/Small.sad.json";
const LARGE_SAD: &str = "/waveforms/Large/Large.sad.json";
const GPP: &str = "DCE:GPP1";

// ---------------------------------------------------------------------------
// SDR fixture
// ---------------------------------------------------------------------------

fn write(root: &Path, path: &str, content: &Value) {
    let file = root.join(path.trim_start_matches('/'));
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(file, content.to_string()).unwrap();
}

fn linux_x86(id: &str) -> Value {
    json!({"id": id, "os": {"name": "Linux", "version": "2.6"}, "processors": ["x86"]})
}

/// Node1 hosting a single GPP with four `slots`.
fn write_node(dev: &Path) {
    write(dev, NODE_DCD, &json!({
        "id": "DCE:node1",
        "name": "Node1",
        "device_manager_softpkg": "DeviceManager.spd.json",
        "component_files": [{"id": "gpp", "file": "/devices/GPP/GPP.spd.json"}],
        "placements": [{"file_ref": "gpp", "id": GPP, "usage_name": "GPP1"}]
    }));
    write(dev, "/nodes/Node1/DeviceManager.spd.json", &json!({
        "id": "DCE:dm-spd",
        "name": "DeviceManager",
        "implementations": [linux_x86("node-linux")]
    }));
    write(dev, "/devices/GPP/GPP.spd.json", &json!({
        "id": "DCE:gpp-spd",
        "name": "GPP",
        "property_file": "GPP.prf.json",
        "implementations": [linux_x86("gpp-linux")]
    }));
    write(dev, "/devices/GPP/GPP.prf.json", &json!({"simples": [
        {"id": "slots", "type": "ulong", "value": "4", "kinds": ["allocation"]}
    ]}));
}

/// A resource package taking `slots` from its device; the binary is a
/// virtual component manifest.
fn write_component(dom: &Path, name: &str, slots: u32, manifest: &Value) {
    let dir = format!("/components/{name}");
    let binary = name.to_lowercase();
    let mut implementation = linux_x86(&format!("{binary}-linux"));
    implementation["code"] = json!({"type": "executable", "local_file": binary});
    write(dom, &format!("{dir}/{name}.spd.json"), &json!({
        "id": format!("DCE:{binary}"),
        "name": name,
        "property_file": format!("{name}.prf.json"),
        "descriptor": format!("{name}.scd.json"),
        "implementations": [implementation]
    }));
    write(dom, &format!("{dir}/{name}.prf.json"), &json!({"simples": [
        {"id": "slots", "type": "ulong", "value": slots.to_string(), "kinds": ["allocation"]}
    ]}));
    write(dom, &format!("{dir}/{name}.scd.json"), &json!({"component_type": "resource"}));
    write(dom, &format!("{dir}/{binary}"), manifest);
}

/// An assembly with one instantiation of `component`.
fn write_single(dom: &Path, sad: &str, component: &str) {
    write(dom, sad, &json!({
        "id": format!("DCE:{}", component.to_lowercase()),
        "name": component,
        "component_files": [{"id": "c", "file": format!("/components/{component}/{component}.spd.json")}],
        "placements": [{"file_ref": "c", "instantiations": [{"id": format!("{component}_1")}]}],
        "assembly_controller": format!("{component}_1")
    }));
}

fn write_sdr(root: &Path) {
    let dom = root.join("dom");
    write_node(&root.join("dev"));

    write_component(&dom, "Amp", 1, &json!({"uses": ["out"], "provides": ["in"]}));
    write(&dom, WAVE_SAD, &json!({
        "id": "DCE:wave",
        "name": "Wave",
        "component_files": [{"id": "amp", "file": "/components/Amp/Amp.spd.json"}],
        "placements": [{"file_ref": "amp", "instantiations": [
            {"id": "Amp_1", "usage_name": "Amp"},
            {"id": "Amp_2", "usage_name": "Amp2"}
        ]}],
        "assembly_controller": "Amp_1",
        "connections": [{
            "id": "c1",
            "uses": {"port": "out", "target": {"component": "Amp_1"}},
            "provides": {"port": {"port": "in", "target": {"component": "Amp_2"}}}
        }]
    }));

    write_component(&dom, "Small", 2, &json!({}));
    write_single(&dom, SMALL_SAD, "Small");
    write_component(&dom, "Large", 3, &json!({}));
    write_single(&dom, LARGE_SAD, "Large");
}

fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.domain.sdr_root = root.to_path_buf();
    config.timeouts.name_resolution_ms = 2_000;
    config.timeouts.initial_poll_ms = 1;
    config.timeouts.max_poll_ms = 20;
    config.nodes.push(NodeConfig {
        dcd: NODE_DCD.to_string(),
        mode: ossie_nodebooter::NodeMode::Virtual,
    });
    config
}

async fn booted(root: &Path) -> NodeBooter {
    write_sdr(root);
    NodeBooter::boot(&config(root))
        .await
        .expect("fixture domain should boot")
}

fn slots_left(booter: &NodeBooter) -> PropertyValue {
    let gpp = &booter.domain().devices()[0].device;
    gpp.query(&["slots".to_string()]).unwrap().remove(0).value
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_register_node_devices_when_booted() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted(dir.path()).await;

    let devices = booter.domain().devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].label, "GPP1");
    assert_eq!(devices[0].manager_label, "Node1");
    assert_eq!(devices[0].device.usage_state(), UsageState::Idle);
    assert_eq!(slots_left(&booter), PropertyValue::ULong(4));
    assert_eq!(booter.domain().device_managers().len(), 1);
}

#[tokio::test]
async fn should_create_and_start_configured_applications_when_booted() {
    let dir = tempfile::tempdir().unwrap();
    write_sdr(dir.path());
    let mut config = config(dir.path());
    let mut wave = ApplicationConfig::new(WAVE_SAD);
    wave.name = Some("Wave_1".to_string());
    wave.start = true;
    config.applications.push(wave);

    let booter = NodeBooter::boot(&config).await.unwrap();

    let applications = booter.applications();
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].name(), "Wave_1");
    assert_eq!(applications[0].state(), ApplicationState::Started);
    assert_eq!(slots_left(&booter), PropertyValue::ULong(2));
}

#[tokio::test]
async fn should_fail_boot_when_node_descriptor_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.nodes[0].dcd = "/nodes/Missing/DeviceManager.dcd.json".to_string();

    let err = NodeBooter::boot(&config).await.err().unwrap();

    assert!(matches!(err, BootError::Node { ref dcd, .. } if dcd.contains("Missing")));
    assert!(matches!(err.orchestration_error(), Some(OssieError::InvalidProfile(_))));
}

#[tokio::test]
async fn should_release_everything_when_shut_down() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted(dir.path()).await;
    booter.deploy(&ApplicationConfig::new(WAVE_SAD)).await.unwrap();

    let reports = booter.shutdown().await;

    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_clean());
    assert!(booter.applications().is_empty());
    assert!(booter.domain().application_factories().is_empty());
    assert!(booter.domain().devices().is_empty());
    assert!(booter.domain().device_managers().is_empty());
}

// ---------------------------------------------------------------------------
// Capacity accounting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_reject_allocation_beyond_remaining_capacity_until_released() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted(dir.path()).await;

    let small = booter
        .deploy(&ApplicationConfig::new(SMALL_SAD).with_assignment("Small_1", GPP))
        .await
        .unwrap();
    assert_eq!(slots_left(&booter), PropertyValue::ULong(2));

    let large = ApplicationConfig::new(LARGE_SAD).with_assignment("Large_1", GPP);
    let err = booter.deploy(&large).await.err().unwrap();
    assert!(matches!(
        err.orchestration_error(),
        Some(OssieError::InvalidCapacity(CapacityError::Insufficient { .. }))
    ));
    assert_eq!(slots_left(&booter), PropertyValue::ULong(2));
    assert_eq!(booter.applications().len(), 1);

    small.release_object().await.unwrap();
    assert_eq!(slots_left(&booter), PropertyValue::ULong(4));

    booter.deploy(&large).await.unwrap();
    assert_eq!(slots_left(&booter), PropertyValue::ULong(1));
    assert_eq!(
        booter.domain().devices()[0].device.usage_state(),
        UsageState::Active
    );
}

// ---------------------------------------------------------------------------
// Connections and release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_report_not_connected_after_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted(dir.path()).await;
    let wave = booter.deploy(&ApplicationConfig::new(WAVE_SAD)).await.unwrap();

    let connections = wave.connections();
    assert_eq!(connections.len(), 1);
    let record = &connections[0];
    let id = record.connection.id.clone();
    assert!(record.port.is_connected(&id));

    record.port.disconnect_port(&id).unwrap();

    assert!(!record.port.is_connected(&id));
    assert!(matches!(
        record.port.disconnect_port(&id),
        Err(OssieError::Port(PortError::NotConnected { .. }))
    ));
}

#[tokio::test]
async fn should_refuse_second_release_of_application() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted(dir.path()).await;
    let wave = booter.deploy(&ApplicationConfig::new(WAVE_SAD)).await.unwrap();

    wave.release_object().await.unwrap();
    let second = wave.release_object().await;

    assert!(matches!(
        second,
        Err(OssieError::InvalidState(InvalidStateError::AlreadyReleased(_)))
    ));
    assert_eq!(wave.state(), ApplicationState::Released);
    assert!(booter.applications().is_empty());
    assert_eq!(slots_left(&booter), PropertyValue::ULong(4));
}

// ---------------------------------------------------------------------------
// Assignment validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_list_exactly_the_unassigned_component_when_assignment_is_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted(dir.path()).await;
    let mut events = booter.events().subscribe();

    let partial = ApplicationConfig::new(WAVE_SAD).with_assignment("Amp_1", GPP);
    let err = booter.deploy(&partial).await.err().unwrap();

    match err.orchestration_error() {
        Some(OssieError::DeploymentRequest(DeploymentRequestError::UnassignedComponents(ids))) => {
            assert_eq!(ids, &vec![ComponentId::new("Amp_2")]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(booter.applications().is_empty());
    assert_eq!(slots_left(&booter), PropertyValue::ULong(4));

    // only the factory installation was announced
    let event = events.try_recv().unwrap();
    assert_eq!(event.event_type, EventType::ObjectAdded);
    assert_eq!(event.source_category, SourceCategory::ApplicationFactory);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn should_reject_assignment_to_unknown_device() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted(dir.path()).await;

    let config = ApplicationConfig::new(SMALL_SAD).with_assignment("Small_1", "DCE:nowhere");
    let err = booter.deploy(&config).await.err().unwrap();

    assert!(matches!(
        err.orchestration_error(),
        Some(OssieError::DeploymentRequest(DeploymentRequestError::UnknownDevice { .. }))
    ));
    assert!(booter.applications().is_empty());
}

// ---------------------------------------------------------------------------
// Process nodes
// ---------------------------------------------------------------------------

const PROCESS_DCD: &str = "/nodes/Node2/DeviceManager.dcd.json";
const PROCESS_GPP: &str = "DCE:GPP2";

/// Node2 hosting one GPP whose components run as OS processes.
fn write_process_node(dev: &Path) {
    write(dev, PROCESS_DCD, &json!({
        "id": "DCE:node2",
        "name": "Node2",
        "device_manager_softpkg": "DeviceManager.spd.json",
        "component_files": [{"id": "gpp", "file": "/devices/GPP/GPP.spd.json"}],
        "placements": [{"file_ref": "gpp", "id": PROCESS_GPP, "usage_name": "GPP2"}]
    }));
    write(dev, "/nodes/Node2/DeviceManager.spd.json", &json!({
        "id": "DCE:dm2-spd",
        "name": "DeviceManager",
        "implementations": [linux_x86("node-linux")]
    }));
}

/// Process node first, so it registers the first device of the domain.
async fn booted_with_process_node(root: &Path) -> NodeBooter {
    write_sdr(root);
    write_process_node(&root.join("dev"));
    let mut config = config(root);
    config.domain.naming_dir = Some(root.join("naming"));
    config.nodes.insert(0, NodeConfig {
        dcd: PROCESS_DCD.to_string(),
        mode: ossie_nodebooter::NodeMode::Process,
    });
    NodeBooter::boot(&config)
        .await
        .expect("mixed domain should boot")
}

#[tokio::test]
async fn should_refuse_explicit_assignment_to_process_device_before_any_side_effect() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted_with_process_node(dir.path()).await;
    assert_eq!(booter.domain().devices()[0].identifier.as_str(), PROCESS_GPP);

    let config = ApplicationConfig::new(SMALL_SAD).with_assignment("Small_1", PROCESS_GPP);
    let err = booter.deploy(&config).await.err().unwrap();

    assert!(matches!(
        err.orchestration_error(),
        Some(OssieError::DeploymentRequest(DeploymentRequestError::OutOfProcessDevice { device, .. }))
            if device.as_str() == PROCESS_GPP
    ));
    assert!(booter.applications().is_empty());
    assert!(booter.naming().list("DomainName1/Small_1").is_err());
}

#[tokio::test]
async fn should_auto_assign_to_in_process_device_when_a_process_node_is_present() {
    let dir = tempfile::tempdir().unwrap();
    let booter = booted_with_process_node(dir.path()).await;

    let small = booter.deploy(&ApplicationConfig::new(SMALL_SAD)).await.unwrap();

    assert!(small
        .component_devices()
        .iter()
        .all(|a| a.assigned_device.as_str() == GPP));
    booter.shutdown().await;
}
