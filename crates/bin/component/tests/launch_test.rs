//! Spawns the real `ossie-component` binary against a temporary naming
//! directory.

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use ossie_adapter_naming::DirectoryNamingService;
use ossie_app::ports::{NamingService, ObjectRef};
use ossie_domain::id::DeviceId;
use ossie_domain::launch::DeviceLaunchArgs;

const BIN: &str = env!("CARGO_BIN_EXE_ossie-component");

/// Kills the child when the test ends, whatever its outcome.
struct Running(Child);

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn reference(dir: &tempfile::TempDir) -> String {
    format!("file:{}", dir.path().display())
}

fn wait_for_binding(naming: &DirectoryNamingService, name: &str) -> Option<ObjectRef> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Ok(object) = naming.resolve(name) {
            return Some(object);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    None
}

#[test]
fn should_bind_in_naming_service_when_all_arguments_are_given() {
    let dir = tempfile::tempdir().unwrap();
    let child = Command::new(BIN)
        .args([
            "NAMING_CONTEXT_IOR",
            &reference(&dir),
            "NAME_BINDING",
            "DomainName1/Amp_1",
            "COMPONENT_IDENTIFIER",
            "Amp_1",
            "gain",
            "3",
        ])
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut running = Running(child);

    let naming = DirectoryNamingService::from_reference(&reference(&dir)).unwrap();
    let bound = wait_for_binding(&naming, "DomainName1/Amp_1").expect("component should bind itself");
    assert!(
        matches!(bound, ObjectRef::Stringified(ref r) if r.starts_with("local:")),
        "unexpected reference {bound:?}"
    );
    assert!(running.0.try_wait().unwrap().is_none());
}

#[test]
fn should_exit_non_zero_before_naming_when_component_identifier_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(BIN)
        .args([
            "NAMING_CONTEXT_IOR",
            &reference(&dir),
            "NAME_BINDING",
            "DomainName1/Amp_1",
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("COMPONENT_IDENTIFIER"));
    assert!(!dir.path().join("DomainName1").exists());
}

#[test]
fn should_exit_non_zero_for_unknown_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(BIN)
        .args([
            "NAMING_CONTEXT_IOR",
            &reference(&dir),
            "NAME_BINDING",
            "DomainName1/Amp_1",
            "COMPONENT_IDENTIFIER",
            "Amp_1",
            "OS_SCHEDULER",
            "SCHED_OTHER",
        ])
        .stderr(Stdio::null())
        .status()
        .unwrap();

    assert!(!status.success());
    assert!(!dir.path().join("DomainName1").exists());
}

#[test]
fn should_exit_non_zero_for_unreachable_naming_reference() {
    let status = Command::new(BIN)
        .args([
            "NAMING_CONTEXT_IOR",
            "IOR:000000",
            "NAME_BINDING",
            "DomainName1/Amp_1",
            "COMPONENT_IDENTIFIER",
            "Amp_1",
        ])
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
}

fn device_args(naming_context_ior: Option<String>) -> DeviceLaunchArgs {
    DeviceLaunchArgs {
        device_mgr_ior: "DCE:node".to_string(),
        profile_name: "/devices/GPP/GPP.spd.json".to_string(),
        device_id: DeviceId::new("DCE:gpp"),
        device_label: "GPP1".to_string(),
        naming_context_ior,
    }
}

#[test]
fn should_bind_device_under_its_label_when_started_with_device_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let child = Command::new(BIN)
        .args(device_args(Some(reference(&dir))).to_args())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut running = Running(child);

    let naming = DirectoryNamingService::from_reference(&reference(&dir)).unwrap();
    let bound = wait_for_binding(&naming, "DomainName1/GPP1").expect("device should bind itself");
    assert!(matches!(bound, ObjectRef::Stringified(_)), "unexpected reference {bound:?}");
    assert!(running.0.try_wait().unwrap().is_none());
}

#[test]
fn should_exit_non_zero_when_device_has_no_naming_reference() {
    let output = Command::new(BIN)
        .args(device_args(None).to_args())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("NAMING_CONTEXT_IOR"));
}

#[test]
fn should_exit_non_zero_when_device_label_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = device_args(Some(reference(&dir))).to_args();
    let label = args.iter().position(|a| a == "DEVICE_LABEL").unwrap();
    args.drain(label..label + 2);

    let output = Command::new(BIN).args(&args).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DEVICE_LABEL"));
    assert!(!dir.path().join("DomainName1").exists());
}
