//! # ossie-component — generic component and device process
//!
//! Spawned by an executable device with `KEY VALUE` argument pairs:
//! `NAMING_CONTEXT_IOR <ref> NAME_BINDING <name> COMPONENT_IDENTIFIER <id>`,
//! optionally `OS_SCHEDULER` and `OS_PRIORITY`; every other pair is kept as
//! an exec-time property of the component.
//!
//! Started with the device manager command line instead
//! (`DEVICE_MGR_IOR <ref> PROFILE_NAME <spd> DEVICE_ID <id> DEVICE_LABEL
//! <label> NAMING_CONTEXT_IOR <ref>`), it hosts a virtual executable device
//! bound under `DomainName1/<label>`.
//!
//! ## Responsibilities
//! - Parse and validate the command line; exit non-zero before touching
//!   the naming service when it is incomplete
//! - Open the naming directory designated by `NAMING_CONTEXT_IOR`
//! - Bind the component under `NAME_BINDING`, or the device under its label
//! - Run until interrupted or killed, unbinding on a graceful stop

use std::process::ExitCode;
use std::sync::Arc;

use ossie_adapter_naming::DirectoryNamingService;
use ossie_adapter_virtual::{ComponentCatalog, ComponentSpec, VirtualDevice, VirtualResource};
use ossie_app::ports::{NamingService, ObjectRef, Resource};
use ossie_domain::error::OssieError;
use ossie_domain::launch::{
    ComponentLaunchArgs, DEVICE_MGR_IOR, DeviceLaunchArgs, LaunchArgsError, NAMING_CONTEXT_IOR,
};
use ossie_domain::naming;
use tracing_subscriber::EnvFilter;

/// Exit status for an unusable command line.
const EXIT_USAGE: u8 = 2;
/// Exit status when the naming service cannot be reached.
const EXIT_NAMING: u8 = 3;

#[derive(Debug, thiserror::Error)]
enum ComponentError {
    #[error("invalid command line: {0}")]
    Args(#[from] LaunchArgsError),

    #[error("naming service failure: {0}")]
    Naming(#[from] OssieError),

    #[error("failed to wait for shutdown signal")]
    Signal(#[from] std::io::Error),
}

impl ComponentError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Args(_) => ExitCode::from(EXIT_USAGE),
            Self::Naming(_) | Self::Signal(_) => ExitCode::from(EXIT_NAMING),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let filter = std::env::var("OSSIE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ossie-component: {err}");
            err.exit_code()
        }
    }
}

async fn run() -> Result<(), ComponentError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().step_by(2).any(|key| key == DEVICE_MGR_IOR) {
        run_device(&args).await
    } else {
        run_component(&args).await
    }
}

async fn run_device(args: &[String]) -> Result<(), ComponentError> {
    let args = DeviceLaunchArgs::parse(args)?;
    let reference = args
        .naming_context_ior
        .clone()
        .ok_or(LaunchArgsError::Missing(NAMING_CONTEXT_IOR))?;

    let naming: Arc<dyn NamingService> = Arc::new(DirectoryNamingService::from_reference(&reference)?);
    let device = VirtualDevice::new(&args, Arc::clone(&naming), Arc::new(ComponentCatalog::new()));
    let binding = naming::in_domain(&args.device_label);
    naming.rebind(&binding, device.object())?;
    tracing::info!(
        device = %args.device_id,
        manager = %args.device_mgr_ior,
        binding = %binding,
        pid = std::process::id(),
        "device bound"
    );

    tokio::signal::ctrl_c().await?;

    if let Err(err) = device.release_object() {
        tracing::warn!(error = %err, "device release failed");
    }
    tracing::info!(device = %args.device_id, "device stopped");
    Ok(())
}

async fn run_component(args: &[String]) -> Result<(), ComponentError> {
    let args = ComponentLaunchArgs::parse(args)?;
    if args.scheduler.is_some() || args.priority.is_some() {
        tracing::debug!(
            scheduler = ?args.scheduler,
            priority = ?args.priority,
            "scheduling request left to the host defaults"
        );
    }

    let naming = DirectoryNamingService::from_reference(&args.naming_context_ior)?;
    let component = VirtualResource::new(
        args.component_identifier.as_str(),
        &ComponentSpec::default(),
        args.extras.clone(),
    );
    naming.rebind(
        &args.name_binding,
        ObjectRef::Resource(Arc::clone(&component) as Arc<dyn Resource>),
    )?;
    tracing::info!(
        component = %args.component_identifier,
        binding = %args.name_binding,
        pid = std::process::id(),
        "component bound"
    );

    tokio::signal::ctrl_c().await?;

    if let Err(err) = component.release_object() {
        tracing::warn!(error = %err, "component release failed");
    }
    if let Err(err) = naming.unbind(&args.name_binding) {
        tracing::warn!(error = %err, "component binding already gone");
    }
    tracing::info!(component = %args.component_identifier, "component stopped");
    Ok(())
}
