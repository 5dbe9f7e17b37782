//! Wires adapters into a running domain: naming, file systems, device
//! managers and the configured applications.

use std::sync::Arc;

use ossie_adapter_filesystem::LocalFileSystem;
use ossie_adapter_naming::{DirectoryNamingService, InMemoryNamingService};
use ossie_adapter_process::ProcessDeviceLauncher;
use ossie_adapter_virtual::{ComponentCatalog, VirtualDeviceLauncher};
use ossie_app::context::DomainContext;
use ossie_app::event_bus::InProcessEventBus;
use ossie_app::ports::{DeviceLauncher, FileSystem, NamingService};
use ossie_app::retry::PollPolicy;
use ossie_app::services::application::{Application, ReleaseReport};
use ossie_app::services::device_manager::{DeviceManager, NodeEnvironment};
use ossie_app::services::domain_manager::DomainManager;
use ossie_domain::application::DeviceAssignment;
use ossie_domain::error::{NotRegisteredError, OssieError};

use crate::config::{ApplicationConfig, Config, NodeConfig, NodeMode};

/// Capacity of the domain event channel.
const EVENT_CAPACITY: usize = 256;

pub type Bus = Arc<InProcessEventBus>;

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("failed to open naming service")]
    Naming(#[source] OssieError),

    #[error("failed to boot node `{dcd}`")]
    Node {
        dcd: String,
        #[source]
        source: OssieError,
    },

    #[error("failed to deploy application `{sad}`")]
    Application {
        sad: String,
        #[source]
        source: OssieError,
    },

    #[error("no registered in-process device can host application `{0}`")]
    NoDevice(String),
}

impl BootError {
    /// The orchestration error behind a node or application failure.
    #[must_use]
    pub fn orchestration_error(&self) -> Option<&OssieError> {
        match self {
            Self::Naming(source) | Self::Node { source, .. } | Self::Application { source, .. } => {
                Some(source)
            }
            Self::NoDevice(_) => None,
        }
    }
}

/// A booted domain with its nodes.
pub struct NodeBooter {
    domain: Arc<DomainManager<Bus>>,
    bus: Bus,
    naming: Arc<dyn NamingService>,
    catalog: Arc<ComponentCatalog>,
    node_fs: Arc<dyn FileSystem>,
    poll: PollPolicy,
    nodes: Vec<Arc<DeviceManager<Bus>>>,
}

impl NodeBooter {
    /// Start the domain, boot every configured node in order, then install,
    /// create and optionally start every configured application. A node
    /// whose devices only partly boot is kept. On any other failure,
    /// everything started so far is torn down again.
    ///
    /// # Errors
    ///
    /// Returns a [`BootError`] naming the node or application that failed.
    #[tracing::instrument(skip(config), fields(domain = %config.domain.name))]
    pub async fn boot(config: &Config) -> Result<Self, BootError> {
        let naming: Arc<dyn NamingService> = match &config.domain.naming_dir {
            Some(dir) => Arc::new(DirectoryNamingService::open(dir).map_err(BootError::Naming)?),
            None => Arc::new(InMemoryNamingService::new()),
        };
        let poll = config.poll_policy();
        let bus = Arc::new(InProcessEventBus::new(EVENT_CAPACITY));
        let ctx = DomainContext::new(
            config.domain.identifier.clone(),
            config.domain.name.clone(),
            Arc::clone(&naming),
            Arc::new(LocalFileSystem::new(config.domain_root())),
            Arc::clone(&bus),
        )
        .with_poll_policy(poll);
        let mut booter = Self {
            domain: Arc::new(DomainManager::new(Arc::new(ctx))),
            bus,
            naming,
            catalog: Arc::new(ComponentCatalog::new()),
            node_fs: Arc::new(LocalFileSystem::new(config.device_root())),
            poll,
            nodes: Vec::new(),
        };
        tracing::info!(sdr_root = %config.domain.sdr_root.display(), "domain manager started");

        if let Err(err) = booter.start(config).await {
            tracing::error!(error = %err, "boot aborted");
            booter.shutdown().await;
            return Err(err);
        }
        Ok(booter)
    }

    async fn start(&mut self, config: &Config) -> Result<(), BootError> {
        for node in &config.nodes {
            self.boot_node(node).await?;
        }
        for application in &config.applications {
            self.deploy(application).await?;
        }
        Ok(())
    }

    /// Boot one device manager.
    ///
    /// # Errors
    ///
    /// Returns [`BootError::Node`] when the node cannot be loaded or
    /// registered. Devices that fail to boot are logged and skipped.
    pub async fn boot_node(&mut self, node: &NodeConfig) -> Result<Arc<DeviceManager<Bus>>, BootError> {
        let failed = |source| BootError::Node {
            dcd: node.dcd.clone(),
            source,
        };
        let launcher: Arc<dyn DeviceLauncher> = match node.mode {
            NodeMode::Virtual => Arc::new(VirtualDeviceLauncher::new(
                Arc::clone(&self.naming),
                Arc::clone(&self.catalog),
            )),
            NodeMode::Process => Arc::new(ProcessDeviceLauncher::new(Arc::clone(&self.naming))),
        };
        let env = NodeEnvironment {
            domain: Arc::clone(&self.domain),
            naming: Arc::clone(&self.naming),
            launcher,
            file_system: Arc::clone(&self.node_fs),
            poll: self.poll,
        };
        let manager = DeviceManager::load(env, &node.dcd).map_err(failed)?;
        match manager.boot().await {
            Ok(()) => {}
            Err(OssieError::PartialFailure(report)) => {
                tracing::warn!(dcd = %node.dcd, error = %report, "node booted with failed devices");
            }
            Err(err) => {
                manager.shutdown().await;
                return Err(failed(err));
            }
        }
        self.nodes.push(Arc::clone(&manager));
        Ok(manager)
    }

    /// Install an assembly, create an application from it and start it
    /// when asked to.
    ///
    /// # Errors
    ///
    /// Returns [`BootError::NoDevice`] when automatic assignment finds no
    /// device hosting components in process, and [`BootError::Application`]
    /// for every orchestration failure, including explicit assignments to
    /// process devices.
    pub async fn deploy(&self, application: &ApplicationConfig) -> Result<Arc<Application<Bus>>, BootError> {
        let failed = |source| BootError::Application {
            sad: application.sad.clone(),
            source,
        };
        let factory_id = self
            .domain
            .install_application(&application.sad)
            .await
            .map_err(failed)?;
        let factory = self
            .domain
            .context()
            .factory(&factory_id)
            .ok_or_else(|| failed(NotRegisteredError::ApplicationFactory(factory_id.to_string()).into()))?;

        let assignments: Vec<DeviceAssignment> = if application.assignments.is_empty() {
            let device = self
                .domain
                .devices()
                .into_iter()
                .find(|node| node.device.hosts_in_process())
                .ok_or_else(|| BootError::NoDevice(application.sad.clone()))?;
            factory
                .assembly()
                .component_ids()
                .into_iter()
                .map(|component| DeviceAssignment::new(component.as_str(), device.identifier.as_str()))
                .collect()
        } else {
            application
                .assignments
                .iter()
                .map(|(component, device)| DeviceAssignment::new(component.as_str(), device.as_str()))
                .collect()
        };

        let name = application
            .name
            .clone()
            .unwrap_or_else(|| factory.name().to_string());
        let created = factory.create(&name, &[], &assignments).await.map_err(failed)?;
        if application.start {
            created.start().map_err(failed)?;
        }
        Ok(created)
    }

    #[must_use]
    pub fn domain(&self) -> &Arc<DomainManager<Bus>> {
        &self.domain
    }

    #[must_use]
    pub fn nodes(&self) -> &[Arc<DeviceManager<Bus>>] {
        &self.nodes
    }

    #[must_use]
    pub fn naming(&self) -> &Arc<dyn NamingService> {
        &self.naming
    }

    /// Virtual component manifests shared by every virtual node.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ComponentCatalog> {
        &self.catalog
    }

    #[must_use]
    pub fn events(&self) -> &Bus {
        &self.bus
    }

    #[must_use]
    pub fn applications(&self) -> Vec<Arc<Application<Bus>>> {
        self.domain.applications()
    }

    /// Release applications and uninstall factories, then shut nodes down
    /// newest first.
    pub async fn shutdown(&self) -> Vec<ReleaseReport> {
        let reports = self.domain.shutdown().await;
        for report in reports.iter().filter(|r| !r.is_clean()) {
            tracing::warn!(?report, "application released with failures");
        }
        for node in self.nodes.iter().rev() {
            node.shutdown().await;
        }
        tracing::info!("domain shut down");
        reports
    }
}
