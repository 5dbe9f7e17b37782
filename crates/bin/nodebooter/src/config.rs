//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `nodebooter.toml` in the working directory, or the file named
//! by `OSSIE_CONFIG`. Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ossie_app::retry::PollPolicy;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Domain identity and storage.
    pub domain: DomainConfig,
    /// Polling budgets.
    pub timeouts: TimeoutsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Device managers booted at startup, in order.
    pub nodes: Vec<NodeConfig>,
    /// Applications installed and created once every node is up.
    pub applications: Vec<ApplicationConfig>,
}

/// Domain manager settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Naming context of the domain.
    pub name: String,
    pub identifier: String,
    /// SDR root; domain profiles live under `dom/`, node profiles under `dev/`.
    pub sdr_root: PathBuf,
    /// Directory of a shared naming service. Without it the naming
    /// service only lives in this process.
    pub naming_dir: Option<PathBuf>,
}

/// Polling budgets, in milliseconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Overall budget for a launched object to appear in the naming service.
    pub name_resolution_ms: u64,
    pub initial_poll_ms: u64,
    pub max_poll_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// How a node's devices are hosted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Components are instantiated inside the node process.
    #[default]
    Virtual,
    /// Components are spawned as OS processes.
    Process,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Device configuration descriptor, relative to `<sdr_root>/dev`.
    pub dcd: String,
    #[serde(default)]
    pub mode: NodeMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Assembly descriptor, relative to `<sdr_root>/dom`.
    pub sad: String,
    /// Instance name; defaults to the assembly name.
    #[serde(default)]
    pub name: Option<String>,
    /// Component instantiation id to device id. Left empty, every
    /// component goes to the first registered device.
    #[serde(default)]
    pub assignments: BTreeMap<String, String>,
    #[serde(default)]
    pub start: bool,
}

impl ApplicationConfig {
    /// An application with automatic assignment that is not started.
    #[must_use]
    pub fn new(sad: impl Into<String>) -> Self {
        Self {
            sad: sad.into(),
            name: None,
            assignments: BTreeMap::new(),
            start: false,
        }
    }

    #[must_use]
    pub fn with_assignment(mut self, component: &str, device: &str) -> Self {
        self.assignments
            .insert(component.to_string(), device.to_string());
        self
    }
}

impl Config {
    /// Load configuration from `OSSIE_CONFIG` or `nodebooter.toml` (if
    /// present) then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed or the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("OSSIE_CONFIG").unwrap_or_else(|_| "nodebooter.toml".to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Io`] when the file exists but cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("OSSIE_DOMAIN_NAME") {
            self.domain.name = val;
        }
        if let Some(val) = var("OSSIE_SDR_ROOT") {
            self.domain.sdr_root = PathBuf::from(val);
        }
        if let Some(val) = var("OSSIE_NAMING_DIR") {
            self.domain.naming_dir = Some(PathBuf::from(val));
        }
        if let Some(val) = var("OSSIE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.name.trim().is_empty() {
            return Err(ConfigError::Validation("domain name must not be empty".to_string()));
        }
        let timeouts = &self.timeouts;
        if timeouts.name_resolution_ms == 0 || timeouts.initial_poll_ms == 0 || timeouts.max_poll_ms == 0 {
            return Err(ConfigError::Validation("timeouts must be non-zero".to_string()));
        }
        if timeouts.initial_poll_ms > timeouts.max_poll_ms {
            return Err(ConfigError::Validation(
                "initial poll interval exceeds the maximum poll interval".to_string(),
            ));
        }
        if self.domain.naming_dir.is_none() && self.nodes.iter().any(|n| n.mode == NodeMode::Process) {
            return Err(ConfigError::Validation(
                "process nodes need a shared naming directory".to_string(),
            ));
        }
        if !self.applications.is_empty() && self.nodes.iter().all(|n| n.mode == NodeMode::Process) {
            return Err(ConfigError::Validation(
                "applications need at least one virtual node; process nodes cannot host components"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Polling policy handed to every orchestration service.
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_millis(self.timeouts.name_resolution_ms),
            initial_interval: Duration::from_millis(self.timeouts.initial_poll_ms),
            max_interval: Duration::from_millis(self.timeouts.max_poll_ms),
        }
    }

    #[must_use]
    pub fn domain_root(&self) -> PathBuf {
        self.domain.sdr_root.join("dom")
    }

    #[must_use]
    pub fn device_root(&self) -> PathBuf {
        self.domain.sdr_root.join("dev")
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: "DomainName1".to_string(),
            identifier: "DCE:ossie-domain".to_string(),
            sdr_root: PathBuf::from("sdr"),
            naming_dir: None,
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            name_resolution_ms: 10_000,
            initial_poll_ms: 10,
            max_poll_ms: 500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "ossie_nodebooter=info,ossie=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.domain.name, "DomainName1");
        assert_eq!(config.domain.sdr_root, PathBuf::from("sdr"));
        assert!(config.domain.naming_dir.is_none());
        assert_eq!(config.timeouts.name_resolution_ms, 10_000);
        assert!(config.nodes.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.timeouts.max_poll_ms, 500);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [domain]
            name = 'Lab'
            identifier = 'DCE:lab'
            sdr_root = '/opt/sdr'
            naming_dir = '/run/ossie'

            [timeouts]
            name_resolution_ms = 2000
            initial_poll_ms = 5
            max_poll_ms = 100

            [logging]
            filter = 'debug'

            [[nodes]]
            dcd = '/nodes/Node1/DeviceManager.dcd.json'

            [[nodes]]
            dcd = '/nodes/Node2/DeviceManager.dcd.json'
            mode = 'process'

            [[applications]]
            sad = '/waveforms/Wave/Wave.sad.json'
            name = 'Wave_1'
            start = true
            assignments = { Amp_1 = 'DCE:GPP1', Amp_2 = 'DCE:GPP1' }
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.domain.name, "Lab");
        assert_eq!(config.domain.naming_dir, Some(PathBuf::from("/run/ossie")));
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].mode, NodeMode::Virtual);
        assert_eq!(config.nodes[1].mode, NodeMode::Process);
        let app = &config.applications[0];
        assert_eq!(app.name.as_deref(), Some("Wave_1"));
        assert!(app.start);
        assert_eq!(app.assignments["Amp_2"], "DCE:GPP1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_unknown_node_mode() {
        let toml = "
            [[nodes]]
            dcd = '/nodes/Node1/DeviceManager.dcd.json'
            mode = 'remote'
        ";
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent.toml")).unwrap();
        assert_eq!(config.domain.name, "DomainName1");
    }

    #[test]
    fn should_report_parse_error_when_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodebooter.toml");
        std::fs::write(&path, "[domain\nname = ").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn should_apply_environment_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "OSSIE_DOMAIN_NAME" => Some("Field".to_string()),
            "OSSIE_NAMING_DIR" => Some("/tmp/naming".to_string()),
            "OSSIE_LOG" => Some("warn".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        });
        assert_eq!(config.domain.name, "Field");
        assert_eq!(config.domain.naming_dir, Some(PathBuf::from("/tmp/naming")));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_empty_domain_name() {
        let mut config = Config::default();
        config.domain.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_timeout() {
        let mut config = Config::default();
        config.timeouts.name_resolution_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_initial_interval_above_maximum() {
        let mut config = Config::default();
        config.timeouts.initial_poll_ms = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_process_node_when_naming_is_private() {
        let mut config = Config::default();
        config.nodes.push(NodeConfig {
            dcd: "/nodes/Node1/DeviceManager.dcd.json".to_string(),
            mode: NodeMode::Process,
        });
        assert!(config.validate().is_err());

        config.domain.naming_dir = Some(PathBuf::from("/run/ossie"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_applications_when_every_node_runs_processes() {
        let mut config = Config::default();
        config.domain.naming_dir = Some(PathBuf::from("/run/ossie"));
        config.nodes.push(NodeConfig {
            dcd: "/nodes/Node1/DeviceManager.dcd.json".to_string(),
            mode: NodeMode::Process,
        });
        config
            .applications
            .push(ApplicationConfig::new("/waveforms/Wave/Wave.sad.json"));
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.nodes.push(NodeConfig {
            dcd: "/nodes/Node2/DeviceManager.dcd.json".to_string(),
            mode: NodeMode::Virtual,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_build_poll_policy_from_timeouts() {
        let policy = Config::default().poll_policy();
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.initial_interval, Duration::from_millis(10));
        assert_eq!(policy.max_interval, Duration::from_millis(500));
    }
}
