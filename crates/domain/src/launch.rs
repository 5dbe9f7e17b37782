//! Process launch arguments.
//!
//! Spawned components and devices receive their context as flat
//! `KEY VALUE` argument pairs.

use std::fmt;
use std::str::FromStr;

use crate::id::{ComponentId, DeviceId};
use crate::property::DataType;

pub const NAMING_CONTEXT_IOR: &str = "NAMING_CONTEXT_IOR";
pub const NAME_BINDING: &str = "NAME_BINDING";
pub const COMPONENT_IDENTIFIER: &str = "COMPONENT_IDENTIFIER";
pub const OS_SCHEDULER: &str = "OS_SCHEDULER";
pub const OS_PRIORITY: &str = "OS_PRIORITY";

pub const DEVICE_MGR_IOR: &str = "DEVICE_MGR_IOR";
pub const PROFILE_NAME: &str = "PROFILE_NAME";
pub const DEVICE_ID: &str = "DEVICE_ID";
pub const DEVICE_LABEL: &str = "DEVICE_LABEL";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LaunchArgsError {
    #[error("missing required argument {0}")]
    Missing(&'static str),

    #[error("argument {0} has no value")]
    DanglingKey(String),

    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicy {
    RoundRobin,
    Fifo,
}

impl FromStr for SchedulerPolicy {
    type Err = LaunchArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHED_RR" => Ok(Self::RoundRobin),
            "SCHED_FIFO" => Ok(Self::Fifo),
            other => Err(LaunchArgsError::InvalidValue {
                key: OS_SCHEDULER,
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RoundRobin => "SCHED_RR",
            Self::Fifo => "SCHED_FIFO",
        })
    }
}

fn pairs<I, S>(args: I) -> Result<Vec<(String, String)>, LaunchArgsError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let mut out = Vec::new();
    while let Some(key) = iter.next() {
        let key = key.as_ref().to_string();
        let value = iter
            .next()
            .ok_or_else(|| LaunchArgsError::DanglingKey(key.clone()))?;
        out.push((key, value.as_ref().to_string()));
    }
    Ok(out)
}

/// Command line of a spawned component process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLaunchArgs {
    pub naming_context_ior: String,
    pub name_binding: String,
    pub component_identifier: ComponentId,
    pub scheduler: Option<SchedulerPolicy>,
    pub priority: Option<i32>,
    /// Unrecognized pairs, passed through as exec-time configuration.
    pub extras: Vec<(String, String)>,
}

impl ComponentLaunchArgs {
    /// Parse `KEY VALUE` pairs (program name excluded).
    ///
    /// # Errors
    ///
    /// Returns [`LaunchArgsError`] when a required argument is missing, a
    /// key has no value, or a scheduler/priority value is invalid.
    pub fn parse<I, S>(args: I) -> Result<Self, LaunchArgsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut naming_context_ior = None;
        let mut name_binding = None;
        let mut component_identifier = None;
        let mut scheduler = None;
        let mut priority = None;
        let mut extras = Vec::new();
        for (key, value) in pairs(args)? {
            match key.as_str() {
                NAMING_CONTEXT_IOR => naming_context_ior = Some(value),
                NAME_BINDING => name_binding = Some(value),
                COMPONENT_IDENTIFIER => component_identifier = Some(ComponentId::new(value)),
                OS_SCHEDULER => scheduler = Some(value.parse()?),
                OS_PRIORITY => {
                    priority = Some(value.parse().map_err(|_| LaunchArgsError::InvalidValue {
                        key: OS_PRIORITY,
                        value,
                    })?);
                }
                _ => extras.push((key, value)),
            }
        }
        Ok(Self {
            naming_context_ior: naming_context_ior
                .ok_or(LaunchArgsError::Missing(NAMING_CONTEXT_IOR))?,
            name_binding: name_binding.ok_or(LaunchArgsError::Missing(NAME_BINDING))?,
            component_identifier: component_identifier
                .ok_or(LaunchArgsError::Missing(COMPONENT_IDENTIFIER))?,
            scheduler,
            priority,
            extras,
        })
    }

    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Build the launch arguments carried by exec parameters.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchArgsError::Missing`] when one of the required
    /// parameters is absent.
    pub fn from_parameters(parameters: &[DataType]) -> Result<Self, LaunchArgsError> {
        Self::parse(parameters_to_args(parameters))
    }
}

/// Command line of a spawned device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLaunchArgs {
    pub device_mgr_ior: String,
    pub profile_name: String,
    pub device_id: DeviceId,
    pub device_label: String,
    pub naming_context_ior: Option<String>,
}

impl DeviceLaunchArgs {
    /// Parse `KEY VALUE` pairs (program name excluded).
    ///
    /// # Errors
    ///
    /// Returns [`LaunchArgsError`] when a required argument is missing or a
    /// key has no value.
    pub fn parse<I, S>(args: I) -> Result<Self, LaunchArgsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut device_mgr_ior = None;
        let mut profile_name = None;
        let mut device_id = None;
        let mut device_label = None;
        let mut naming_context_ior = None;
        for (key, value) in pairs(args)? {
            match key.as_str() {
                DEVICE_MGR_IOR => device_mgr_ior = Some(value),
                PROFILE_NAME => profile_name = Some(value),
                DEVICE_ID => device_id = Some(DeviceId::new(value)),
                DEVICE_LABEL => device_label = Some(value),
                NAMING_CONTEXT_IOR => naming_context_ior = Some(value),
                _ => {}
            }
        }
        Ok(Self {
            device_mgr_ior: device_mgr_ior.ok_or(LaunchArgsError::Missing(DEVICE_MGR_IOR))?,
            profile_name: profile_name.ok_or(LaunchArgsError::Missing(PROFILE_NAME))?,
            device_id: device_id.ok_or(LaunchArgsError::Missing(DEVICE_ID))?,
            device_label: device_label.ok_or(LaunchArgsError::Missing(DEVICE_LABEL))?,
            naming_context_ior,
        })
    }

    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            DEVICE_MGR_IOR.to_string(),
            self.device_mgr_ior.clone(),
            PROFILE_NAME.to_string(),
            self.profile_name.clone(),
            DEVICE_ID.to_string(),
            self.device_id.to_string(),
            DEVICE_LABEL.to_string(),
            self.device_label.clone(),
        ];
        if let Some(ior) = &self.naming_context_ior {
            args.push(NAMING_CONTEXT_IOR.to_string());
            args.push(ior.clone());
        }
        args
    }
}

/// Flatten parameters into `KEY VALUE` argument pairs.
#[must_use]
pub fn parameters_to_args(parameters: &[DataType]) -> Vec<String> {
    parameters
        .iter()
        .flat_map(|p| [p.id.clone(), p.value.to_string()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_required_and_optional_arguments() {
        let args = ComponentLaunchArgs::parse([
            "NAMING_CONTEXT_IOR",
            "file:/tmp/naming",
            "NAME_BINDING",
            "DomainName1/Wave_1/Amp_1",
            "COMPONENT_IDENTIFIER",
            "Amp_1",
            "OS_SCHEDULER",
            "SCHED_FIFO",
            "OS_PRIORITY",
            "10",
            "gain",
            "2.5",
        ])
        .unwrap();
        assert_eq!(args.component_identifier, ComponentId::new("Amp_1"));
        assert_eq!(args.scheduler, Some(SchedulerPolicy::Fifo));
        assert_eq!(args.priority, Some(10));
        assert_eq!(args.extra("gain"), Some("2.5"));
    }

    #[test]
    fn should_fail_when_component_identifier_is_missing() {
        let err = ComponentLaunchArgs::parse([
            "NAMING_CONTEXT_IOR",
            "file:/tmp/naming",
            "NAME_BINDING",
            "Amp_1",
        ])
        .unwrap_err();
        assert_eq!(err, LaunchArgsError::Missing(COMPONENT_IDENTIFIER));
    }

    #[test]
    fn should_reject_unknown_scheduler_and_bad_priority() {
        let base = ["NAMING_CONTEXT_IOR", "x", "NAME_BINDING", "y", "COMPONENT_IDENTIFIER", "z"];
        let with_sched: Vec<&str> = base.iter().copied().chain(["OS_SCHEDULER", "SCHED_OTHER"]).collect();
        assert!(matches!(
            ComponentLaunchArgs::parse(with_sched),
            Err(LaunchArgsError::InvalidValue { key: OS_SCHEDULER, .. })
        ));
        let with_prio: Vec<&str> = base.iter().copied().chain(["OS_PRIORITY", "high"]).collect();
        assert!(matches!(
            ComponentLaunchArgs::parse(with_prio),
            Err(LaunchArgsError::InvalidValue { key: OS_PRIORITY, .. })
        ));
    }

    #[test]
    fn should_reject_dangling_key() {
        let err = ComponentLaunchArgs::parse(["NAMING_CONTEXT_IOR"]).unwrap_err();
        assert_eq!(err, LaunchArgsError::DanglingKey("NAMING_CONTEXT_IOR".to_string()));
    }

    #[test]
    fn should_parse_device_arguments_back_from_to_args() {
        let args = DeviceLaunchArgs {
            device_mgr_ior: "devmgr:DCE:node".to_string(),
            profile_name: "/devices/GPP/GPP.spd.json".to_string(),
            device_id: DeviceId::new("DCE:gpp"),
            device_label: "GPP1".to_string(),
            naming_context_ior: Some("memory:1".to_string()),
        };
        assert_eq!(DeviceLaunchArgs::parse(args.to_args()).unwrap(), args);
    }

    #[test]
    fn should_build_component_arguments_from_exec_parameters() {
        let params = vec![
            DataType::new(NAMING_CONTEXT_IOR, "file:/tmp/n"),
            DataType::new(NAME_BINDING, "DomainName1/W_1/A_1"),
            DataType::new(COMPONENT_IDENTIFIER, "A_1"),
        ];
        let args = ComponentLaunchArgs::from_parameters(&params).unwrap();
        assert_eq!(args.name_binding, "DomainName1/W_1/A_1");
        assert!(args.extras.is_empty());
    }
}
