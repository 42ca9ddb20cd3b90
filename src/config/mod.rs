// ABOUTME: Configuration types and parsing for stackplan.yml.
// ABOUTME: Handles YAML parsing, settings defaults, and group-path inheritance.

mod deserialize;
mod init;

pub use init::init_config;

use crate::error::{Error, Result};
use crate::hooks::{HookDefinition, HookPoint};
use crate::plan::{
    DEFAULT_DRIFT_POLL_INTERVAL, DEFAULT_DRIFT_TIMEOUT, DEFAULT_MAX_CONCURRENCY, ExecutionSettings,
};
use crate::stack::{GroupPath, ParamValue, Stack};
use crate::types::StackName;
use deserialize::{deserialize_command, deserialize_stacks};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stackplan.yml";
pub const CONFIG_FILENAME_ALT: &str = "stackplan.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stackplan/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub settings: SettingsConfig,

    #[serde(default)]
    pub provisioner: Option<ProvisionerConfig>,

    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,

    #[serde(deserialize_with = "deserialize_stacks")]
    pub stacks: NonEmpty<StackConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_drift_timeout", with = "humantime_serde")]
    pub drift_timeout: Duration,

    #[serde(default = "default_drift_poll_interval", with = "humantime_serde")]
    pub drift_poll_interval: Duration,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            drift_timeout: default_drift_timeout(),
            drift_poll_interval: default_drift_poll_interval(),
        }
    }
}

impl SettingsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "settings.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.drift_poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "settings.drift_poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            max_concurrency: self.max_concurrency,
            drift_timeout: self.drift_timeout,
            drift_poll_interval: self.drift_poll_interval,
        }
    }
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_drift_timeout() -> Duration {
    DEFAULT_DRIFT_TIMEOUT
}

fn default_drift_poll_interval() -> Duration {
    DEFAULT_DRIFT_POLL_INTERVAL
}

/// External program that talks to the provisioning API.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionerConfig {
    #[serde(deserialize_with = "deserialize_command")]
    pub command: NonEmpty<String>,

    /// Working directory, relative to the project directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Values every stack under a group path inherits.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,

    #[serde(default)]
    pub dependencies: Vec<StackName>,

    #[serde(default)]
    pub hooks: BTreeMap<HookPoint, Vec<HookDefinition>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    pub name: StackName,

    #[serde(default)]
    pub group: String,

    #[serde(default)]
    pub dependencies: Vec<StackName>,

    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,

    #[serde(default)]
    pub hooks: BTreeMap<HookPoint, Vec<HookDefinition>>,
}

impl ProjectConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.settings.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Path of the first config file found in `dir`.
    pub fn locate(dir: &Path) -> Result<PathBuf> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        candidates
            .into_iter()
            .find(|path| path.exists())
            .ok_or_else(|| Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        Self::load(&Self::locate(dir)?)
    }

    /// Stack descriptors with group inheritance applied.
    ///
    /// Groups apply root first, so nearer groups override further ones and
    /// the stack's own values override every group. Dependencies are
    /// unioned; hook lists are replaced per lifecycle point.
    pub fn stacks(&self) -> Vec<Stack> {
        let groups: BTreeMap<GroupPath, &GroupConfig> = self
            .groups
            .iter()
            .map(|(path, group)| (GroupPath::parse(path), group))
            .collect();

        self.stacks
            .iter()
            .map(|config| {
                let group_path = GroupPath::parse(&config.group);
                let mut parameters = BTreeMap::new();
                let mut dependencies = Vec::new();
                let mut hooks = BTreeMap::new();

                let inherited = group_path
                    .ancestors_inclusive()
                    .filter_map(|ancestor| groups.get(&ancestor).copied());
                for group in inherited {
                    parameters.extend(group.parameters.clone());
                    dependencies.extend(group.dependencies.iter().cloned());
                    hooks.extend(group.hooks.clone());
                }
                parameters.extend(config.parameters.clone());
                dependencies.extend(config.dependencies.iter().cloned());
                hooks.extend(config.hooks.clone());

                // A group may list a stack that lives inside it.
                dependencies.retain(|d| d != &config.name);

                let mut stack = Stack::new(config.name.clone())
                    .with_group(group_path)
                    .with_dependencies(dependencies);
                for (name, value) in parameters {
                    stack = stack.with_parameter(name, value);
                }
                for (point, definitions) in hooks {
                    for definition in definitions {
                        stack = stack.with_hook(point, definition);
                    }
                }
                stack
            })
            .collect()
    }
}
