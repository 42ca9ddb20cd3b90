// ABOUTME: Hooks bound to lifecycle points around a stack's remote actions.
// ABOUTME: Hooks for one point run sequentially; the first failure aborts the rest.

mod cmd;

pub use cmd::CmdHook;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::stack::Stack;
use crate::types::StackName;

/// Hook execution points in a stack's lifecycle.
///
/// `launch` wraps the create or update it chooses, so its hooks enclose the
/// nested step's own before/after hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeLaunch,
    AfterLaunch,
}

impl HookPoint {
    /// Configuration key for this point.
    pub fn key(&self) -> &'static str {
        match self {
            HookPoint::BeforeCreate => "before_create",
            HookPoint::AfterCreate => "after_create",
            HookPoint::BeforeUpdate => "before_update",
            HookPoint::AfterUpdate => "after_update",
            HookPoint::BeforeDelete => "before_delete",
            HookPoint::AfterDelete => "after_delete",
            HookPoint::BeforeLaunch => "before_launch",
            HookPoint::AfterLaunch => "after_launch",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A hook as declared on a stack: a kind tag plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookDefinition {
    #[serde(rename = "hook")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl HookDefinition {
    pub fn new<I, S>(kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Context passed to every hook invocation.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub stack: StackName,
    pub group: String,
    pub action: &'static str,
    pub point: HookPoint,
    pub project_dir: PathBuf,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("STACKPLAN_STACK".to_string(), self.stack.to_string());
        env.insert("STACKPLAN_GROUP".to_string(), self.group.clone());
        env.insert("STACKPLAN_ACTION".to_string(), self.action.to_string());
        env.insert("STACKPLAN_HOOK_POINT".to_string(), self.point.to_string());
        env.insert(
            "STACKPLAN_PROJECT_DIR".to_string(),
            self.project_dir.display().to_string(),
        );
        env
    }
}

/// Errors a single hook can report.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("unknown hook kind: {0}")]
    UnknownKind(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("command exited with code {exit_code:?}: {stderr}")]
    CommandFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to execute command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// The hook that stopped a lifecycle point, identified by position and kind.
#[derive(Debug, thiserror::Error)]
#[error("{point} hook #{index} ({kind}) failed: {source}")]
pub struct HookFailure {
    pub point: HookPoint,
    pub index: usize,
    pub kind: String,
    #[source]
    pub source: HookError,
}

/// A hook implementation, registered by kind tag.
#[async_trait]
pub trait Hook: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn run(&self, args: &[String], context: &HookContext) -> Result<(), HookError>;
}

/// Hooks keyed by kind tag.
#[derive(Clone)]
pub struct HookRegistry {
    hooks: HashMap<&'static str, Arc<dyn Hook>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CmdHook));
        registry
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.hooks.keys().collect();
        kinds.sort();
        f.debug_struct("HookRegistry").field("kinds", &kinds).finish()
    }
}

impl HookRegistry {
    pub fn empty() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Register a hook, replacing any existing one of the same kind.
    pub fn register(&mut self, hook: Arc<dyn Hook>) -> &mut Self {
        self.hooks.insert(hook.kind(), hook);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Hook>> {
        self.hooks.get(kind)
    }
}

/// Runs the hooks a stack declares for one lifecycle point.
pub struct HookRunner<'a> {
    registry: &'a HookRegistry,
    project_dir: &'a Path,
}

impl<'a> HookRunner<'a> {
    pub fn new(registry: &'a HookRegistry, project_dir: &'a Path) -> Self {
        Self {
            registry,
            project_dir,
        }
    }

    /// Run every hook bound to `point`, in declaration order.
    pub async fn run(
        &self,
        point: HookPoint,
        stack: &Stack,
        action: &'static str,
    ) -> Result<(), HookFailure> {
        let hooks = stack.hooks(point);
        if hooks.is_empty() {
            return Ok(());
        }

        let context = HookContext {
            stack: stack.name().clone(),
            group: stack.group().to_string(),
            action,
            point,
            project_dir: self.project_dir.to_path_buf(),
        };

        for (index, definition) in hooks.iter().enumerate() {
            tracing::info!(
                stack = %stack.name(),
                point = %point,
                kind = %definition.kind,
                "Running hook {}/{}",
                index + 1,
                hooks.len()
            );

            let outcome = match self.registry.get(&definition.kind) {
                Some(hook) => hook.run(&definition.args, &context).await,
                None => Err(HookError::UnknownKind(definition.kind.clone())),
            };

            if let Err(source) = outcome {
                tracing::warn!(
                    stack = %stack.name(),
                    point = %point,
                    kind = %definition.kind,
                    "Hook failed: {source}"
                );
                return Err(HookFailure {
                    point,
                    index,
                    kind: definition.kind.clone(),
                    source,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_point_keys() {
        assert_eq!(HookPoint::BeforeCreate.key(), "before_create");
        assert_eq!(HookPoint::AfterLaunch.key(), "after_launch");
    }

    #[test]
    fn hook_point_parses_from_yaml_key() {
        let point: HookPoint = serde_yaml::from_str("before_delete").unwrap();
        assert_eq!(point, HookPoint::BeforeDelete);
    }

    #[test]
    fn hook_definition_parses() {
        let def: HookDefinition = serde_yaml::from_str("{ hook: cmd, args: [echo hi] }").unwrap();
        assert_eq!(def, HookDefinition::new("cmd", ["echo hi"]));
    }

    #[test]
    fn hook_context_to_env() {
        let context = HookContext {
            stack: StackName::new("vpc").unwrap(),
            group: "dev/network".to_string(),
            action: "create",
            point: HookPoint::BeforeCreate,
            project_dir: PathBuf::from("/srv/project"),
        };

        let env = context.to_env();
        assert_eq!(env.get("STACKPLAN_STACK"), Some(&"vpc".to_string()));
        assert_eq!(env.get("STACKPLAN_GROUP"), Some(&"dev/network".to_string()));
        assert_eq!(env.get("STACKPLAN_ACTION"), Some(&"create".to_string()));
        assert_eq!(
            env.get("STACKPLAN_HOOK_POINT"),
            Some(&"before_create".to_string())
        );
        assert_eq!(
            env.get("STACKPLAN_PROJECT_DIR"),
            Some(&"/srv/project".to_string())
        );
    }

    #[test]
    fn default_registry_has_cmd() {
        assert!(HookRegistry::default().get("cmd").is_some());
        assert!(HookRegistry::empty().get("cmd").is_none());
    }
}
