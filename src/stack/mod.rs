// ABOUTME: Immutable stack descriptor: one deployable unit and everything declared about it.
// ABOUTME: Built once from configuration, then shared read-only by the graph and executor.

mod group;
mod param;

pub use group::GroupPath;
pub use param::{ParamValue, ResolverExpr};

use std::collections::{BTreeMap, BTreeSet};

use crate::hooks::{HookDefinition, HookPoint};
use crate::types::StackName;

/// One deployable unit of infrastructure.
///
/// Construct with [`Stack::new`] and the `with_*` builders; once handed to
/// the graph the descriptor is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    name: StackName,
    group: GroupPath,
    dependencies: BTreeSet<StackName>,
    parameters: BTreeMap<String, ParamValue>,
    hooks: BTreeMap<HookPoint, Vec<HookDefinition>>,
}

impl Stack {
    pub fn new(name: StackName) -> Self {
        Self {
            name,
            group: GroupPath::root(),
            dependencies: BTreeSet::new(),
            parameters: BTreeMap::new(),
            hooks: BTreeMap::new(),
        }
    }

    pub fn with_group(mut self, group: GroupPath) -> Self {
        self.group = group;
        self
    }

    pub fn with_dependency(mut self, dependency: StackName) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    pub fn with_dependencies<I>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = StackName>,
    {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_hook(mut self, point: HookPoint, hook: HookDefinition) -> Self {
        self.hooks.entry(point).or_default().push(hook);
        self
    }

    pub fn name(&self) -> &StackName {
        &self.name
    }

    pub fn group(&self) -> &GroupPath {
        &self.group
    }

    /// Explicitly declared dependencies.
    pub fn dependencies(&self) -> &BTreeSet<StackName> {
        &self.dependencies
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    /// Hooks bound to a lifecycle point, in declaration order.
    pub fn hooks(&self, point: HookPoint) -> &[HookDefinition] {
        self.hooks.get(&point).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Display path: group segments followed by the stack name.
    pub fn path(&self) -> String {
        if self.group.is_root() {
            self.name.to_string()
        } else {
            format!("{}/{}", self.group, self.name)
        }
    }

    /// Whether a command path selects this stack.
    ///
    /// An empty path (or `.`) selects everything; otherwise the path must
    /// equal the stack's full path or name a group it lives under.
    pub fn matches_path(&self, command_path: &str) -> bool {
        let wanted = GroupPath::parse(command_path);
        if wanted.is_root() {
            return true;
        }
        self.group.join(self.name.as_str()).starts_with(&wanted)
    }
}
