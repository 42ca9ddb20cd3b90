// ABOUTME: A plan binds one action to the scoped, ordered part of a stack graph.
// ABOUTME: Scope and generations are computed once; execution lives in the executor.

mod context;
mod drift;
mod error;
mod executor;
mod record;
mod report;

pub use context::{
    DEFAULT_DRIFT_POLL_INTERVAL, DEFAULT_DRIFT_TIMEOUT, DEFAULT_MAX_CONCURRENCY, ExecutionContext,
    ExecutionSettings,
};
pub use error::{PlanError, PlanErrorKind, StackError, TransitionError};
pub use record::{DriftStatus, ExecutionRecord, RecordTable, StackOutcome, StackStatus};
pub use report::{PlanReport, StackReport};

use serde::Serialize;
use snafu::{ResultExt, ensure};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::graph::{Direction, StackGraph};
use crate::types::StackName;

/// The operation a plan performs on every stack in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    /// Create or update depending on remote state.
    Launch,
    /// Start a drift detection and poll it to completion.
    DriftDetect,
    /// Report the last drift detection without starting one.
    DriftShow,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Launch => "launch",
            ActionKind::DriftDetect => "drift_detect",
            ActionKind::DriftShow => "drift_show",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            ActionKind::Delete => Direction::Reverse,
            _ => Direction::Forward,
        }
    }

    /// Whether stack parameters must be resolved before the remote call.
    pub fn needs_parameters(&self) -> bool {
        matches!(
            self,
            ActionKind::Create | ActionKind::Update | ActionKind::Launch
        )
    }

    pub fn is_drift(&self) -> bool {
        matches!(self, ActionKind::DriftDetect | ActionKind::DriftShow)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied knobs for building a plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Group path or stack path to act on; empty selects everything.
    pub command_path: String,
    /// Act on exactly the selected stacks and never skip on dependency failure.
    pub ignore_dependencies: bool,
}

impl PlanOptions {
    pub fn new(command_path: impl Into<String>) -> Self {
        Self {
            command_path: command_path.into(),
            ignore_dependencies: false,
        }
    }

    pub fn ignore_dependencies(mut self, ignore: bool) -> Self {
        self.ignore_dependencies = ignore;
        self
    }
}

/// One action over the scoped part of a graph, with its generations.
#[derive(Debug)]
pub struct Plan {
    graph: Arc<StackGraph>,
    action: ActionKind,
    options: PlanOptions,
    scope: BTreeSet<StackName>,
    batches: Vec<Vec<StackName>>,
}

impl Plan {
    /// Select the command path, expand it along the action's direction
    /// unless dependencies are ignored, and compute the generations.
    pub fn new(
        graph: Arc<StackGraph>,
        action: ActionKind,
        options: PlanOptions,
    ) -> Result<Self, PlanError> {
        let selected = graph.select(&options.command_path);
        ensure!(
            !selected.is_empty(),
            error::EmptyScopeSnafu {
                path: options.command_path.clone(),
            }
        );

        let scope = if options.ignore_dependencies {
            selected
        } else {
            graph.closure(&selected, action.direction())
        };
        let batches = graph
            .generations(&scope, action.direction())
            .context(error::SchedulingSnafu)?;

        tracing::debug!(
            action = %action,
            path = %options.command_path,
            stacks = scope.len(),
            generations = batches.len(),
            "Planned"
        );

        Ok(Self {
            graph,
            action,
            options,
            scope,
            batches,
        })
    }

    pub fn action(&self) -> ActionKind {
        self.action
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    pub fn graph(&self) -> &StackGraph {
        &self.graph
    }

    pub fn scope(&self) -> &BTreeSet<StackName> {
        &self.scope
    }

    /// Generations in execution order.
    pub fn batches(&self) -> &[Vec<StackName>] {
        &self.batches
    }
}
