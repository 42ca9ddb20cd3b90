// ABOUTME: Per-stack errors recorded in execution records, and plan-level harness errors.
// ABOUTME: Stack errors stay isolated to a subtree; plan errors abort the whole run.

use snafu::Snafu;
use std::time::Duration;

use crate::graph::GraphError;
use crate::hooks::HookFailure;
use crate::provider::ProviderError;
use crate::resolvers::ResolutionError;
use crate::types::StackName;

/// Why a single stack failed or was skipped.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Hook(#[from] HookFailure),

    #[error("{action} failed: {source}")]
    Action {
        action: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("remote {action} did not complete")]
    RemoteFailed { action: &'static str },

    #[error("stack is busy with another operation")]
    RemoteBusy,

    #[error("drift detection failed: {reason}")]
    DriftDetectionFailed { reason: String },

    #[error("drift detection timed out after {}", as_seconds(*timeout))]
    DriftTimedOut { timeout: Duration },

    #[error("dependency {dependency} did not succeed")]
    DependencyFailed { dependency: StackName },

    #[error("plan was cancelled before the stack started")]
    Cancelled,
}

fn as_seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs_f64())
}

/// A status change the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("stack {stack} cannot move from {from} to {to}")]
    Invalid {
        stack: StackName,
        from: String,
        to: String,
    },

    #[error("stack {0} is not part of this plan")]
    UnknownStack(StackName),
}

/// Harness-level failure that aborts a plan run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PlanError {
    #[snafu(display("no stacks match command path {path:?}"))]
    EmptyScope { path: String },

    #[snafu(display("provisioning API unavailable while handling {stack}: {source}"))]
    ProviderUnavailable {
        stack: StackName,
        source: ProviderError,
    },

    #[snafu(display("stack worker stopped unexpectedly: {source}"))]
    WorkerPanicked { source: tokio::task::JoinError },

    #[snafu(display("invalid status transition: {source}"))]
    InvalidTransition { source: TransitionError },

    #[snafu(display("scheduling failed: {source}"))]
    Scheduling { source: GraphError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanErrorKind {
    /// The command path selected nothing.
    EmptyScope,
    /// The provisioning API could not be reached.
    ProviderUnavailable,
    /// A stack worker panicked or was aborted.
    WorkerPanicked,
    /// Internal status bookkeeping went wrong.
    InvalidTransition,
    /// The scoped graph could not be ordered.
    Scheduling,
}

impl PlanError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> PlanErrorKind {
        match self {
            PlanError::EmptyScope { .. } => PlanErrorKind::EmptyScope,
            PlanError::ProviderUnavailable { .. } => PlanErrorKind::ProviderUnavailable,
            PlanError::WorkerPanicked { .. } => PlanErrorKind::WorkerPanicked,
            PlanError::InvalidTransition { .. } => PlanErrorKind::InvalidTransition,
            PlanError::Scheduling { .. } => PlanErrorKind::Scheduling,
        }
    }
}

impl From<TransitionError> for PlanError {
    fn from(source: TransitionError) -> Self {
        PlanError::InvalidTransition { source }
    }
}
