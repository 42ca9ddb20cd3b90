// ABOUTME: Plan-wide outcome: one entry per in-scope stack plus collected diagnostics.
// ABOUTME: The failure count doubles as the process exit status.

use serde::Serialize;

use super::ActionKind;
use super::record::ExecutionRecord;
use crate::diagnostics::Diagnostics;
use crate::types::StackName;

/// Final record of one stack.
#[derive(Debug, Clone, Serialize)]
pub struct StackReport {
    pub stack: StackName,
    pub path: String,
    #[serde(flatten)]
    pub record: ExecutionRecord,
}

/// Result of a plan run that reached the end without a harness error.
#[derive(Debug, Clone)]
pub struct PlanReport {
    action: ActionKind,
    stacks: Vec<StackReport>,
    diagnostics: Diagnostics,
}

impl PlanReport {
    pub(crate) fn new(action: ActionKind, stacks: Vec<StackReport>, diagnostics: Diagnostics) -> Self {
        Self {
            action,
            stacks,
            diagnostics,
        }
    }

    pub fn action(&self) -> ActionKind {
        self.action
    }

    /// Entries in execution order.
    pub fn stacks(&self) -> &[StackReport] {
        &self.stacks
    }

    pub fn get(&self, stack: &str) -> Option<&ExecutionRecord> {
        self.stacks
            .iter()
            .find(|s| s.stack.as_str() == stack)
            .map(|s| &s.record)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Stacks that ended Failed, DetectionFailed or TimedOut.
    pub fn failure_count(&self) -> usize {
        self.stacks.iter().filter(|s| s.record.is_failure()).count()
    }

    /// Every stack reached a success-equivalent state.
    pub fn is_clean(&self) -> bool {
        self.stacks.iter().all(|s| s.record.is_clean())
    }

    /// Failure count, saturated to fit an exit status.
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.failure_count()).unwrap_or(u8::MAX)
    }
}
