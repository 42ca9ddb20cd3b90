// ABOUTME: Per-stack execution records and the status state machines they follow.
// ABOUTME: The record table enforces legal transitions and serves reads to resolvers.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::error::{StackError, TransitionError};
use crate::provider::ResponsePayload;
use crate::types::StackName;

/// Lifecycle of one stack within one plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Never attempted because a dependency failed or the run was cancelled.
    Skipped,
}

impl StackStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StackStatus::Succeeded | StackStatus::Failed | StackStatus::Skipped
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StackStatus::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Pending => "pending",
            StackStatus::Running => "running",
            StackStatus::Succeeded => "succeeded",
            StackStatus::Failed => "failed",
            StackStatus::Skipped => "skipped",
        }
    }

    fn can_become(self, next: StackStatus) -> bool {
        matches!(
            (self, next),
            (StackStatus::Pending, StackStatus::Running)
                | (StackStatus::Pending, StackStatus::Skipped)
                | (StackStatus::Running, StackStatus::Succeeded)
                | (StackStatus::Running, StackStatus::Failed)
        )
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a drift check for one stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    NotChecked,
    Detecting,
    InSync,
    Drifted,
    /// The API reported the detection as failed.
    DetectionFailed,
    /// Local polling budget ran out.
    TimedOut,
}

impl DriftStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DriftStatus::NotChecked | DriftStatus::Detecting)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DriftStatus::DetectionFailed | DriftStatus::TimedOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriftStatus::NotChecked => "not_checked",
            DriftStatus::Detecting => "detecting",
            DriftStatus::InSync => "in_sync",
            DriftStatus::Drifted => "drifted",
            DriftStatus::DetectionFailed => "detection_failed",
            DriftStatus::TimedOut => "timed_out",
        }
    }

    // Reading the last detection may settle a status without polling, so
    // everything except a timeout is reachable straight from NotChecked.
    fn can_become(self, next: DriftStatus) -> bool {
        match self {
            DriftStatus::NotChecked => !matches!(next, DriftStatus::NotChecked | DriftStatus::TimedOut),
            DriftStatus::Detecting => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a worker finished a stack it started.
#[derive(Debug)]
pub enum StackOutcome {
    Succeeded {
        response: Option<ResponsePayload>,
    },
    Failed {
        error: StackError,
        response: Option<ResponsePayload>,
    },
}

impl StackOutcome {
    pub fn succeeded(response: Option<ResponsePayload>) -> Self {
        StackOutcome::Succeeded { response }
    }

    pub fn failed(error: StackError, response: Option<ResponsePayload>) -> Self {
        StackOutcome::Failed { error, response }
    }
}

/// Mutable per-run state of one stack.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub status: StackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponsePayload>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Arc<StackError>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

fn serialize_error<S>(error: &Option<Arc<StackError>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(error) => serializer.serialize_str(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ExecutionRecord {
    fn pending(track_drift: bool) -> Self {
        Self {
            status: StackStatus::Pending,
            drift: track_drift.then_some(DriftStatus::NotChecked),
            response: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Counts against the plan: Failed, DetectionFailed or TimedOut.
    pub fn is_failure(&self) -> bool {
        self.status == StackStatus::Failed || self.drift.is_some_and(|d| d.is_failure())
    }

    /// Succeeded, and in sync when drift was checked.
    pub fn is_clean(&self) -> bool {
        self.status.is_success() && self.drift.is_none_or(|d| d == DriftStatus::InSync)
    }
}

/// Records for every stack in a plan's scope.
///
/// A worker owns its stack's record from `start` to `finish`; everyone else
/// only reads. The lock is never held across an await.
#[derive(Debug)]
pub struct RecordTable {
    records: RwLock<BTreeMap<StackName, ExecutionRecord>>,
}

impl RecordTable {
    pub fn new<I>(scope: I, track_drift: bool) -> Self
    where
        I: IntoIterator<Item = StackName>,
    {
        let records = scope
            .into_iter()
            .map(|name| (name, ExecutionRecord::pending(track_drift)))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Current status, or `None` for stacks outside the plan.
    pub fn status(&self, stack: &StackName) -> Option<StackStatus> {
        self.records.read().get(stack).map(|r| r.status)
    }

    pub fn drift(&self, stack: &StackName) -> Option<DriftStatus> {
        self.records.read().get(stack).and_then(|r| r.drift)
    }

    pub fn get(&self, stack: &StackName) -> Option<ExecutionRecord> {
        self.records.read().get(stack).cloned()
    }

    /// Names of stacks still waiting to start.
    pub fn pending(&self) -> Vec<StackName> {
        self.records
            .read()
            .iter()
            .filter(|(_, r)| r.status == StackStatus::Pending)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn start(&self, stack: &StackName) -> Result<(), TransitionError> {
        self.update(stack, StackStatus::Running, |record| {
            record.started_at = Some(Utc::now());
        })
    }

    pub fn finish(&self, stack: &StackName, outcome: StackOutcome) -> Result<(), TransitionError> {
        let (status, response, error) = match outcome {
            StackOutcome::Succeeded { response } => (StackStatus::Succeeded, response, None),
            StackOutcome::Failed { error, response } => {
                (StackStatus::Failed, response, Some(Arc::new(error)))
            }
        };
        self.update(stack, status, |record| {
            record.response = response;
            record.error = error;
            record.finished_at = Some(Utc::now());
        })
    }

    pub fn skip(&self, stack: &StackName, reason: StackError) -> Result<(), TransitionError> {
        self.update(stack, StackStatus::Skipped, |record| {
            record.error = Some(Arc::new(reason));
            record.finished_at = Some(Utc::now());
        })
    }

    pub fn set_drift(&self, stack: &StackName, next: DriftStatus) -> Result<(), TransitionError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(stack)
            .ok_or_else(|| TransitionError::UnknownStack(stack.clone()))?;
        let current = record.drift.unwrap_or(DriftStatus::NotChecked);
        if !current.can_become(next) {
            return Err(TransitionError::Invalid {
                stack: stack.clone(),
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        record.drift = Some(next);
        Ok(())
    }

    fn update(
        &self,
        stack: &StackName,
        next: StackStatus,
        apply: impl FnOnce(&mut ExecutionRecord),
    ) -> Result<(), TransitionError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(stack)
            .ok_or_else(|| TransitionError::UnknownStack(stack.clone()))?;
        if !record.status.can_become(next) {
            return Err(TransitionError::Invalid {
                stack: stack.clone(),
                from: record.status.to_string(),
                to: next.to_string(),
            });
        }
        record.status = next;
        apply(record);
        Ok(())
    }

    pub fn snapshot(&self) -> BTreeMap<StackName, ExecutionRecord> {
        self.records.read().clone()
    }
}
