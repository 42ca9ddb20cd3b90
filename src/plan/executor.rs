// ABOUTME: Drives a plan's generations through a bounded pool of stack workers.
// ABOUTME: Failures skip dependent subtrees; only harness errors abort the run.

use snafu::ResultExt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::error::{self, PlanError, StackError};
use super::record::{DriftStatus, RecordTable, StackOutcome, StackStatus};
use super::report::{PlanReport, StackReport};
use super::{ActionKind, ExecutionContext, Plan, drift};
use crate::diagnostics::{Diagnostics, Warning};
use crate::graph::{Direction, EdgeKind};
use crate::hooks::{HookPoint, HookRunner};
use crate::provider::{
    ActionResponse, ActionStatus, LaunchStep, ProviderError, ResponsePayload, StackRequest,
};
use crate::resolvers::{OutputCache, ResolutionContext, ResolverError};
use crate::stack::Stack;
use crate::types::StackName;

/// Why a worker stopped early.
pub(super) enum Abort {
    /// The stack failed; recorded and isolated to its subtree.
    Stack {
        error: StackError,
        response: Option<ResponsePayload>,
    },
    /// The whole run must stop.
    Fatal(PlanError),
}

impl Abort {
    fn stack(error: impl Into<StackError>) -> Self {
        Abort::Stack {
            error: error.into(),
            response: None,
        }
    }

    /// Classify a provider error from `action` on `stack`.
    pub(super) fn provider(stack: &StackName, action: &'static str, source: ProviderError) -> Self {
        if source.is_unavailable() {
            Abort::Fatal(PlanError::ProviderUnavailable {
                stack: stack.clone(),
                source,
            })
        } else {
            let response = match &source {
                ProviderError::Remote { payload, .. } => payload.clone(),
                ProviderError::Unavailable(_) => None,
            };
            Abort::Stack {
                error: StackError::Action { action, source },
                response,
            }
        }
    }
}

impl From<PlanError> for Abort {
    fn from(err: PlanError) -> Self {
        Abort::Fatal(err)
    }
}

impl Plan {
    /// Run the plan to completion.
    ///
    /// Every in-scope stack gets exactly one entry in the report. Individual
    /// stack failures never surface as `Err`; only harness errors do.
    pub async fn execute(&self, ctx: &ExecutionContext) -> Result<PlanReport, PlanError> {
        let records = Arc::new(RecordTable::new(
            self.scope().iter().cloned(),
            self.action().is_drift(),
        ));
        let outputs = Arc::new(OutputCache::new());
        let mut diagnostics = Diagnostics::default();

        tracing::info!(
            action = %self.action(),
            stacks = self.scope().len(),
            generations = self.batches().len(),
            "Executing plan"
        );

        for (index, generation) in self.batches().iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            tracing::debug!(generation = index, stacks = generation.len(), "Starting generation");

            let mut runnable = Vec::with_capacity(generation.len());
            for name in generation {
                match self.failed_upstream(name, &records) {
                    Some(dependency) => {
                        tracing::info!(
                            stack = %name,
                            dependency = %dependency,
                            "Skipping stack, dependency did not succeed"
                        );
                        records.skip(name, StackError::DependencyFailed { dependency })?;
                    }
                    None => runnable.push(name.clone()),
                }
            }

            self.run_generation(runnable, ctx, &records, &outputs).await?;
        }

        if ctx.is_cancelled() {
            let unstarted = records.pending();
            for name in &unstarted {
                records.skip(name, StackError::Cancelled)?;
            }
            if !unstarted.is_empty() {
                diagnostics.warn(Warning::cancelled(&unstarted));
            }
        }

        Ok(self.report(&records, diagnostics))
    }

    /// First in-scope upstream stack that did not succeed, if any.
    ///
    /// Actions that resolve parameters skip only along explicit edges; a
    /// stack reading a failed stack's outputs attempts resolution and fails
    /// there instead.
    fn failed_upstream(&self, name: &StackName, records: &RecordTable) -> Option<StackName> {
        if self.options().ignore_dependencies {
            return None;
        }
        let graph = self.graph();
        let upstream = match self.action().direction() {
            Direction::Forward => graph.dependencies(name),
            Direction::Reverse => graph.dependents(name),
        };
        upstream.into_iter().find(|other| {
            let kind = match self.action().direction() {
                Direction::Forward => graph.edge_kind(other, name),
                Direction::Reverse => graph.edge_kind(name, other),
            };
            let propagates = !self.action().needs_parameters() || kind == Some(EdgeKind::Explicit);
            propagates
                && matches!(
                    records.status(other),
                    Some(StackStatus::Failed | StackStatus::Skipped)
                )
        })
    }

    async fn run_generation(
        &self,
        runnable: Vec<StackName>,
        ctx: &ExecutionContext,
        records: &Arc<RecordTable>,
        outputs: &Arc<OutputCache>,
    ) -> Result<(), PlanError> {
        let max = ctx.max_concurrency();
        let mut queue = runnable.into_iter();
        let mut join_set = JoinSet::new();

        loop {
            while join_set.len() < max && !ctx.is_cancelled() {
                let Some(name) = queue.next() else { break };
                let Some(stack) = self.graph().stack(&name).cloned() else {
                    continue;
                };

                records.start(&name)?;
                tracing::info!(stack = %name, action = %self.action(), "Starting stack");

                let worker = StackWorker {
                    stack,
                    action: self.action(),
                    ctx: ctx.clone(),
                    records: Arc::clone(records),
                    outputs: Arc::clone(outputs),
                };
                let span = tracing::info_span!("stack", name = %name);
                join_set.spawn(async move { (name, worker.run().await) }.instrument(span));
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (name, result) = joined.context(error::WorkerPanickedSnafu)?;
            let outcome = result?;

            match &outcome {
                StackOutcome::Succeeded { .. } => {
                    tracing::info!(stack = %name, "Stack succeeded");
                }
                StackOutcome::Failed { error, .. } => {
                    tracing::warn!(stack = %name, "Stack failed: {error}");
                }
            }
            records.finish(&name, outcome)?;
        }

        Ok(())
    }

    fn report(&self, records: &RecordTable, mut diagnostics: Diagnostics) -> PlanReport {
        let snapshot = records.snapshot();
        let mut stacks = Vec::with_capacity(snapshot.len());

        for name in self.batches().iter().flatten() {
            let (Some(record), Some(stack)) = (snapshot.get(name), self.graph().stack(name)) else {
                continue;
            };
            if record.status.is_success() && record.drift == Some(DriftStatus::NotChecked) {
                diagnostics.warn(Warning::drift_not_checked(
                    name,
                    "no drift detection result available",
                ));
            }
            stacks.push(StackReport {
                stack: name.clone(),
                path: stack.path(),
                record: record.clone(),
            });
        }

        PlanReport::new(self.action(), stacks, diagnostics)
    }
}

/// Everything one spawned task needs to drive one stack.
pub(super) struct StackWorker {
    pub(super) stack: Arc<Stack>,
    pub(super) action: ActionKind,
    pub(super) ctx: ExecutionContext,
    pub(super) records: Arc<RecordTable>,
    pub(super) outputs: Arc<OutputCache>,
}

impl StackWorker {
    async fn run(self) -> Result<StackOutcome, PlanError> {
        match self.perform().await {
            Ok(response) => Ok(StackOutcome::succeeded(response)),
            Err(Abort::Stack { error, response }) => Ok(StackOutcome::failed(error, response)),
            Err(Abort::Fatal(err)) => {
                tracing::error!(stack = %self.stack.name(), "Aborting plan: {err}");
                Err(err)
            }
        }
    }

    async fn perform(&self) -> Result<Option<ResponsePayload>, Abort> {
        match self.action {
            ActionKind::Create => {
                let request = self.request().await?;
                self.create(&request).await
            }
            ActionKind::Update => {
                let request = self.request().await?;
                self.update(&request).await
            }
            ActionKind::Delete => self.delete().await,
            ActionKind::Launch => self.launch().await,
            ActionKind::DriftDetect => drift::detect(self).await,
            ActionKind::DriftShow => drift::show(self).await,
        }
    }

    pub(super) fn name(&self) -> &StackName {
        self.stack.name()
    }

    /// Resolve parameters now, so cross-stack reads see this run's results.
    async fn request(&self) -> Result<StackRequest, Abort> {
        let resolution = ResolutionContext::new(
            &self.stack,
            &self.records,
            self.ctx.provider(),
            &self.outputs,
            self.ctx.project_dir(),
        );
        let parameters = self
            .ctx
            .resolvers()
            .resolve_parameters(&resolution)
            .await
            .map_err(|err| match &err.source {
                ResolverError::Provider(source) if source.is_unavailable() => {
                    Abort::provider(self.name(), "resolve", source.clone())
                }
                _ => Abort::stack(err),
            })?;

        Ok(StackRequest {
            name: self.name().clone(),
            group: self.stack.group().to_string(),
            parameters,
        })
    }

    async fn hooks(&self, point: HookPoint, action: &'static str) -> Result<(), Abort> {
        HookRunner::new(self.ctx.hooks(), self.ctx.project_dir())
            .run(point, &self.stack, action)
            .await
            .map_err(Abort::stack)
    }

    fn settle(
        action: &'static str,
        response: ActionResponse,
    ) -> Result<Option<ResponsePayload>, Abort> {
        match response.status {
            ActionStatus::Complete => Ok(Some(response.payload)),
            ActionStatus::Failed => Err(Abort::Stack {
                error: StackError::RemoteFailed { action },
                response: Some(response.payload),
            }),
        }
    }

    async fn create(&self, request: &StackRequest) -> Result<Option<ResponsePayload>, Abort> {
        self.hooks(HookPoint::BeforeCreate, "create").await?;
        let response = self
            .ctx
            .provider()
            .create(request)
            .await
            .map_err(|e| Abort::provider(self.name(), "create", e))?;
        let payload = Self::settle("create", response)?;
        self.hooks(HookPoint::AfterCreate, "create").await?;
        Ok(payload)
    }

    async fn update(&self, request: &StackRequest) -> Result<Option<ResponsePayload>, Abort> {
        self.hooks(HookPoint::BeforeUpdate, "update").await?;
        let response = self
            .ctx
            .provider()
            .update(request)
            .await
            .map_err(|e| Abort::provider(self.name(), "update", e))?;
        let payload = Self::settle("update", response)?;
        self.hooks(HookPoint::AfterUpdate, "update").await?;
        Ok(payload)
    }

    async fn delete(&self) -> Result<Option<ResponsePayload>, Abort> {
        self.hooks(HookPoint::BeforeDelete, "delete").await?;
        let response = self
            .ctx
            .provider()
            .delete(self.name())
            .await
            .map_err(|e| Abort::provider(self.name(), "delete", e))?;
        let payload = Self::settle("delete", response)?;
        self.hooks(HookPoint::AfterDelete, "delete").await?;
        Ok(payload)
    }

    async fn launch(&self) -> Result<Option<ResponsePayload>, Abort> {
        let request = self.request().await?;
        self.hooks(HookPoint::BeforeLaunch, "launch").await?;

        let step = self
            .ctx
            .provider()
            .launch_step(self.name())
            .await
            .map_err(|e| Abort::provider(self.name(), "launch", e))?;
        tracing::debug!(stack = %self.name(), ?step, "Launch step chosen");

        let payload = match step {
            LaunchStep::Create => self.create(&request).await?,
            LaunchStep::Update => self.update(&request).await?,
            LaunchStep::Recreate => {
                self.delete().await?;
                self.create(&request).await?
            }
            LaunchStep::Busy => return Err(Abort::stack(StackError::RemoteBusy)),
        };

        self.hooks(HookPoint::AfterLaunch, "launch").await?;
        Ok(payload)
    }
}
