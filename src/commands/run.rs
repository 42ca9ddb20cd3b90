// ABOUTME: Runs one action over a command path through the plan executor.
// ABOUTME: Ctrl-C stops new stacks from starting; in-flight stacks finish.

use stackplan::error::{Error, Result};
use stackplan::output::Output;
use stackplan::plan::{ActionKind, ExecutionContext, Plan, PlanOptions};
use stackplan::provider::CommandProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::Project;

/// Run `action` and return the number of failed stacks.
pub async fn run_action(
    project: &Project,
    action: ActionKind,
    options: PlanOptions,
    max_concurrency: Option<usize>,
    mut output: Output,
) -> Result<usize> {
    let provisioner = project
        .config
        .provisioner
        .as_ref()
        .ok_or(Error::NoProvisioner)?;
    let working_dir = match &provisioner.working_dir {
        Some(dir) => project.dir.join(dir),
        None => project.dir.clone(),
    };
    let provider = CommandProvider::new(provisioner.command.clone(), &working_dir);

    let mut settings = project.config.settings.execution_settings();
    if let Some(max) = max_concurrency {
        settings.max_concurrency = max;
    }

    let plan = Plan::new(Arc::clone(&project.graph), action, options)?;

    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(Arc::new(provider), &project.dir)
        .with_resolvers(Arc::clone(&project.resolvers))
        .with_settings(settings)
        .with_cancellation(cancellation.clone());

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, waiting for running stacks to finish");
            cancellation.cancel();
        }
    });

    output.start_timer();
    output.progress(&format!(
        "{} {} stack(s) in {} generation(s)",
        action,
        plan.scope().len(),
        plan.batches().len()
    ));

    let result = plan.execute(&ctx).await;
    watcher.abort();

    let report = result?;
    output.report(&report);
    Ok(report.failure_count())
}
