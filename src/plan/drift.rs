// ABOUTME: Drift detection for one stack: start a detection and poll it, or read the last one.
// ABOUTME: Polling is bounded by a local budget; running out is TimedOut, not DetectionFailed.

use tokio::time::{Instant, sleep};

use super::error::StackError;
use super::executor::{Abort, StackWorker};
use super::record::DriftStatus;
use crate::provider::{DriftDetectionStatus, ProviderError, ResponsePayload, StackDrift};

type DriftResult = Result<Option<ResponsePayload>, Abort>;

/// Start a detection run and poll until it settles or the budget runs out.
pub(super) async fn detect(worker: &StackWorker) -> DriftResult {
    let name = worker.name();
    let provider = worker.ctx.provider();

    let state = provider
        .remote_state(name)
        .await
        .map_err(|e| Abort::provider(name, "drift detect", e))?;
    if state.is_none() {
        tracing::info!(stack = %name, "Stack does not exist, drift not checked");
        return Ok(None);
    }

    mark(worker, DriftStatus::Detecting)?;

    let detection = match provider.detect_drift(name).await {
        Ok(id) => id,
        Err(err) => return detection_error(worker, err),
    };

    let settings = worker.ctx.settings();
    let deadline = Instant::now() + settings.drift_timeout;

    loop {
        let status = match provider.drift_detection_status(name, &detection).await {
            Ok(status) => status,
            Err(err) => return detection_error(worker, err),
        };

        match status {
            DriftDetectionStatus::InProgress => {
                let now = Instant::now();
                if now >= deadline {
                    mark(worker, DriftStatus::TimedOut)?;
                    return Err(Abort::Stack {
                        error: StackError::DriftTimedOut {
                            timeout: settings.drift_timeout,
                        },
                        response: None,
                    });
                }
                tracing::debug!(stack = %name, detection = %detection.as_str(), "Drift detection in progress");
                sleep(settings.drift_poll_interval.min(deadline - now)).await;
            }
            settled => return settle(worker, settled),
        }
    }
}

/// Report the last detection without starting a new one.
pub(super) async fn show(worker: &StackWorker) -> DriftResult {
    let name = worker.name();
    let last = match worker.ctx.provider().last_drift_detection(name).await {
        Ok(last) => last,
        Err(err) => return detection_error(worker, err),
    };

    match last {
        None | Some(DriftDetectionStatus::InProgress) => {
            tracing::info!(stack = %name, "No completed drift detection to show");
            Ok(None)
        }
        Some(settled) => settle(worker, settled),
    }
}

fn settle(worker: &StackWorker, status: DriftDetectionStatus) -> DriftResult {
    match status {
        DriftDetectionStatus::Complete { drift, payload } => {
            let next = match drift {
                StackDrift::InSync => DriftStatus::InSync,
                StackDrift::Drifted => DriftStatus::Drifted,
            };
            mark(worker, next)?;
            Ok(Some(payload))
        }
        DriftDetectionStatus::Failed { reason } => failed(worker, reason, None),
        DriftDetectionStatus::InProgress => Ok(None),
    }
}

/// Remote errors end the detection; an unreachable API ends the run.
fn detection_error(worker: &StackWorker, err: ProviderError) -> DriftResult {
    match err {
        ProviderError::Remote { message, payload } => failed(worker, message, payload),
        unavailable => Err(Abort::provider(worker.name(), "drift detect", unavailable)),
    }
}

fn failed(worker: &StackWorker, reason: String, response: Option<ResponsePayload>) -> DriftResult {
    mark(worker, DriftStatus::DetectionFailed)?;
    Err(Abort::Stack {
        error: StackError::DriftDetectionFailed { reason },
        response,
    })
}

fn mark(worker: &StackWorker, status: DriftStatus) -> Result<(), Abort> {
    worker
        .records
        .set_drift(worker.name(), status)
        .map_err(|e| Abort::Fatal(e.into()))
}
