// ABOUTME: Provisioning adapter that delegates each operation to an external program.
// ABOUTME: Sends a JSON request on stdin and parses a JSON reply from stdout.

use async_trait::async_trait;
use nonempty::NonEmpty;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    ActionResponse, DriftDetectionStatus, ProviderError, ProvisioningApi, RemoteState,
    StackRequest,
};
use crate::types::{DetectionId, StackName};

/// Runs `<program> [args..] <operation> <stack>` for every remote call.
///
/// Exit status zero means the reply on stdout is valid JSON for the
/// operation. A non-zero exit is a remote error for that stack, carrying
/// stderr. Failing to spawn the program at all means the API is unavailable.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    command: NonEmpty<String>,
    working_dir: PathBuf,
}

#[derive(Deserialize)]
struct StateReply {
    state: Option<RemoteState>,
}

#[derive(Deserialize)]
struct OutputsReply {
    #[serde(default)]
    outputs: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct DetectReply {
    detection_id: DetectionId,
}

#[derive(Deserialize)]
struct LastDriftReply {
    detection: Option<DriftDetectionStatus>,
}

impl CommandProvider {
    pub fn new(command: NonEmpty<String>, working_dir: &Path) -> Self {
        Self {
            command,
            working_dir: working_dir.to_path_buf(),
        }
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        operation: &str,
        stack: &str,
        request: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let body = serde_json::to_vec(&request)
            .map_err(|e| ProviderError::remote(format!("failed to encode request: {e}")))?;

        tracing::debug!(
            program = %self.command.head,
            operation,
            stack,
            "Invoking provisioner"
        );

        let mut child = Command::new(&self.command.head)
            .args(&self.command.tail)
            .arg(operation)
            .arg(stack)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::Unavailable(format!(
                    "failed to start provisioner '{}': {}",
                    self.command.head, e
                ))
            })?;

        // Stdin is written while stdout drains so a large request cannot
        // block against a full pipe.
        let stdin = child.stdin.take();
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&body).await {
                // The program may answer without reading its request.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        let output = output.map_err(|e| {
            ProviderError::Unavailable(format!("failed to wait for provisioner: {e}"))
        })?;
        if let Err(e) = written {
            tracing::debug!(operation, stack, "Provisioner request not fully written: {e}");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let payload = serde_json::from_slice::<serde_json::Value>(&output.stdout)
                .ok()
                .map(Into::into);
            return Err(ProviderError::Remote {
                message: if stderr.is_empty() {
                    format!("{operation} exited with {}", output.status)
                } else {
                    stderr
                },
                payload,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ProviderError::remote(format!("invalid {operation} reply from provisioner: {e}"))
        })
    }
}

#[async_trait]
impl ProvisioningApi for CommandProvider {
    async fn create(&self, request: &StackRequest) -> Result<ActionResponse, ProviderError> {
        self.invoke("create", request.name.as_str(), encode(request)?)
            .await
    }

    async fn update(&self, request: &StackRequest) -> Result<ActionResponse, ProviderError> {
        self.invoke("update", request.name.as_str(), encode(request)?)
            .await
    }

    async fn delete(&self, stack: &StackName) -> Result<ActionResponse, ProviderError> {
        self.invoke("delete", stack.as_str(), serde_json::json!({ "name": stack }))
            .await
    }

    async fn remote_state(&self, stack: &StackName) -> Result<Option<RemoteState>, ProviderError> {
        let reply: StateReply = self
            .invoke("status", stack.as_str(), serde_json::json!({ "name": stack }))
            .await?;
        Ok(reply.state)
    }

    async fn outputs(&self, stack: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        let reply: OutputsReply = self
            .invoke("outputs", stack, serde_json::json!({ "name": stack }))
            .await?;
        Ok(reply.outputs)
    }

    async fn detect_drift(&self, stack: &StackName) -> Result<DetectionId, ProviderError> {
        let reply: DetectReply = self
            .invoke("detect-drift", stack.as_str(), serde_json::json!({ "name": stack }))
            .await?;
        Ok(reply.detection_id)
    }

    async fn drift_detection_status(
        &self,
        stack: &StackName,
        detection: &DetectionId,
    ) -> Result<DriftDetectionStatus, ProviderError> {
        self.invoke(
            "drift-status",
            stack.as_str(),
            serde_json::json!({ "name": stack, "detection_id": detection }),
        )
        .await
    }

    async fn last_drift_detection(
        &self,
        stack: &StackName,
    ) -> Result<Option<DriftDetectionStatus>, ProviderError> {
        let reply: LastDriftReply = self
            .invoke("last-drift", stack.as_str(), serde_json::json!({ "name": stack }))
            .await?;
        Ok(reply.detection)
    }
}

fn encode(request: &StackRequest) -> Result<serde_json::Value, ProviderError> {
    serde_json::to_value(request)
        .map_err(|e| ProviderError::remote(format!("failed to encode request: {e}")))
}
