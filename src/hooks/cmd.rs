// ABOUTME: The `cmd` hook: runs a shell command in the project directory.
// ABOUTME: Stack details reach the command through STACKPLAN_* environment variables.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{Hook, HookContext, HookError};

/// Runs its arguments, joined with spaces, through `sh -c`.
pub struct CmdHook;

#[async_trait]
impl Hook for CmdHook {
    fn kind(&self) -> &'static str {
        "cmd"
    }

    async fn run(&self, args: &[String], context: &HookContext) -> Result<(), HookError> {
        if args.is_empty() {
            return Err(HookError::InvalidArguments(
                "cmd hook needs a command".to_string(),
            ));
        }
        let script = args.join(" ");

        tracing::info!("Running {} hook: {}", context.point, script);

        let output = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .current_dir(&context.project_dir)
            .envs(context.to_env())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!("{} hook output: {}", context.point, stdout.trim());
        }

        if output.status.success() {
            tracing::info!("{} hook completed successfully", context.point);
            Ok(())
        } else {
            tracing::warn!(
                "{} hook failed with exit code {:?}",
                context.point,
                output.status.code()
            );
            Err(HookError::CommandFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
