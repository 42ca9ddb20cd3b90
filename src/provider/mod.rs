// ABOUTME: Boundary to the remote provisioning API.
// ABOUTME: One async method per remote operation; implementations live outside the core.

mod command;
mod types;

pub use command::CommandProvider;
pub use types::{
    ActionResponse, ActionStatus, DriftDetectionStatus, LaunchStep, ProviderError, RemoteState,
    ResponsePayload, StackDrift, StackRequest,
};

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::types::{DetectionId, StackName};

/// Remote provisioning operations the plan executor drives.
///
/// Every call is a suspension point; the executor treats them as blocking
/// I/O and never holds shared locks across them.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Create a stack that does not exist yet.
    async fn create(&self, request: &StackRequest) -> Result<ActionResponse, ProviderError>;

    /// Update an existing stack in place.
    async fn update(&self, request: &StackRequest) -> Result<ActionResponse, ProviderError>;

    /// Delete a stack.
    async fn delete(&self, stack: &StackName) -> Result<ActionResponse, ProviderError>;

    /// Current remote state, or `None` when the stack does not exist.
    async fn remote_state(&self, stack: &StackName) -> Result<Option<RemoteState>, ProviderError>;

    /// Output values of a deployed stack. Takes a plain name so that stacks
    /// outside the project can be queried too.
    async fn outputs(&self, stack: &str) -> Result<BTreeMap<String, String>, ProviderError>;

    /// Start a drift detection run.
    async fn detect_drift(&self, stack: &StackName) -> Result<DetectionId, ProviderError>;

    /// Poll a drift detection run started by [`ProvisioningApi::detect_drift`].
    async fn drift_detection_status(
        &self,
        stack: &StackName,
        detection: &DetectionId,
    ) -> Result<DriftDetectionStatus, ProviderError>;

    /// Result of the most recent drift detection, without starting a new one.
    async fn last_drift_detection(
        &self,
        stack: &StackName,
    ) -> Result<Option<DriftDetectionStatus>, ProviderError>;

    /// Decide between create and update from the stack's live state.
    async fn launch_step(&self, stack: &StackName) -> Result<LaunchStep, ProviderError> {
        let state = self.remote_state(stack).await?;
        Ok(LaunchStep::for_state(state))
    }
}
