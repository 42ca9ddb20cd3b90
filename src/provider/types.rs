// ABOUTME: Request and response types exchanged with the provisioning API.
// ABOUTME: Response payloads are opaque to the core and carried through untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::StackName;

/// A stack with its parameters already resolved, ready to hand to the API.
#[derive(Debug, Clone, Serialize)]
pub struct StackRequest {
    pub name: StackName,
    pub group: String,
    pub parameters: BTreeMap<String, String>,
}

/// Opaque remote response. The core never inspects its contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponsePayload(pub serde_json::Value);

impl ResponsePayload {
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

impl From<serde_json::Value> for ResponsePayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Terminal result the API reports for a create, update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ActionStatus,
    #[serde(default)]
    pub payload: ResponsePayload,
}

impl ActionResponse {
    pub fn complete(payload: impl Into<ResponsePayload>) -> Self {
        Self {
            status: ActionStatus::Complete,
            payload: payload.into(),
        }
    }

    pub fn failed(payload: impl Into<ResponsePayload>) -> Self {
        Self {
            status: ActionStatus::Failed,
            payload: payload.into(),
        }
    }
}

/// Live state of a stack as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    /// Deployed and stable.
    Complete,
    /// A previous create failed and left the stack unusable.
    Failed,
    /// Another operation is running against the stack.
    InProgress,
}

/// What `launch` has to do for a stack, decided from its remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStep {
    Create,
    Update,
    /// Delete the failed remains, then create.
    Recreate,
    /// The stack is busy; launching now would race another operation.
    Busy,
}

impl LaunchStep {
    pub fn for_state(state: Option<RemoteState>) -> Self {
        match state {
            None => LaunchStep::Create,
            Some(RemoteState::Complete) => LaunchStep::Update,
            Some(RemoteState::Failed) => LaunchStep::Recreate,
            Some(RemoteState::InProgress) => LaunchStep::Busy,
        }
    }
}

/// Whether a completed drift detection found differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackDrift {
    InSync,
    Drifted,
}

/// Status of a drift detection run, as polled from the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriftDetectionStatus {
    InProgress,
    Complete {
        drift: StackDrift,
        #[serde(default)]
        payload: ResponsePayload,
    },
    Failed {
        reason: String,
    },
}

/// Errors from the provisioning API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The API answered with an error for this stack.
    #[error("provisioning API error: {message}")]
    Remote {
        message: String,
        payload: Option<ResponsePayload>,
    },

    /// The API could not be reached at all.
    #[error("provisioning API unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn remote(message: impl Into<String>) -> Self {
        ProviderError::Remote {
            message: message.into(),
            payload: None,
        }
    }

    /// Unavailability is fatal to a whole plan; remote errors are per stack.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}
