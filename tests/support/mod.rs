// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup and an in-memory provisioning API fake.

use async_trait::async_trait;
use parking_lot::Mutex;
use stackplan::provider::{
    ActionResponse, DriftDetectionStatus, ProviderError, ProvisioningApi, RemoteState,
    StackRequest,
};
use stackplan::graph::StackGraph;
use stackplan::resolvers::ResolverRegistry;
use stackplan::stack::Stack;
use stackplan::types::{DetectionId, StackName};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("stackplan=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn name(s: &str) -> StackName {
    StackName::new(s).unwrap()
}

/// Build a graph from stacks, panicking on construction errors.
#[allow(dead_code)]
pub fn graph(stacks: Vec<Stack>) -> Arc<StackGraph> {
    Arc::new(StackGraph::build(stacks, &ResolverRegistry::default()).unwrap())
}

/// One observed call boundary, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(&'static str, String),
    End(&'static str, String),
}

#[derive(Default)]
struct FakeState {
    remote: HashMap<String, RemoteState>,
    outputs: HashMap<String, BTreeMap<String, String>>,
    failures: HashMap<(&'static str, String), ProviderError>,
    rejected: HashSet<(&'static str, String)>,
    delays: HashMap<String, Duration>,
    drift_polls: HashMap<String, VecDeque<DriftDetectionStatus>>,
    last_drift: HashMap<String, DriftDetectionStatus>,
    requests: HashMap<String, StackRequest>,
    events: Vec<Event>,
}

/// In-memory provisioning API with scripted failures and call recording.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(self, stack: &str, state: RemoteState) -> Self {
        self.state.lock().remote.insert(stack.to_string(), state);
        self
    }

    pub fn with_outputs(self, stack: &str, outputs: &[(&str, &str)]) -> Self {
        let outputs = outputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state.lock().outputs.insert(stack.to_string(), outputs);
        self
    }

    /// Make `operation` on `stack` return a remote error.
    pub fn failing(self, operation: &'static str, stack: &str) -> Self {
        let err = ProviderError::remote(format!("{operation} rejected for {stack}"));
        self.state
            .lock()
            .failures
            .insert((operation, stack.to_string()), err);
        self
    }

    /// Make `operation` on `stack` fail as if the API were unreachable.
    pub fn unreachable(self, operation: &'static str, stack: &str) -> Self {
        let err = ProviderError::Unavailable("connection refused".to_string());
        self.state
            .lock()
            .failures
            .insert((operation, stack.to_string()), err);
        self
    }

    /// Make `operation` on `stack` answer with a failed action status.
    pub fn rejecting(self, operation: &'static str, stack: &str) -> Self {
        self.state
            .lock()
            .rejected
            .insert((operation, stack.to_string()));
        self
    }

    pub fn with_delay(self, stack: &str, delay: Duration) -> Self {
        self.state.lock().delays.insert(stack.to_string(), delay);
        self
    }

    /// Statuses returned by successive polls; the last one repeats.
    pub fn with_drift_polls(self, stack: &str, polls: Vec<DriftDetectionStatus>) -> Self {
        self.state
            .lock()
            .drift_polls
            .insert(stack.to_string(), polls.into());
        self
    }

    pub fn with_last_drift(self, stack: &str, status: DriftDetectionStatus) -> Self {
        self.state
            .lock()
            .last_drift
            .insert(stack.to_string(), status);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    /// Stacks `operation` was started on, in order.
    pub fn started(&self, operation: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start(op, stack) if op == operation => Some(stack),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn request(&self, stack: &str) -> Option<StackRequest> {
        self.state.lock().requests.get(stack).cloned()
    }

    pub fn remote_state_of(&self, stack: &str) -> Option<RemoteState> {
        self.state.lock().remote.get(stack).copied()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        stack: &str,
        respond: impl FnOnce(&mut FakeState) -> T,
    ) -> Result<T, ProviderError> {
        let delay = {
            let mut state = self.state.lock();
            state.events.push(Event::Start(operation, stack.to_string()));
            state.delays.get(stack).copied()
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        state.events.push(Event::End(operation, stack.to_string()));
        if let Some(err) = state.failures.get(&(operation, stack.to_string())) {
            return Err(err.clone());
        }
        Ok(respond(&mut state))
    }

    fn action_response(state: &FakeState, operation: &'static str, stack: &str) -> ActionResponse {
        let payload = serde_json::json!({ "operation": operation, "stack": stack });
        if state.rejected.contains(&(operation, stack.to_string())) {
            ActionResponse::failed(payload)
        } else {
            ActionResponse::complete(payload)
        }
    }
}

#[async_trait]
impl ProvisioningApi for FakeProvider {
    async fn create(&self, request: &StackRequest) -> Result<ActionResponse, ProviderError> {
        let stack = request.name.to_string();
        self.call("create", &stack, |state| {
            state.requests.insert(stack.clone(), request.clone());
            state.remote.insert(stack.clone(), RemoteState::Complete);
            Self::action_response(state, "create", &stack)
        })
        .await
    }

    async fn update(&self, request: &StackRequest) -> Result<ActionResponse, ProviderError> {
        let stack = request.name.to_string();
        self.call("update", &stack, |state| {
            state.requests.insert(stack.clone(), request.clone());
            Self::action_response(state, "update", &stack)
        })
        .await
    }

    async fn delete(&self, stack: &StackName) -> Result<ActionResponse, ProviderError> {
        let stack = stack.to_string();
        self.call("delete", &stack, |state| {
            state.remote.remove(&stack);
            Self::action_response(state, "delete", &stack)
        })
        .await
    }

    async fn remote_state(&self, stack: &StackName) -> Result<Option<RemoteState>, ProviderError> {
        self.call("status", stack.as_str(), |state| {
            state.remote.get(stack.as_str()).copied()
        })
        .await
    }

    async fn outputs(&self, stack: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        self.call("outputs", stack, |state| {
            state.outputs.get(stack).cloned().unwrap_or_default()
        })
        .await
    }

    async fn detect_drift(&self, stack: &StackName) -> Result<DetectionId, ProviderError> {
        self.call("detect-drift", stack.as_str(), |_| {
            DetectionId::new(format!("detection-{stack}"))
        })
        .await
    }

    async fn drift_detection_status(
        &self,
        stack: &StackName,
        _detection: &DetectionId,
    ) -> Result<DriftDetectionStatus, ProviderError> {
        self.call("drift-status", stack.as_str(), |state| {
            let polls = state.drift_polls.entry(stack.to_string()).or_default();
            if polls.len() > 1 {
                polls.pop_front().unwrap_or(DriftDetectionStatus::InProgress)
            } else {
                polls
                    .front()
                    .cloned()
                    .unwrap_or(DriftDetectionStatus::InProgress)
            }
        })
        .await
    }

    async fn last_drift_detection(
        &self,
        stack: &StackName,
    ) -> Result<Option<DriftDetectionStatus>, ProviderError> {
        self.call("last-drift", stack.as_str(), |state| {
            state.last_drift.get(stack.as_str()).cloned()
        })
        .await
    }
}
