// ABOUTME: Explicit runtime context handed to a plan run.
// ABOUTME: Carries the provider, registries, settings and cancellation token; no global state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::hooks::HookRegistry;
use crate::provider::ProvisioningApi;
use crate::resolvers::ResolverRegistry;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_DRIFT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_DRIFT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Tunables for one plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Upper bound on stacks running at once within a generation.
    pub max_concurrency: usize,
    /// Polling budget for one stack's drift detection.
    pub drift_timeout: Duration,
    pub drift_poll_interval: Duration,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            drift_timeout: DEFAULT_DRIFT_TIMEOUT,
            drift_poll_interval: DEFAULT_DRIFT_POLL_INTERVAL,
        }
    }
}

/// Collaborators and settings for executing a plan.
///
/// Cheap to clone; every stack worker gets its own copy.
#[derive(Clone)]
pub struct ExecutionContext {
    provider: Arc<dyn ProvisioningApi>,
    resolvers: Arc<ResolverRegistry>,
    hooks: Arc<HookRegistry>,
    settings: ExecutionSettings,
    project_dir: PathBuf,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(provider: Arc<dyn ProvisioningApi>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            resolvers: Arc::new(ResolverRegistry::default()),
            hooks: Arc::new(HookRegistry::default()),
            settings: ExecutionSettings::default(),
            project_dir: project_dir.into(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_resolvers(mut self, resolvers: Arc<ResolverRegistry>) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn provider(&self) -> &dyn ProvisioningApi {
        self.provider.as_ref()
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Worker limit, never below one.
    pub fn max_concurrency(&self) -> usize {
        self.settings.max_concurrency.max(1)
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Token that stops the run from starting new stacks once cancelled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("resolvers", &self.resolvers)
            .field("hooks", &self.hooks)
            .field("settings", &self.settings)
            .field("project_dir", &self.project_dir)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
