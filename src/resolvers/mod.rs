// ABOUTME: Pluggable resolvers that turn deferred parameter expressions into values.
// ABOUTME: Registered by kind tag; consulted at graph-build time for implicit dependencies.

mod environment;
mod file_contents;
mod join;
mod stack_output;

pub use environment::EnvironmentVariableResolver;
pub use file_contents::FileContentsResolver;
pub use join::JoinResolver;
pub use stack_output::{StackOutputExternalResolver, StackOutputResolver};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::plan::{RecordTable, StackStatus};
use crate::provider::{ProviderError, ProvisioningApi};
use crate::stack::{ParamValue, ResolverExpr, Stack};
use crate::types::StackName;

/// A provider of deferred parameter values.
///
/// Implementations must be idempotent and only read state.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Tag used in configuration (`resolver: <kind>`).
    fn kind(&self) -> &'static str;

    /// Stack this expression reads from, if any. Called once at graph-build
    /// time with the unresolved arguments.
    fn dependency(&self, _args: &[ParamValue]) -> Result<Option<StackName>, ResolverError> {
        Ok(None)
    }

    /// Produce the value from fully resolved arguments.
    async fn resolve(
        &self,
        args: &[String],
        ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolverError>;
}

/// Why a single resolver could not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("unknown resolver kind: {0}")]
    UnknownKind(String),

    #[error("invalid arguments for {kind}: {message}")]
    InvalidArguments { kind: String, message: String },

    #[error("stack {stack} is unavailable in this run (status: {status})")]
    StackUnavailable { stack: StackName, status: StackStatus },

    #[error("stack {stack} has not finished yet (status: {status})")]
    StackNotReady { stack: StackName, status: StackStatus },

    #[error("stack {stack} has no output named {key}")]
    OutputMissing { stack: String, key: String },

    #[error("missing required environment variable: {0}")]
    EnvVarMissing(String),

    #[error("failed to read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ResolverError {
    pub fn invalid_args(kind: &str, message: impl Into<String>) -> Self {
        ResolverError::InvalidArguments {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, ResolverError::Provider(e) if e.is_unavailable())
    }
}

/// A resolver failure attributed to the stack and parameter that needed it.
#[derive(Debug, thiserror::Error)]
#[error("resolver {kind} failed for parameter {parameter} of stack {stack}: {source}")]
pub struct ResolutionError {
    pub kind: String,
    pub stack: StackName,
    pub parameter: String,
    #[source]
    pub source: ResolverError,
}

/// Output values fetched from the API, shared by every stack in one plan run.
#[derive(Debug, Default)]
pub struct OutputCache {
    outputs: Mutex<HashMap<String, Arc<BTreeMap<String, String>>>>,
}

impl OutputCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything a resolver may read while resolving one stack's parameters.
pub struct ResolutionContext<'a> {
    stack: &'a Stack,
    records: &'a RecordTable,
    provider: &'a dyn ProvisioningApi,
    outputs: &'a OutputCache,
    project_dir: &'a Path,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        stack: &'a Stack,
        records: &'a RecordTable,
        provider: &'a dyn ProvisioningApi,
        outputs: &'a OutputCache,
        project_dir: &'a Path,
    ) -> Self {
        Self {
            stack,
            records,
            provider,
            outputs,
            project_dir,
        }
    }

    /// The stack whose parameters are being resolved.
    pub fn stack(&self) -> &Stack {
        self.stack
    }

    pub fn project_dir(&self) -> &Path {
        self.project_dir
    }

    /// Status of a stack in the current run; `None` if it is out of scope.
    pub fn status_of(&self, stack: &StackName) -> Option<StackStatus> {
        self.records.status(stack)
    }

    /// Outputs of a deployed stack, fetched from the API once per run.
    pub async fn stack_outputs(
        &self,
        stack: &str,
    ) -> Result<Arc<BTreeMap<String, String>>, ProviderError> {
        if let Some(cached) = self.outputs.outputs.lock().get(stack) {
            return Ok(Arc::clone(cached));
        }

        let fetched = Arc::new(self.provider.outputs(stack).await?);
        self.outputs
            .outputs
            .lock()
            .insert(stack.to_string(), Arc::clone(&fetched));
        Ok(fetched)
    }
}

/// Resolvers keyed by kind tag.
#[derive(Clone)]
pub struct ResolverRegistry {
    resolvers: HashMap<&'static str, Arc<dyn Resolver>>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(StackOutputResolver));
        registry.register(Arc::new(StackOutputExternalResolver));
        registry.register(Arc::new(EnvironmentVariableResolver));
        registry.register(Arc::new(FileContentsResolver));
        registry.register(Arc::new(JoinResolver));
        registry
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.resolvers.keys().collect();
        kinds.sort();
        f.debug_struct("ResolverRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl ResolverRegistry {
    /// A registry with no resolvers at all.
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Register a resolver, replacing any existing one of the same kind.
    pub fn register(&mut self, resolver: Arc<dyn Resolver>) -> &mut Self {
        self.resolvers.insert(resolver.kind(), resolver);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Resolver>> {
        self.resolvers.get(kind)
    }

    fn lookup(&self, kind: &str) -> Result<&Arc<dyn Resolver>, ResolverError> {
        self.get(kind)
            .ok_or_else(|| ResolverError::UnknownKind(kind.to_string()))
    }

    /// Stacks referenced anywhere inside a parameter value.
    pub fn referenced_stacks(
        &self,
        value: &ParamValue,
    ) -> Result<BTreeSet<StackName>, (String, ResolverError)> {
        let mut stacks = BTreeSet::new();
        for expr in value.resolver_exprs() {
            let resolver = self
                .lookup(&expr.kind)
                .map_err(|e| (expr.kind.clone(), e))?;
            if let Some(stack) = resolver
                .dependency(&expr.args)
                .map_err(|e| (expr.kind.clone(), e))?
            {
                stacks.insert(stack);
            }
        }
        Ok(stacks)
    }

    /// Resolve every parameter of the context's stack.
    ///
    /// Identical expressions within one stack are evaluated once.
    pub async fn resolve_parameters(
        &self,
        ctx: &ResolutionContext<'_>,
    ) -> Result<BTreeMap<String, String>, ResolutionError> {
        let memo = Mutex::new(HashMap::new());
        let mut resolved = BTreeMap::new();

        for (parameter, value) in ctx.stack().parameters() {
            let text = self
                .resolve_value(value, ctx, &memo)
                .await
                .map_err(|(kind, source)| ResolutionError {
                    kind,
                    stack: ctx.stack().name().clone(),
                    parameter: parameter.clone(),
                    source,
                })?;
            resolved.insert(parameter.clone(), text);
        }

        Ok(resolved)
    }

    fn resolve_value<'a>(
        &'a self,
        value: &'a ParamValue,
        ctx: &'a ResolutionContext<'_>,
        memo: &'a Mutex<HashMap<ResolverExpr, String>>,
    ) -> BoxFuture<'a, Result<String, (String, ResolverError)>> {
        async move {
            match value {
                ParamValue::Literal(text) => Ok(text.clone()),
                ParamValue::List(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        parts.push(self.resolve_value(item, ctx, memo).await?);
                    }
                    Ok(parts.join(","))
                }
                ParamValue::Resolver(expr) => {
                    if let Some(hit) = memo.lock().get(expr) {
                        return Ok(hit.clone());
                    }

                    let mut args = Vec::with_capacity(expr.args.len());
                    for arg in &expr.args {
                        args.push(self.resolve_value(arg, ctx, memo).await?);
                    }

                    let resolver = self
                        .lookup(&expr.kind)
                        .map_err(|e| (expr.kind.clone(), e))?;
                    tracing::debug!(
                        stack = %ctx.stack().name(),
                        kind = %expr.kind,
                        "Resolving parameter value"
                    );
                    let text = resolver
                        .resolve(&args, ctx)
                        .await
                        .map_err(|e| (expr.kind.clone(), e))?;

                    memo.lock().insert(expr.clone(), text.clone());
                    Ok(text)
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let registry = ResolverRegistry::default();
        for kind in [
            "stack_output",
            "stack_output_external",
            "environment_variable",
            "file_contents",
            "join",
        ] {
            assert!(registry.get(kind).is_some(), "missing {kind}");
        }
    }

    #[test]
    fn referenced_stacks_walks_nested_expressions() {
        let registry = ResolverRegistry::default();
        let value = ParamValue::resolver(
            "join",
            [
                ",".into(),
                ParamValue::resolver("stack_output", ["vpc".into(), "VpcId".into()]),
                ParamValue::List(vec![ParamValue::resolver(
                    "stack_output",
                    ["dns::ZoneId".into()],
                )]),
            ],
        );

        let stacks: Vec<String> = registry
            .referenced_stacks(&value)
            .unwrap()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(stacks, ["dns", "vpc"]);
    }

    #[test]
    fn unknown_kind_is_reported_with_its_tag() {
        let registry = ResolverRegistry::default();
        let value = ParamValue::resolver("vault_secret", ["db".into()]);

        let (kind, err) = registry.referenced_stacks(&value).unwrap_err();
        assert_eq!(kind, "vault_secret");
        assert!(matches!(err, ResolverError::UnknownKind(_)));
    }
}
