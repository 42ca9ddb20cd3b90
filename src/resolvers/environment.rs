// ABOUTME: Resolver reading a value from the process environment.
// ABOUTME: Accepts an optional default used when the variable is unset.

use async_trait::async_trait;

use super::{ResolutionContext, Resolver, ResolverError};

/// `[name]` or `[name, default]`.
pub struct EnvironmentVariableResolver;

#[async_trait]
impl Resolver for EnvironmentVariableResolver {
    fn kind(&self) -> &'static str {
        "environment_variable"
    }

    async fn resolve(
        &self,
        args: &[String],
        _ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolverError> {
        let (var, default) = match args {
            [var] => (var, None),
            [var, default] => (var, Some(default)),
            _ => {
                return Err(ResolverError::invalid_args(
                    self.kind(),
                    format!("expected 1 or 2 arguments, got {}", args.len()),
                ));
            }
        };

        match std::env::var(var) {
            Ok(val) => Ok(val),
            Err(_) => default
                .cloned()
                .ok_or_else(|| ResolverError::EnvVarMissing(var.clone())),
        }
    }
}
