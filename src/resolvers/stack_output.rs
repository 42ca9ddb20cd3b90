// ABOUTME: Resolvers reading output values of other stacks.
// ABOUTME: stack_output adds an implicit dependency; stack_output_external does not.

use async_trait::async_trait;

use super::{ResolutionContext, Resolver, ResolverError};
use crate::stack::ParamValue;
use crate::types::StackName;

/// Reads output `key` of a stack in this project: `[stack, key]` or `["stack::key"]`.
///
/// If the stack ran in this plan it must have succeeded. Stacks outside the
/// plan's scope are read straight from the API.
pub struct StackOutputResolver;

/// Reads output `key` of a stack not managed by this project.
pub struct StackOutputExternalResolver;

fn split_target<'a>(kind: &str, args: &[&'a str]) -> Result<(&'a str, &'a str), ResolverError> {
    match *args {
        [combined] => combined.split_once("::").ok_or_else(|| {
            ResolverError::invalid_args(kind, format!("expected <stack>::<key>, got '{combined}'"))
        }),
        [stack, key] => Ok((stack, key)),
        _ => Err(ResolverError::invalid_args(
            kind,
            format!("expected 1 or 2 arguments, got {}", args.len()),
        )),
    }
}

fn string_args(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

fn lookup_output(
    stack: &str,
    key: &str,
    outputs: &std::collections::BTreeMap<String, String>,
) -> Result<String, ResolverError> {
    outputs
        .get(key)
        .cloned()
        .ok_or_else(|| ResolverError::OutputMissing {
            stack: stack.to_string(),
            key: key.to_string(),
        })
}

#[async_trait]
impl Resolver for StackOutputResolver {
    fn kind(&self) -> &'static str {
        "stack_output"
    }

    fn dependency(&self, args: &[ParamValue]) -> Result<Option<StackName>, ResolverError> {
        let literals: Vec<&str> = args
            .iter()
            .map(ParamValue::as_literal)
            .collect::<Option<_>>()
            .ok_or_else(|| {
                ResolverError::invalid_args(self.kind(), "arguments must be literal values")
            })?;
        let (stack, _) = split_target(self.kind(), &literals)?;
        let stack = StackName::new(stack)
            .map_err(|e| ResolverError::invalid_args(self.kind(), e.to_string()))?;
        Ok(Some(stack))
    }

    async fn resolve(
        &self,
        args: &[String],
        ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolverError> {
        let (stack, key) = split_target(self.kind(), &string_args(args))?;
        let name = StackName::new(stack)
            .map_err(|e| ResolverError::invalid_args(self.kind(), e.to_string()))?;

        match ctx.status_of(&name) {
            None => {
                tracing::debug!(stack = %name, "Stack outside plan scope, reading outputs remotely");
            }
            Some(status) if status.is_success() => {}
            Some(status) if status.is_terminal() => {
                return Err(ResolverError::StackUnavailable {
                    stack: name,
                    status,
                });
            }
            Some(status) => {
                return Err(ResolverError::StackNotReady {
                    stack: name,
                    status,
                });
            }
        }

        let outputs = ctx.stack_outputs(stack).await?;
        lookup_output(stack, key, &outputs)
    }
}

#[async_trait]
impl Resolver for StackOutputExternalResolver {
    fn kind(&self) -> &'static str {
        "stack_output_external"
    }

    async fn resolve(
        &self,
        args: &[String],
        ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolverError> {
        let (stack, key) = split_target(self.kind(), &string_args(args))?;
        let outputs = ctx.stack_outputs(stack).await?;
        lookup_output(stack, key, &outputs)
    }
}
