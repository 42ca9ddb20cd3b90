// ABOUTME: Resolver joining several values with a delimiter.
// ABOUTME: Its arguments are usually other resolver expressions.

use async_trait::async_trait;

use super::{ResolutionContext, Resolver, ResolverError};

/// `[delimiter, value...]`.
pub struct JoinResolver;

#[async_trait]
impl Resolver for JoinResolver {
    fn kind(&self) -> &'static str {
        "join"
    }

    async fn resolve(
        &self,
        args: &[String],
        _ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolverError> {
        let Some((delimiter, values)) = args.split_first() else {
            return Err(ResolverError::invalid_args(
                self.kind(),
                "expected a delimiter followed by values",
            ));
        };
        Ok(values.join(delimiter))
    }
}
