// ABOUTME: Resolver returning the contents of a file.
// ABOUTME: Relative paths are taken from the project directory.

use async_trait::async_trait;

use super::{ResolutionContext, Resolver, ResolverError};

pub struct FileContentsResolver;

#[async_trait]
impl Resolver for FileContentsResolver {
    fn kind(&self) -> &'static str {
        "file_contents"
    }

    async fn resolve(
        &self,
        args: &[String],
        ctx: &ResolutionContext<'_>,
    ) -> Result<String, ResolverError> {
        let [path] = args else {
            return Err(ResolverError::invalid_args(
                self.kind(),
                format!("expected 1 argument, got {}", args.len()),
            ));
        };

        let path = ctx.project_dir().join(path);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ResolverError::File { path, source })
    }
}
