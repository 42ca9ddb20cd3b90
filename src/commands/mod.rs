// ABOUTME: Command module aggregator for the stackplan CLI.
// ABOUTME: Loads the project once and hands it to the command handlers.

mod inspect;
mod run;

pub use inspect::{order, validate};
pub use run::run_action;

use stackplan::config::ProjectConfig;
use stackplan::error::Result;
use stackplan::graph::StackGraph;
use stackplan::resolvers::ResolverRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A parsed project with its dependency graph.
pub struct Project {
    pub dir: PathBuf,
    pub config: ProjectConfig,
    pub graph: Arc<StackGraph>,
    pub resolvers: Arc<ResolverRegistry>,
}

impl Project {
    pub fn load(dir: &Path) -> Result<Self> {
        let config = ProjectConfig::discover(dir)?;
        let resolvers = Arc::new(ResolverRegistry::default());
        let graph = StackGraph::build(config.stacks(), &resolvers)?;
        tracing::debug!(stacks = graph.len(), dir = %dir.display(), "Loaded project");

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            graph: Arc::new(graph),
            resolvers,
        })
    }
}
