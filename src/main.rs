// ABOUTME: Entry point for the stackplan CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, DriftCommands};
use commands::Project;
use stackplan::config;
use stackplan::error::Result;
use stackplan::output::Output;
use stackplan::plan::{ActionKind, PlanOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output);
    match run(cli).await {
        Ok(failures) => std::process::exit(failures.min(255) as i32),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Returns the number of failed stacks.
async fn run(cli: Cli) -> Result<usize> {
    let output = Output::new(cli.output);

    let (action, path) = match cli.command {
        Commands::Init { force } => {
            let path = config::init_config(&cli.project_dir, force)?;
            output.success(&format!("Created {}", path.display()));
            return Ok(0);
        }
        Commands::Validate => {
            let project = Project::load(&cli.project_dir)?;
            commands::validate(&project, &output)?;
            return Ok(0);
        }
        Commands::Order { path, reverse } => {
            let project = Project::load(&cli.project_dir)?;
            commands::order(&project, &path, reverse, &output)?;
            return Ok(0);
        }
        Commands::Launch { path } => (ActionKind::Launch, path),
        Commands::Create { path } => (ActionKind::Create, path),
        Commands::Update { path } => (ActionKind::Update, path),
        Commands::Delete { path } => (ActionKind::Delete, path),
        Commands::Drift { command } => match command {
            DriftCommands::Detect { path } => (ActionKind::DriftDetect, path),
            DriftCommands::Show { path } => (ActionKind::DriftShow, path),
        },
    };

    let project = Project::load(&cli.project_dir)?;
    let options = PlanOptions::new(path).ignore_dependencies(cli.ignore_dependencies);
    commands::run_action(&project, action, options, cli.max_concurrency, output).await
}
