// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stackplan::output::OutputMode;

#[derive(Parser)]
#[command(name = "stackplan")]
#[command(about = "Dependency-aware orchestration of interdependent infrastructure stacks")]
#[command(version)]
pub struct Cli {
    /// Project directory containing stackplan.yml
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputMode::Normal)]
    pub output: OutputMode,

    /// Act on exactly the selected stacks and never skip dependents
    #[arg(long, global = true)]
    pub ignore_dependencies: bool,

    /// Override the configured worker limit
    #[arg(long, global = true)]
    pub max_concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stackplan.yml configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Build the dependency graph and report construction errors
    Validate,

    /// Print execution generations without contacting the provisioner
    Order {
        /// Group or stack path (defaults to every stack)
        #[arg(default_value = "")]
        path: String,

        /// Print teardown order
        #[arg(long)]
        reverse: bool,
    },

    /// Create missing stacks and update existing ones
    Launch {
        #[arg(default_value = "")]
        path: String,
    },

    /// Create stacks
    Create {
        #[arg(default_value = "")]
        path: String,
    },

    /// Update stacks
    Update {
        #[arg(default_value = "")]
        path: String,
    },

    /// Delete stacks, dependents first
    Delete {
        #[arg(default_value = "")]
        path: String,
    },

    /// Drift detection
    Drift {
        #[command(subcommand)]
        command: DriftCommands,
    },
}

#[derive(Subcommand)]
pub enum DriftCommands {
    /// Start drift detection and wait for the result
    Detect {
        #[arg(default_value = "")]
        path: String,
    },

    /// Show the last drift detection result
    Show {
        #[arg(default_value = "")]
        path: String,
    },
}
