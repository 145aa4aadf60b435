//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shipyard_domain::{DeployGroupId, StageId, VariableGroupId};

/// Resolve and manage deploy environment variables.
#[derive(Debug, Parser)]
#[command(name = "shipyard", version, about)]
pub struct Cli {
    /// Settings file (defaults to an optional `shipyard.toml`).
    #[arg(long, env = "SHIPYARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dataset file, overrides `store_path`.
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Log filter, overrides `log_level`.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the resolved environment of a stage as dotenv text.
    Env {
        /// Stage id.
        #[arg(long)]
        stage: StageId,
        /// Resolve for this deploy group.
        #[arg(long)]
        deploy_group: Option<DeployGroupId>,
    },

    /// Write `.env` and one `.env.<deploy-group>` file per deploy group.
    EnvFiles {
        /// Stage id.
        #[arg(long)]
        stage: StageId,
        /// Output directory, overrides `output_dir`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List variable groups.
    Groups,

    /// Validate a scope token such as `DeployGroup-3`.
    Scope {
        /// Token to check.
        token: String,
    },

    /// Apply a JSON batch to the variables a stage owns.
    ApplyStage {
        /// Stage id.
        #[arg(long)]
        stage: StageId,
        /// Batch file.
        batch: PathBuf,
    },

    /// Create a variable group from a JSON batch.
    CreateGroup {
        /// Group name.
        #[arg(long)]
        name: String,
        /// Batch file.
        batch: Option<PathBuf>,
    },

    /// Rename a variable group and/or apply a JSON batch to it.
    UpdateGroup {
        /// Group id.
        #[arg(long)]
        id: VariableGroupId,
        /// New name.
        #[arg(long)]
        name: Option<String>,
        /// Batch file.
        batch: Option<PathBuf>,
    },

    /// Destroy a variable group and detach it from its stages.
    DestroyGroup {
        /// Group id.
        #[arg(long)]
        id: VariableGroupId,
    },

    /// Set the variable groups of a stage.
    Assign {
        /// Stage id.
        #[arg(long)]
        stage: StageId,
        /// Group ids; none detaches every group.
        groups: Vec<VariableGroupId>,
    },
}
