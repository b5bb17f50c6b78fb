use std::path::PathBuf;

use clap::{Parser, Subcommand};
use edgeflow_core::kernel::constants::DEFAULT_DATA_DIR;

/// Edgeflow: an embeddable data collection pipeline runtime
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. "info", "edgeflow_core=debug")
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Directory holding per-pipeline state such as committed offsets
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline until interrupted or a cycle fails
    Run {
        /// Pipeline definition file (.json, .yaml, .yml or .toml)
        pipeline: PathBuf,

        /// Override the pipeline's maxBatchSize
        #[arg(long)]
        max_batch_size: Option<usize>,

        /// Discard the committed offset and start from the beginning of the source
        #[arg(long)]
        reset_offset: bool,
    },
    /// Check a pipeline definition without starting it
    Validate {
        /// Pipeline definition file (.json, .yaml, .yml or .toml)
        pipeline: PathBuf,
    },
    /// List the registered stages
    Stages,
    /// Inspect or reset committed offsets
    Offset {
        #[command(subcommand)]
        command: OffsetCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum OffsetCommand {
    /// Print the committed offset of a pipeline
    Show { pipeline_id: String },
    /// Forget the committed offset; the next run starts from the beginning
    Reset { pipeline_id: String },
}
