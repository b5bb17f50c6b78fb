mod cli;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use edgeflow_core::config::{PipelineConfiguration, load_pipeline_configuration};
use edgeflow_core::kernel::Agent;
use edgeflow_core::kernel::error::Result;
use edgeflow_core::runner::{OffsetStore, build_pipeline_beans};
use edgeflow_core::stage_manager::core_stages::register_core_stages;
use edgeflow_core::stage_manager::{StageRegistry, install_global_registry};
use edgeflow_core::storage::LocalStorageProvider;

use cli::{Cli, Commands, OffsetCommand};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = logging::init(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Install every stage this binary ships with as the process-wide registry
fn build_registry() -> Result<Arc<StageRegistry>> {
    let mut registry = StageRegistry::new();
    register_core_stages(&mut registry)?;
    origin_filetail::register(&mut registry)?;
    destination_localfile::register(&mut registry)?;
    Ok(install_global_registry(registry)?)
}

fn load_pipeline(path: &Path) -> Result<PipelineConfiguration> {
    // Relative paths resolve against the working directory
    let provider = LocalStorageProvider::new(PathBuf::from("."));
    load_pipeline_configuration(&provider, path)
}

async fn execute(args: Cli) -> Result<()> {
    match args.command {
        Commands::Run {
            pipeline,
            max_batch_size,
            reset_offset,
        } => {
            let mut config = load_pipeline(&pipeline)?;
            if let Some(max_batch_size) = max_batch_size {
                config.max_batch_size = max_batch_size;
            }
            let agent = Agent::new(build_registry()?, args.data_dir);
            if reset_offset {
                agent.offset_store(&config.pipeline_id).reset()?;
                log::info!("Reset offset of pipeline '{}'", config.pipeline_id);
            }
            let handle = agent.start_pipeline(config);

            let stop = handle.stop_handle().clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupt received, stopping pipeline");
                    stop.request_stop();
                }
            });

            let summary = handle.join().await?;
            println!(
                "Pipeline '{}' {} at offset '{}': {} cycles, {} records written, {} error records",
                summary.pipeline_id,
                summary.state,
                summary.offset,
                summary.metrics.cycles,
                summary.metrics.records_written,
                summary.metrics.error_records
            );
            Ok(())
        }
        Commands::Validate { pipeline } => {
            let config = load_pipeline(&pipeline)?;
            let registry = build_registry()?;
            let beans = build_pipeline_beans(&registry, &config)?;
            println!("Pipeline '{}' is valid ({} stages)", config.pipeline_id, beans.len());
            for bean in &beans {
                println!("  - {} ({} {})", bean.instance_name(), bean.stage_type(), bean.system_configs.stage_name);
            }
            Ok(())
        }
        Commands::Stages => {
            let registry = build_registry()?;
            if registry.count() == 0 {
                println!("No stages registered.");
                return Ok(());
            }
            for definition in registry.definitions() {
                println!(
                    "{:<20} {:<12} {:<8} {:<20} {}",
                    definition.stage_name,
                    definition.stage_type.to_string(),
                    definition.version.to_string(),
                    definition.library,
                    definition.label
                );
            }
            Ok(())
        }
        Commands::Offset { command } => {
            let agent = Agent::new(Arc::new(StageRegistry::new()), args.data_dir);
            match command {
                OffsetCommand::Show { pipeline_id } => {
                    let offset = agent.offset_store(&pipeline_id).load()?;
                    if offset.is_empty() {
                        println!("Pipeline '{}' has no committed offset", pipeline_id);
                    } else {
                        println!("{}", offset);
                    }
                }
                OffsetCommand::Reset { pipeline_id } => {
                    agent.offset_store(&pipeline_id).reset()?;
                    println!("Offset of pipeline '{}' reset", pipeline_id);
                }
            }
            Ok(())
        }
    }
}
