use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::PipelineConfiguration;
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::runner::{FileOffsetStore, PipelineRunner, RunSummary, StopHandle};
use crate::stage_manager::StageRegistry;
use crate::storage::{LocalStorageProvider, StorageProvider};

/// Hosts independent pipelines that share one read-only stage registry.
///
/// Each pipeline runs on its own tokio task with a [`FileOffsetStore`] under
/// the agent's data directory.
pub struct Agent {
    registry: Arc<StageRegistry>,
    data_dir: PathBuf,
    storage: Arc<dyn StorageProvider>,
}

impl Agent {
    pub fn new(registry: Arc<StageRegistry>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        log::info!("Using data directory: {}", data_dir.display());
        Self {
            registry,
            storage: Arc::new(LocalStorageProvider::new(data_dir.clone())),
            data_dir,
        }
    }

    pub fn registry(&self) -> &Arc<StageRegistry> {
        &self.registry
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Offset store of the given pipeline
    pub fn offset_store(&self, pipeline_id: &str) -> FileOffsetStore {
        FileOffsetStore::new(self.storage.clone(), pipeline_id)
    }

    /// Runner for `config`, not yet initialized
    pub fn create_runner(&self, config: PipelineConfiguration) -> PipelineRunner {
        let offset_store = self.offset_store(&config.pipeline_id);
        PipelineRunner::new(config, self.registry.clone(), Box::new(offset_store))
    }

    /// Spawn a pipeline on its own task. Must be called from a tokio runtime.
    pub fn start_pipeline(&self, config: PipelineConfiguration) -> PipelineHandle {
        let pipeline_id = config.pipeline_id.clone();
        let mut runner = self.create_runner(config);
        let stop_handle = runner.stop_handle();

        log::info!("Starting pipeline '{}'", pipeline_id);
        let join = tokio::spawn(async move { runner.run().await });

        PipelineHandle {
            pipeline_id,
            stop_handle,
            join,
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("data_dir", &self.data_dir)
            .field("stages", &self.registry.count())
            .finish()
    }
}

/// A pipeline running on its own task
#[derive(Debug)]
pub struct PipelineHandle {
    pipeline_id: String,
    stop_handle: StopHandle,
    join: JoinHandle<Result<RunSummary>>,
}

impl PipelineHandle {
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop_handle
    }

    pub fn request_stop(&self) {
        self.stop_handle.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the pipeline task to finish
    pub async fn join(self) -> Result<RunSummary> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(Error::Other(format!("pipeline '{}' task failed: {}", self.pipeline_id, e))),
        }
    }

    /// Request a stop and wait for the pipeline to wind down
    pub async fn stop(self) -> Result<RunSummary> {
        self.request_stop();
        self.join().await
    }
}
