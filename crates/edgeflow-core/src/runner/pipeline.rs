use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigValue, ErrorRecordPolicy, PipelineConfiguration};
use crate::kernel::error::{Error, Result};
use crate::runner::error::{PipelineState, RunnerError};
use crate::runner::offset::OffsetStore;
use crate::runner::stop::StopHandle;
use crate::stage_manager::error::StageSystemError;
use crate::stage_manager::{BatchMaker, StageBean, StageContext, StageRegistry, StageType, new_stage_bean};

/// Pause after a cycle that produced nothing and left the offset where it was
const IDLE_CYCLE_BACKOFF: Duration = Duration::from_millis(100);

/// Cumulative counters of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerMetrics {
    pub cycles: u64,
    pub records_produced: u64,
    pub records_written: u64,
    pub error_records: u64,
    pub offset_commits: u64,
}

/// Result of one produce → process → deliver → commit cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub records_produced: usize,
    pub records_written: usize,
    pub error_records: usize,
    /// Offset after the cycle
    pub offset: String,
    pub offset_committed: bool,
}

impl CycleOutcome {
    /// Nothing was produced and the offset did not move
    pub fn is_idle(&self) -> bool {
        self.records_produced == 0 && self.error_records == 0 && !self.offset_committed
    }
}

/// Final report of [`PipelineRunner::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pipeline_id: String,
    pub state: PipelineState,
    pub offset: String,
    pub metrics: RunnerMetrics,
}

/// Drives one pipeline: a single origin followed by processors and destinations.
///
/// Every cycle is strictly sequential. The offset returned by the origin is
/// committed only after every destination accepted the batch.
pub struct PipelineRunner {
    config: PipelineConfiguration,
    registry: Arc<StageRegistry>,
    offset_store: Box<dyn OffsetStore>,
    parameters: Arc<BTreeMap<String, ConfigValue>>,
    stop: StopHandle,
    state: PipelineState,
    /// Initialized stages in pipeline order
    beans: Vec<StageBean>,
    current_offset: String,
    metrics: RunnerMetrics,
}

impl fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("pipeline_id", &self.config.pipeline_id)
            .field("state", &self.state)
            .field("stages", &self.beans.len())
            .field("current_offset", &self.current_offset)
            .field("offset_store", &self.offset_store)
            .finish()
    }
}

impl PipelineRunner {
    pub fn new(
        config: PipelineConfiguration,
        registry: Arc<StageRegistry>,
        offset_store: Box<dyn OffsetStore>,
    ) -> Self {
        let parameters = Arc::new(config.parameters.clone());
        Self {
            config,
            registry,
            offset_store,
            parameters,
            stop: StopHandle::new(),
            state: PipelineState::Created,
            beans: Vec::new(),
            current_offset: String::new(),
            metrics: RunnerMetrics::default(),
        }
    }

    pub fn pipeline_id(&self) -> &str {
        &self.config.pipeline_id
    }

    pub fn config(&self) -> &PipelineConfiguration {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Handle for requesting a stop from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn metrics(&self) -> &RunnerMetrics {
        &self.metrics
    }

    /// Last committed offset
    pub fn current_offset(&self) -> &str {
        &self.current_offset
    }

    /// Initialized stages, in pipeline order
    pub fn stages(&self) -> &[StageBean] {
        &self.beans
    }

    fn invalid_state(&self, operation: &str) -> Error {
        RunnerError::InvalidState {
            pipeline_id: self.config.pipeline_id.clone(),
            operation: operation.to_string(),
            state: self.state,
        }
        .into()
    }

    /// Build and initialize every stage, then load the committed offset.
    ///
    /// On failure every stage initialized so far is destroyed in reverse
    /// order and the runner ends up `Errored`.
    pub async fn init(&mut self) -> Result<()> {
        if self.state != PipelineState::Created {
            return Err(self.invalid_state("init"));
        }
        log::info!(
            "Initializing pipeline '{}' with {} stages",
            self.config.pipeline_id,
            self.config.stages.len()
        );

        let beans = match build_pipeline_beans(&self.registry, &self.config) {
            Ok(beans) => beans,
            Err(e) => {
                self.state = PipelineState::Errored;
                return Err(e);
            }
        };

        for mut bean in beans {
            let instance = bean.instance_name().to_string();
            let context = StageContext::new(
                self.config.pipeline_id.clone(),
                bean.stage_config.clone(),
                self.parameters.clone(),
                self.stop.clone(),
            );
            let result = bean.stage.init(&context).await;
            // A partially initialized stage is destroyed as well
            self.beans.push(bean);

            if let Err(e) = result {
                log::error!(
                    "Stage '{}' of pipeline '{}' failed to initialize: {}",
                    instance,
                    self.config.pipeline_id,
                    e
                );
                self.teardown().await;
                self.state = PipelineState::Errored;
                return Err(RunnerError::StageInit {
                    instance,
                    source: Box::new(e),
                }
                .into());
            }
            log::debug!("Initialized stage '{}'", instance);
        }

        match self.offset_store.load() {
            Ok(offset) => self.current_offset = offset,
            Err(e) => {
                self.teardown().await;
                self.state = PipelineState::Errored;
                return Err(RunnerError::Offset {
                    pipeline_id: self.config.pipeline_id.clone(),
                    source: Box::new(e),
                }
                .into());
            }
        }

        self.state = PipelineState::Initialized;
        log::info!(
            "Pipeline '{}' initialized at offset '{}'",
            self.config.pipeline_id,
            self.current_offset
        );
        Ok(())
    }

    /// Run one cycle. A failure tears the pipeline down and leaves it `Errored`.
    ///
    /// A stop requested while a failed stage waits for its retry ends the cycle
    /// with [`RunnerError::Interrupted`] instead: nothing is committed and the
    /// runner ends up `Stopped`.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        match self.state {
            PipelineState::Initialized | PipelineState::Running => {}
            _ => return Err(self.invalid_state("run a cycle")),
        }
        self.state = PipelineState::Running;

        match self.execute_cycle().await {
            Ok(outcome) => Ok(outcome),
            Err(e @ Error::Runner(RunnerError::Interrupted { .. })) => {
                log::info!("Pipeline '{}' interrupted: {}", self.config.pipeline_id, e);
                self.shutdown().await;
                Err(e)
            }
            Err(e) => {
                log::error!("Pipeline '{}' failed: {}", self.config.pipeline_id, e);
                self.teardown().await;
                self.state = PipelineState::Errored;
                Err(e)
            }
        }
    }

    /// Initialize if needed, then cycle until a stop is requested or a cycle fails.
    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.state == PipelineState::Created {
            self.init().await?;
        }
        match self.state {
            PipelineState::Initialized | PipelineState::Running => {}
            _ => return Err(self.invalid_state("run")),
        }
        log::info!(
            "Running pipeline '{}' from offset '{}'",
            self.config.pipeline_id,
            self.current_offset
        );

        while !self.stop.is_stop_requested() {
            let outcome = match self.run_cycle().await {
                Ok(outcome) => outcome,
                Err(Error::Runner(RunnerError::Interrupted { .. })) => break,
                Err(e) => return Err(e),
            };
            if outcome.is_idle() && wait_or_stop(&self.stop, IDLE_CYCLE_BACKOFF).await {
                break;
            }
        }

        self.shutdown().await;
        Ok(self.summary())
    }

    /// Destroy every stage in reverse order and move to `Stopped`
    pub async fn shutdown(&mut self) {
        match self.state {
            PipelineState::Stopped | PipelineState::Errored => return,
            _ => {}
        }
        self.teardown().await;
        self.state = PipelineState::Stopped;
        log::info!(
            "Pipeline '{}' stopped at offset '{}' after {} cycles",
            self.config.pipeline_id,
            self.current_offset,
            self.metrics.cycles
        );
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            pipeline_id: self.config.pipeline_id.clone(),
            state: self.state,
            offset: self.current_offset.clone(),
            metrics: self.metrics.clone(),
        }
    }

    async fn teardown(&mut self) {
        while let Some(mut bean) = self.beans.pop() {
            match bean.stage.destroy().await {
                Ok(()) => log::debug!("Destroyed stage '{}'", bean.instance_name()),
                Err(e) => log::error!(
                    "Failed to destroy stage '{}' of pipeline '{}': {}",
                    bean.instance_name(),
                    self.config.pipeline_id,
                    e
                ),
            }
        }
    }

    async fn execute_cycle(&mut self) -> Result<CycleOutcome> {
        let Self {
            config,
            offset_store,
            stop,
            beans,
            current_offset,
            metrics,
            ..
        } = self;
        let pipeline_id = config.pipeline_id.as_str();

        let (origin_bean, downstream) = beans.split_first_mut().ok_or_else(|| RunnerError::InvalidTopology {
            pipeline_id: pipeline_id.to_string(),
            reason: "no initialized stages".to_string(),
        })?;

        let (produced, new_offset) = produce(origin_bean, current_offset, config, stop).await?;
        let (mut batch, mut errors) = produced.into_batch(current_offset.clone());
        let records_produced = batch.len();

        for bean in downstream.iter_mut() {
            if batch.is_empty() {
                break;
            }
            let instance = bean.stage_config.instance_name().to_string();
            if let Some(processor) = bean.stage.as_processor() {
                let mut batch_maker = BatchMaker::new(instance.as_str());
                processor
                    .process(&batch, &mut batch_maker)
                    .await
                    .map_err(|e| RunnerError::Delivery {
                        instance: instance.clone(),
                        source: Box::new(e),
                    })?;
                let (processed, rejected) = batch_maker.into_batch(batch.source_offset().to_string());
                batch = processed;
                errors.extend(rejected);
            }
        }

        if let Some(first) = errors.first() {
            match config.error_record_policy {
                ErrorRecordPolicy::Discard => {
                    log::warn!(
                        "Pipeline '{}': discarding {} error record(s), first from '{}': {}",
                        pipeline_id,
                        errors.len(),
                        first.stage,
                        first.message
                    );
                    for error in &errors {
                        log::debug!(
                            "Error record from '{}': {} ({})",
                            error.stage,
                            error.message,
                            error.record.value()
                        );
                    }
                }
                ErrorRecordPolicy::StopPipeline => {
                    return Err(RunnerError::ErrorRecords {
                        pipeline_id: pipeline_id.to_string(),
                        count: errors.len(),
                        stage: first.stage.clone(),
                        message: first.message.clone(),
                    }
                    .into());
                }
            }
        }

        let mut records_written = 0;
        if !batch.is_empty() {
            for bean in downstream.iter_mut() {
                let instance = bean.stage_config.instance_name().to_string();
                if let Some(destination) = bean.stage.as_destination() {
                    let mut attempt = 0u32;
                    loop {
                        match destination.write(&batch).await {
                            Ok(()) => break,
                            Err(e) => {
                                attempt += 1;
                                if attempt > config.retry.max_attempts {
                                    return Err(RunnerError::Delivery {
                                        instance,
                                        source: Box::new(e),
                                    }
                                    .into());
                                }
                                let delay = config.retry.backoff_for(attempt);
                                log::warn!(
                                    "Destination '{}' failed (retry {} of {} in {:?}): {}",
                                    instance,
                                    attempt,
                                    config.retry.max_attempts,
                                    delay,
                                    e
                                );
                                if wait_or_stop(stop, delay).await {
                                    return Err(RunnerError::Interrupted {
                                        instance,
                                        source: Box::new(e),
                                    }
                                    .into());
                                }
                            }
                        }
                    }
                }
            }
            records_written = batch.len();
        }

        let offset_committed = new_offset != *current_offset;
        if offset_committed {
            offset_store.save(&new_offset).map_err(|e| RunnerError::Offset {
                pipeline_id: pipeline_id.to_string(),
                source: Box::new(e),
            })?;
            *current_offset = new_offset.clone();
            metrics.offset_commits += 1;
        }

        metrics.cycles += 1;
        metrics.records_produced += records_produced as u64;
        metrics.records_written += records_written as u64;
        metrics.error_records += errors.len() as u64;

        log::debug!(
            "Pipeline '{}' cycle: {} produced, {} written, {} errors, offset '{}'",
            pipeline_id,
            records_produced,
            records_written,
            errors.len(),
            new_offset
        );

        Ok(CycleOutcome {
            records_produced,
            records_written,
            error_records: errors.len(),
            offset: new_offset,
            offset_committed,
        })
    }
}

impl Drop for PipelineRunner {
    fn drop(&mut self) {
        if !self.beans.is_empty() {
            log::warn!(
                "Pipeline '{}' dropped with {} stages not destroyed; call shutdown() first",
                self.config.pipeline_id,
                self.beans.len()
            );
        }
    }
}

/// Ask the origin for a batch, retrying failures with backoff.
/// Every attempt gets a fresh batch maker.
async fn produce(
    origin_bean: &mut StageBean,
    offset: &str,
    config: &PipelineConfiguration,
    stop: &StopHandle,
) -> Result<(BatchMaker, String)> {
    let instance = origin_bean.stage_config.instance_name().to_string();
    let origin = origin_bean
        .stage
        .as_origin()
        .ok_or_else(|| StageSystemError::MissingCapability {
            instance: instance.clone(),
            capability: StageType::Origin.to_string(),
        })?;

    let mut attempt = 0u32;
    loop {
        let mut batch_maker = BatchMaker::new(instance.as_str());
        match origin.produce(offset, config.max_batch_size, &mut batch_maker).await {
            Ok(next_offset) => {
                if batch_maker.len() > config.max_batch_size {
                    let message = format!(
                        "produced {} records, more than the maximum batch size of {}",
                        batch_maker.len(),
                        config.max_batch_size
                    );
                    return Err(RunnerError::Production {
                        source: Box::new(Error::stage(instance.clone(), message)),
                        instance,
                    }
                    .into());
                }
                return Ok((batch_maker, next_offset));
            }
            Err(e) => {
                attempt += 1;
                if attempt > config.retry.max_attempts {
                    return Err(RunnerError::Production {
                        instance,
                        source: Box::new(e),
                    }
                    .into());
                }
                let delay = config.retry.backoff_for(attempt);
                log::warn!(
                    "Origin '{}' failed (retry {} of {} in {:?}): {}",
                    instance,
                    attempt,
                    config.retry.max_attempts,
                    delay,
                    e
                );
                if wait_or_stop(stop, delay).await {
                    return Err(RunnerError::Interrupted {
                        instance,
                        source: Box::new(e),
                    }
                    .into());
                }
            }
        }
    }
}

/// Sleep for `delay`; returns true when a stop was requested first
async fn wait_or_stop(stop: &StopHandle, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = stop.stopped() => true,
    }
}

/// Validate a pipeline definition and build a bean for every stage, without
/// initializing any of them.
pub fn build_pipeline_beans(registry: &StageRegistry, config: &PipelineConfiguration) -> Result<Vec<StageBean>> {
    let invalid = |reason: String| -> Error {
        RunnerError::InvalidTopology {
            pipeline_id: config.pipeline_id.clone(),
            reason,
        }
        .into()
    };

    if config.pipeline_id.trim().is_empty() {
        return Err(invalid("pipeline id is empty".to_string()));
    }
    if config.max_batch_size == 0 {
        return Err(invalid("maxBatchSize must be greater than zero".to_string()));
    }
    if config.stages.is_empty() {
        return Err(invalid("pipeline has no stages".to_string()));
    }

    let mut seen = HashSet::new();
    for stage_config in &config.stages {
        if !seen.insert(stage_config.instance_name()) {
            return Err(invalid(format!(
                "duplicate stage instance name '{}'",
                stage_config.instance_name()
            )));
        }
    }

    let mut beans = Vec::with_capacity(config.stages.len());
    for stage_config in &config.stages {
        beans.push(new_stage_bean(registry, stage_config, &config.parameters)?);
    }

    let types: Vec<StageType> = beans.iter().map(StageBean::stage_type).collect();
    validate_topology(&types).map_err(invalid)?;
    Ok(beans)
}

/// One origin first, then processors, then at least one destination
fn validate_topology(types: &[StageType]) -> std::result::Result<(), String> {
    match types.first() {
        Some(StageType::Origin) => {}
        Some(other) => return Err(format!("first stage must be an origin, found a {}", other)),
        None => return Err("pipeline has no stages".to_string()),
    }

    let mut seen_destination = false;
    for (index, stage_type) in types.iter().enumerate().skip(1) {
        match stage_type {
            StageType::Origin => return Err(format!("stage {} is a second origin", index)),
            StageType::Processor if seen_destination => {
                return Err(format!("processor at position {} follows a destination", index));
            }
            StageType::Processor => {}
            StageType::Destination => seen_destination = true,
        }
    }

    if !seen_destination {
        return Err("pipeline has no destination".to_string());
    }
    Ok(())
}
