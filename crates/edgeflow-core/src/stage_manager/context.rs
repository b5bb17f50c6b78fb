use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ConfigValue, StageConfiguration};
use crate::runner::stop::StopHandle;

/// Execution environment handed to a stage at `init`.
///
/// Cloning is cheap; stages may keep a copy for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct StageContext {
    pipeline_id: String,
    stage_config: Arc<StageConfiguration>,
    parameters: Arc<BTreeMap<String, ConfigValue>>,
    stop: StopHandle,
}

impl StageContext {
    /// Create a context for a stage of the given pipeline
    pub fn new(
        pipeline_id: impl Into<String>,
        stage_config: StageConfiguration,
        parameters: Arc<BTreeMap<String, ConfigValue>>,
        stop: StopHandle,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            stage_config: Arc::new(stage_config),
            parameters,
            stop,
        }
    }

    /// Context for driving a single stage outside a pipeline
    pub fn for_stage(stage_config: StageConfiguration) -> Self {
        Self::new("", stage_config, Arc::new(BTreeMap::new()), StopHandle::new())
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn stage_config(&self) -> &StageConfiguration {
        &self.stage_config
    }

    pub fn instance_name(&self) -> &str {
        self.stage_config.instance_name()
    }

    pub fn parameters(&self) -> &BTreeMap<String, ConfigValue> {
        &self.parameters
    }

    pub fn get_parameter(&self, name: &str) -> Option<&ConfigValue> {
        self.parameters.get(name)
    }

    /// Whether the pipeline was asked to stop; long waits inside a stage should check this
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_stop_requested()
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }
}
