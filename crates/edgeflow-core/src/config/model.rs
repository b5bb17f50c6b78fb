use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::value::ConfigValue;
use crate::kernel::constants::DEFAULT_MAX_BATCH_SIZE;

/// A single named configuration value of a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Field name, either top-level (`batchSize`) or grouped (`conf.batchSize`)
    pub name: String,
    pub value: ConfigValue,
}

impl Config {
    pub fn new(name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declarative description of one stage in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfiguration {
    /// Unique name of this stage within the pipeline; defaults to the stage name
    #[serde(default)]
    pub instance_name: String,
    pub library: String,
    pub stage_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_version: Option<String>,
    #[serde(default)]
    pub configuration: Vec<Config>,
    #[serde(default)]
    pub ui_info: BTreeMap<String, ConfigValue>,
}

impl StageConfiguration {
    pub fn new(library: impl Into<String>, stage_name: impl Into<String>) -> Self {
        Self {
            instance_name: String::new(),
            library: library.into(),
            stage_name: stage_name.into(),
            stage_version: None,
            configuration: Vec::new(),
            ui_info: BTreeMap::new(),
        }
    }

    pub fn with_instance_name(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = instance_name.into();
        self
    }

    pub fn with_config(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.configuration.push(Config::new(name, value));
        self
    }

    /// Name used in logs and errors
    pub fn instance_name(&self) -> &str {
        if self.instance_name.is_empty() {
            &self.stage_name
        } else {
            &self.instance_name
        }
    }

    /// Last value configured under `name`, if any
    pub fn get_config(&self, name: &str) -> Option<&ConfigValue> {
        self.configuration
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }
}

/// What the runner does with records a stage rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorRecordPolicy {
    /// Log and count error records, keep running
    #[default]
    Discard,
    /// Fail the batch and stop the pipeline before the offset is committed
    StopPipeline,
}

/// Bounded exponential backoff for production and delivery failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt; 0 disables retrying
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

/// A complete pipeline definition: one origin followed by processors and destinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfiguration {
    pub pipeline_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default)]
    pub error_record_policy: ErrorRecordPolicy,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Values substituted into `${NAME}` placeholders of stage configuration
    #[serde(default)]
    pub parameters: BTreeMap<String, ConfigValue>,
    pub stages: Vec<StageConfiguration>,
}

impl PipelineConfiguration {
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            title: String::new(),
            description: String::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            error_record_policy: ErrorRecordPolicy::default(),
            retry: RetryPolicy::default(),
            parameters: BTreeMap::new(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: StageConfiguration) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }
}
