use std::any::Any;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::kernel::constants::BASIC_LIBRARY;
use crate::kernel::error::{Error, Result};
use crate::stage_manager::error::StageSystemError;
use crate::stage_manager::registry::{StageDescriptor, StageRegistry};
use crate::stage_manager::schema::{ConfigDef, ConfigSchema};
use crate::stage_manager::{Batch, BatchMaker, Destination, Origin, Processor, Record, Stage, StageContext, StageType};

// --- dev_raw_data origin ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDataConf {
    pub raw_data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DevRawDataConfig {
    pub conf: RawDataConf,
}

/// Origin emitting the lines of a configured text block.
/// The offset is the index of the next line to emit.
#[derive(Debug, Default)]
pub struct DevRawDataOrigin {
    config: DevRawDataConfig,
    instance: String,
    lines: Vec<String>,
}

impl DevRawDataOrigin {
    pub fn config(&self) -> &DevRawDataConfig {
        &self.config
    }
}

#[async_trait]
impl Stage for DevRawDataOrigin {
    async fn init(&mut self, context: &StageContext) -> Result<()> {
        self.instance = context.instance_name().to_string();
        self.lines = self.config.conf.raw_data.lines().map(str::to_string).collect();
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        self.lines.clear();
        Ok(())
    }

    fn as_origin(&mut self) -> Option<&mut dyn Origin> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
impl Origin for DevRawDataOrigin {
    async fn produce(
        &mut self,
        last_source_offset: &str,
        max_batch_size: usize,
        batch_maker: &mut BatchMaker,
    ) -> Result<String> {
        let start = if last_source_offset.is_empty() {
            0
        } else {
            last_source_offset.parse::<usize>().map_err(|e| {
                Error::stage_with_source(
                    self.instance.clone(),
                    format!("invalid offset '{}'", last_source_offset),
                    e,
                )
            })?
        };
        if start >= self.lines.len() {
            return Ok(last_source_offset.to_string());
        }

        let end = start.saturating_add(max_batch_size).min(self.lines.len());
        for (index, line) in self.lines[start..end].iter().enumerate() {
            let source_id = format!("{}::{}", self.instance, start + index);
            batch_maker.add(Record::new(source_id, Value::String(line.clone())));
        }
        Ok(end.to_string())
    }
}

impl StageDescriptor for DevRawDataOrigin {
    type Config = DevRawDataConfig;

    const LIBRARY: &'static str = BASIC_LIBRARY;
    const STAGE_NAME: &'static str = "dev_raw_data";
    const STAGE_TYPE: StageType = StageType::Origin;

    fn label() -> &'static str {
        "Dev Raw Data Source"
    }

    fn description() -> &'static str {
        "Emits the lines of a configured text block"
    }

    fn config_schema() -> ConfigSchema {
        ConfigSchema::new().with_field(ConfigDef::group(
            "conf",
            ConfigSchema::new().with_field(ConfigDef::string("rawData").required().expandable().with_label("Raw Data")),
        ))
    }

    fn config_mut(&mut self) -> &mut Self::Config {
        &mut self.config
    }
}

// --- record_filter processor ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterMode {
    /// Pass records whose value contains the pattern
    #[default]
    Keep,
    /// Pass records whose value does not contain the pattern
    Drop,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConf {
    pub pattern: String,
    pub mode: FilterMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFilterConfig {
    pub filter_conf: FilterConf,
}

/// Processor passing string records by substring match.
/// Records whose value is not a string become error records.
#[derive(Debug, Default)]
pub struct RecordFilterProcessor {
    config: RecordFilterConfig,
}

impl RecordFilterProcessor {
    pub fn config(&self) -> &RecordFilterConfig {
        &self.config
    }
}

#[async_trait]
impl Stage for RecordFilterProcessor {
    async fn init(&mut self, _context: &StageContext) -> Result<()> {
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        Ok(())
    }

    fn as_processor(&mut self) -> Option<&mut dyn Processor> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
impl Processor for RecordFilterProcessor {
    async fn process(&mut self, batch: &Batch, batch_maker: &mut BatchMaker) -> Result<()> {
        let conf = &self.config.filter_conf;
        for record in batch.iter() {
            match record.value().as_str() {
                Some(text) => {
                    let matched = text.contains(&conf.pattern);
                    if matched == (conf.mode == FilterMode::Keep) {
                        batch_maker.add(record.clone());
                    }
                }
                None => batch_maker.to_error(record.clone(), "record value is not a string"),
            }
        }
        Ok(())
    }
}

impl StageDescriptor for RecordFilterProcessor {
    type Config = RecordFilterConfig;

    const LIBRARY: &'static str = BASIC_LIBRARY;
    const STAGE_NAME: &'static str = "record_filter";
    const STAGE_TYPE: StageType = StageType::Processor;

    fn label() -> &'static str {
        "Record Filter"
    }

    fn description() -> &'static str {
        "Keeps or drops string records containing a pattern"
    }

    fn config_schema() -> ConfigSchema {
        ConfigSchema::new().with_field(ConfigDef::group(
            "filterConf",
            ConfigSchema::new()
                .with_field(ConfigDef::string("pattern").required().expandable())
                .with_field(ConfigDef::string("mode").with_label("KEEP or DROP")),
        ))
    }

    fn config_mut(&mut self) -> &mut Self::Config {
        &mut self.config
    }
}

// --- trash destination ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrashConfig {}

/// Destination discarding every record
#[derive(Debug, Default)]
pub struct TrashDestination {
    config: TrashConfig,
    discarded: u64,
}

impl TrashDestination {
    /// Records discarded since construction
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

#[async_trait]
impl Stage for TrashDestination {
    async fn init(&mut self, _context: &StageContext) -> Result<()> {
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        Ok(())
    }

    fn as_destination(&mut self) -> Option<&mut dyn Destination> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
impl Destination for TrashDestination {
    async fn write(&mut self, batch: &Batch) -> Result<()> {
        self.discarded += batch.len() as u64;
        Ok(())
    }
}

impl StageDescriptor for TrashDestination {
    type Config = TrashConfig;

    const LIBRARY: &'static str = BASIC_LIBRARY;
    const STAGE_NAME: &'static str = "trash";
    const STAGE_TYPE: StageType = StageType::Destination;

    fn label() -> &'static str {
        "Trash"
    }

    fn description() -> &'static str {
        "Discards records"
    }

    fn config_schema() -> ConfigSchema {
        ConfigSchema::new()
    }

    fn config_mut(&mut self) -> &mut Self::Config {
        &mut self.config
    }
}

/// Register the stages built into the runtime
pub fn register_core_stages(registry: &mut StageRegistry) -> std::result::Result<(), StageSystemError> {
    registry.register::<DevRawDataOrigin>()?;
    registry.register::<RecordFilterProcessor>()?;
    registry.register::<TrashDestination>()?;
    Ok(())
}
