//! File tail origin.
//!
//! Reads newline-terminated lines appended to a list of files. The offset is
//! a JSON object mapping each file path to the byte position after the last
//! line handed out, so a pipeline resumes exactly where it stopped.
use std::any::Any;
use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::time::Duration;

use async_trait::async_trait;
use edgeflow_core::kernel::constants::BASIC_LIBRARY;
use edgeflow_core::kernel::error::{Error, Result};
use edgeflow_core::runner::StopHandle;
use edgeflow_core::stage_manager::error::StageSystemError;
use edgeflow_core::stage_manager::{
    BatchMaker, ConfigDef, ConfigSchema, ConfigType, Origin, Record, Stage, StageContext, StageDescriptor,
    StageRegistry, StageType,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::Instant;

pub const STAGE_NAME: &str = "filetail";
pub const CONF_FILE_INFOS: &str = "conf.fileInfos";
pub const CONF_MAX_WAIT_TIME_SECS: &str = "conf.maxWaitTimeSecs";
pub const CONF_BATCH_SIZE: &str = "conf.batchSize";

const DEFAULT_MAX_WAIT_TIME_SECS: f64 = 5.0;
const DEFAULT_BATCH_SIZE: usize = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Longest a single produce call waits for new data
const MAX_WAIT_TIME: Duration = Duration::from_secs(24 * 60 * 60);

/// One file to tail
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileInfo {
    pub file_full_path: String,
    /// Copied into the `tag` attribute of every record read from this file
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileTailConf {
    pub file_infos: Vec<FileInfo>,
    pub max_wait_time_secs: f64,
    pub batch_size: usize,
}

impl Default for FileTailConf {
    fn default() -> Self {
        Self {
            file_infos: Vec::new(),
            max_wait_time_secs: DEFAULT_MAX_WAIT_TIME_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileTailConfig {
    pub conf: FileTailConf,
}

#[derive(Debug, Default)]
pub struct FileTailOrigin {
    config: FileTailConfig,
    instance: String,
    stop: Option<StopHandle>,
}

impl FileTailOrigin {
    pub fn config(&self) -> &FileTailConfig {
        &self.config
    }

    fn max_wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.config.conf.max_wait_time_secs)
            .map_or(MAX_WAIT_TIME, |wait| wait.min(MAX_WAIT_TIME))
    }

    fn is_stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(StopHandle::is_stop_requested)
    }

    fn parse_offset(&self, offset: &str) -> Result<BTreeMap<String, u64>> {
        if offset.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(offset)
            .map_err(|e| Error::stage_with_source(self.instance.clone(), format!("invalid offset '{}'", offset), e))
    }

    fn encode_offset(&self, positions: &BTreeMap<String, u64>) -> Result<String> {
        serde_json::to_string(positions)
            .map_err(|e| Error::stage_with_source(self.instance.clone(), "cannot encode offset", e))
    }

    /// Read up to `max_lines` complete lines of `info` starting at `position`.
    /// Returns the position after the last line read.
    async fn read_lines(
        &self,
        info: &FileInfo,
        position: u64,
        max_lines: usize,
        batch_maker: &mut BatchMaker,
    ) -> Result<u64> {
        let path = info.file_full_path.as_str();
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::stage_with_source(self.instance.clone(), format!("cannot open file '{}'", path), e))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| Error::io(e, "metadata", path.into()))?
            .len();

        let mut position = position;
        if length < position {
            log::info!(
                "File '{}' shrank from {} to {} bytes, reading it again from the start",
                path,
                position,
                length
            );
            position = 0;
        }
        if length == position || max_lines == 0 {
            return Ok(position);
        }

        file.seek(SeekFrom::Start(position))
            .await
            .map_err(|e| Error::io(e, "seek", path.into()))?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut read = 0;

        while read < max_lines {
            line.clear();
            let bytes = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| Error::io(e, "read", path.into()))?;
            // A trailing line without newline may still be written to
            if bytes == 0 || line.last() != Some(&b'\n') {
                break;
            }

            let text = String::from_utf8_lossy(trim_line_ending(&line)).into_owned();
            let mut record = Record::new(format!("{}::{}", path, position), Value::String(text))
                .with_attribute("file", path);
            if let Some(tag) = &info.tag {
                record = record.with_attribute("tag", tag.as_str());
            }
            batch_maker.add(record);

            position += bytes as u64;
            read += 1;
        }
        Ok(position)
    }

    /// Sleep for up to `delay`, returning early when the pipeline is stopped
    async fn pause(&self, delay: Duration) {
        match &self.stop {
            Some(stop) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop.stopped() => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[async_trait]
impl Stage for FileTailOrigin {
    async fn init(&mut self, context: &StageContext) -> Result<()> {
        self.instance = context.instance_name().to_string();
        let conf = &self.config.conf;

        if conf.file_infos.is_empty() {
            return Err(Error::stage(&self.instance, "at least one file must be configured"));
        }
        if let Some(index) = conf.file_infos.iter().position(|info| info.file_full_path.trim().is_empty()) {
            return Err(Error::stage(&self.instance, format!("file {} has an empty path", index)));
        }
        if !conf.max_wait_time_secs.is_finite() || conf.max_wait_time_secs < 0.0 {
            return Err(Error::stage(
                &self.instance,
                format!("maxWaitTimeSecs must be zero or positive, got {}", conf.max_wait_time_secs),
            ));
        }
        if conf.batch_size == 0 {
            return Err(Error::stage(&self.instance, "batchSize must be greater than zero"));
        }
        if conf.max_wait_time_secs > MAX_WAIT_TIME.as_secs_f64() {
            log::warn!(
                "Stage '{}': maxWaitTimeSecs {} capped at {}s",
                self.instance,
                conf.max_wait_time_secs,
                MAX_WAIT_TIME.as_secs()
            );
        }

        self.stop = Some(context.stop_handle().clone());
        log::info!(
            "Tailing {} file(s) for '{}' (max wait {}s)",
            conf.file_infos.len(),
            self.instance,
            conf.max_wait_time_secs
        );
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        self.stop = None;
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
impl Origin for FileTailOrigin {
    async fn produce(
        &mut self,
        last_source_offset: &str,
        max_batch_size: usize,
        batch_maker: &mut BatchMaker,
    ) -> Result<String> {
        let mut positions = self.parse_offset(last_source_offset)?;
        let limit = max_batch_size.min(self.config.conf.batch_size);
        let deadline = Instant::now() + self.max_wait();

        loop {
            let mut changed = false;
            let mut produced = 0;

            for info in &self.config.conf.file_infos {
                let path = &info.file_full_path;
                let position = positions.get(path).copied().unwrap_or(0);
                let before = batch_maker.len();
                let next = self.read_lines(info, position, limit - produced, batch_maker).await?;
                produced += batch_maker.len() - before;

                if next != position {
                    positions.insert(path.clone(), next);
                    changed = true;
                }
                if produced >= limit {
                    break;
                }
            }

            if changed {
                return self.encode_offset(&positions);
            }

            let now = Instant::now();
            if now >= deadline || self.is_stop_requested() {
                return Ok(last_source_offset.to_string());
            }
            self.pause(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

impl StageDescriptor for FileTailOrigin {
    type Config = FileTailConfig;

    const LIBRARY: &'static str = BASIC_LIBRARY;
    const STAGE_NAME: &'static str = STAGE_NAME;
    const STAGE_TYPE: StageType = StageType::Origin;

    fn label() -> &'static str {
        "File Tail"
    }

    fn description() -> &'static str {
        "Reads lines appended to files"
    }

    fn config_schema() -> ConfigSchema {
        let file_info = ConfigSchema::new()
            .with_field(ConfigDef::string("fileFullPath").required().with_label("Full Path"))
            .with_field(ConfigDef::string("tag"));
        ConfigSchema::new().with_field(ConfigDef::group(
            "conf",
            ConfigSchema::new()
                .with_field(
                    ConfigDef::list("fileInfos", ConfigType::Group(file_info))
                        .required()
                        .expandable()
                        .with_label("File to Tail"),
                )
                .with_field(ConfigDef::float("maxWaitTimeSecs").with_label("Maximum Wait Time (secs)"))
                .with_field(ConfigDef::integer("batchSize").expandable().with_label("Max Batch Size")),
        ))
    }

    fn config_mut(&mut self) -> &mut Self::Config {
        &mut self.config
    }
}

/// Register the file tail origin
pub fn register(registry: &mut StageRegistry) -> std::result::Result<(), StageSystemError> {
    registry.register::<FileTailOrigin>()
}
