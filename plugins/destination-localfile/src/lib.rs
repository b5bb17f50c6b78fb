//! Local file destination.
//!
//! Appends one line per record to a file on the local filesystem.
use std::any::Any;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use edgeflow_core::kernel::constants::BASIC_LIBRARY;
use edgeflow_core::kernel::error::{Error, Result};
use edgeflow_core::stage_manager::error::StageSystemError;
use edgeflow_core::stage_manager::{
    Batch, ConfigDef, ConfigSchema, Destination, Record, Stage, StageContext, StageDescriptor, StageRegistry,
    StageType,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

pub const STAGE_NAME: &str = "localfile";
pub const CONF_FILE_PATH: &str = "fileConf.filePath";
pub const CONF_CREATE_PARENT_DIRS: &str = "fileConf.createParentDirs";
pub const CONF_DATA_FORMAT: &str = "dataFormatConf.dataFormat";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataFormat {
    /// String values as-is, anything else as JSON
    #[default]
    Text,
    /// Every value as a JSON document
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConf {
    pub file_path: String,
    pub create_parent_dirs: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataFormatConf {
    pub data_format: DataFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalFileConfig {
    pub file_conf: FileConf,
    pub data_format_conf: DataFormatConf,
}

#[derive(Debug, Default)]
pub struct LocalFileDestination {
    config: LocalFileConfig,
    instance: String,
    writer: Option<BufWriter<File>>,
    records_written: u64,
}

impl LocalFileDestination {
    pub fn config(&self) -> &LocalFileConfig {
        &self.config
    }

    /// Records appended since construction
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    fn path(&self) -> PathBuf {
        PathBuf::from(&self.config.file_conf.file_path)
    }

    fn render(&self, record: &Record) -> Result<String> {
        let rendered = match (self.config.data_format_conf.data_format, record.value()) {
            (DataFormat::Text, Value::String(text)) => Ok(text.clone()),
            (_, value) => serde_json::to_string(value),
        };
        rendered.map_err(|e| {
            Error::stage_with_source(
                self.instance.clone(),
                format!("cannot serialize record '{}'", record.header().source_id),
                e,
            )
        })
    }
}

async fn open_for_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).await
}

#[async_trait]
impl Stage for LocalFileDestination {
    async fn init(&mut self, context: &StageContext) -> Result<()> {
        self.instance = context.instance_name().to_string();
        let path = self.path();
        if self.config.file_conf.file_path.trim().is_empty() {
            return Err(Error::stage(&self.instance, "filePath must not be empty"));
        }

        if self.config.file_conf.create_parent_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(e, "create_dir_all", parent.to_path_buf()))?;
            }
        }

        let file = open_for_append(&path).await.map_err(|e| {
            Error::stage_with_source(
                self.instance.clone(),
                format!("cannot open '{}' for writing", path.display()),
                e,
            )
        })?;
        self.writer = Some(BufWriter::new(file));
        log::info!("Stage '{}' writing to {}", self.instance, path.display());
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .shutdown()
                .await
                .map_err(|e| Error::io(e, "close", self.path()))?;
            log::debug!("Closed {} after {} records", self.path().display(), self.records_written);
        }
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
impl Destination for LocalFileDestination {
    async fn write(&mut self, batch: &Batch) -> Result<()> {
        let mut lines = String::new();
        for record in batch.iter() {
            lines.push_str(&self.render(record)?);
            lines.push('\n');
        }

        let path = self.path();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::stage(&self.instance, "destination is not initialized"))?;
        writer
            .write_all(lines.as_bytes())
            .await
            .map_err(|e| Error::io(e, "write", path.clone()))?;
        writer.flush().await.map_err(|e| Error::io(e, "flush", path))?;

        self.records_written += batch.len() as u64;
        Ok(())
    }
}

impl StageDescriptor for LocalFileDestination {
    type Config = LocalFileConfig;

    const LIBRARY: &'static str = BASIC_LIBRARY;
    const STAGE_NAME: &'static str = STAGE_NAME;
    const STAGE_TYPE: StageType = StageType::Destination;

    fn label() -> &'static str {
        "Local File"
    }

    fn description() -> &'static str {
        "Appends records to a file, one per line"
    }

    fn config_schema() -> ConfigSchema {
        ConfigSchema::new()
            .with_field(ConfigDef::group(
                "fileConf",
                ConfigSchema::new()
                    .with_field(ConfigDef::string("filePath").required().expandable().with_label("File Path"))
                    .with_field(ConfigDef::boolean("createParentDirs").with_label("Create Parent Directories")),
            ))
            .with_field(ConfigDef::group(
                "dataFormatConf",
                ConfigSchema::new().with_field(ConfigDef::string("dataFormat").with_label("TEXT or JSON")),
            ))
    }

    fn config_mut(&mut self) -> &mut Self::Config {
        &mut self.config
    }
}

/// Register the local file destination
pub fn register(registry: &mut StageRegistry) -> std::result::Result<(), StageSystemError> {
    registry.register::<LocalFileDestination>()
}
