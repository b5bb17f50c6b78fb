use std::path::Path;

use crate::config::model::PipelineConfiguration;
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::StorageProvider;

/// Supported pipeline definition formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Parse a pipeline definition from a string
pub fn parse_pipeline_configuration(data: &str, format: ConfigFormat, origin: &Path) -> Result<PipelineConfiguration> {
    let deserialization_error = |source: Box<dyn std::error::Error + Send + Sync>| {
        StorageSystemError::DeserializationError {
            format: format.extension().to_string(),
            path: origin.to_path_buf(),
            source,
        }
    };

    let parsed = match format {
        ConfigFormat::Json => serde_json::from_str(data).map_err(|e| deserialization_error(Box::new(e)))?,
        #[cfg(feature = "yaml-config")]
        ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| deserialization_error(Box::new(e)))?,
        #[cfg(feature = "toml-config")]
        ConfigFormat::Toml => toml::from_str(data).map_err(|e| deserialization_error(Box::new(e)))?,
    };
    Ok(parsed)
}

/// Load a pipeline definition through a storage provider, choosing the format by extension
pub fn load_pipeline_configuration(provider: &dyn StorageProvider, path: &Path) -> Result<PipelineConfiguration> {
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.to_path_buf()))?;

    if !provider.is_file(path) {
        return Err(StorageSystemError::FileNotFound(path.to_path_buf()).into());
    }

    let content = provider.read_to_string(path)?;
    let pipeline = parse_pipeline_configuration(&content, format, path)?;
    log::debug!(
        "Loaded pipeline '{}' with {} stages from {}",
        pipeline.pipeline_id,
        pipeline.stages.len(),
        path.display()
    );
    Ok(pipeline)
}
