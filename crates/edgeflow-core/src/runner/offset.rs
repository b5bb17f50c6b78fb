use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::kernel::constants::{OFFSET_FILE_NAME, OFFSET_FILE_VERSION, PIPELINES_DIR};
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::{LocalStorageProvider, StorageProvider};

/// Durable home of a pipeline's source offset
pub trait OffsetStore: Send + Sync + Debug {
    /// Last committed offset; empty when nothing was committed yet
    fn load(&self) -> Result<String>;

    /// Commit a new offset
    fn save(&self, offset: &str) -> Result<()>;

    /// Forget the committed offset so the origin starts from the beginning
    fn reset(&self) -> Result<()> {
        self.save("")
    }
}

/// In-memory offset store. Clones share the same offset.
#[derive(Debug, Clone, Default)]
pub struct MemoryOffsetStore {
    offset: Arc<Mutex<String>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: impl Into<String>) -> Self {
        let store = Self::default();
        *store.lock() = offset.into();
        store
    }

    /// Currently committed offset
    pub fn current(&self) -> String {
        self.lock().clone()
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        // A panic while holding the lock cannot leave a String half-written
        self.offset.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn load(&self) -> Result<String> {
        Ok(self.current())
    }

    fn save(&self, offset: &str) -> Result<()> {
        *self.lock() = offset.to_string();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// On-disk format of an offset file
#[derive(Debug, Serialize, Deserialize)]
struct OffsetFile {
    version: u32,
    offset: String,
}

/// Offset store keeping `pipelines/<pipeline id>/offset.json` under a data directory
#[derive(Debug, Clone)]
pub struct FileOffsetStore {
    provider: Arc<dyn StorageProvider>,
    path: PathBuf,
}

impl FileOffsetStore {
    /// Store for `pipeline_id` on the given provider
    pub fn new(provider: Arc<dyn StorageProvider>, pipeline_id: &str) -> Self {
        let path = Path::new(PIPELINES_DIR)
            .join(sanitize_pipeline_id(pipeline_id))
            .join(OFFSET_FILE_NAME);
        Self { provider, path }
    }

    /// Store for `pipeline_id` on the local filesystem under `data_dir`
    pub fn for_data_dir(data_dir: &Path, pipeline_id: &str) -> Self {
        Self::new(Arc::new(LocalStorageProvider::new(data_dir.to_path_buf())), pipeline_id)
    }

    /// Offset file path, relative to the provider's base
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OffsetStore for FileOffsetStore {
    fn load(&self) -> Result<String> {
        if !self.provider.exists(&self.path) {
            return Ok(String::new());
        }
        let content = self.provider.read_to_string(&self.path)?;
        let file: OffsetFile = serde_json::from_str(&content).map_err(|e| StorageSystemError::DeserializationError {
            format: "json".to_string(),
            path: self.path.clone(),
            source: Box::new(e),
        })?;
        if file.version != OFFSET_FILE_VERSION {
            log::warn!(
                "Offset file {} has version {}, expected {}",
                self.path.display(),
                file.version,
                OFFSET_FILE_VERSION
            );
        }
        Ok(file.offset)
    }

    fn save(&self, offset: &str) -> Result<()> {
        let file = OffsetFile {
            version: OFFSET_FILE_VERSION,
            offset: offset.to_string(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|e| StorageSystemError::SerializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })?;
        self.provider.write_string(&self.path, &content)
    }

    fn reset(&self) -> Result<()> {
        if self.provider.exists(&self.path) {
            self.provider.remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Pipeline ids become directory names; keep them to a single safe component
fn sanitize_pipeline_id(pipeline_id: &str) -> String {
    let sanitized: String = pipeline_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        sanitized
    }
}
