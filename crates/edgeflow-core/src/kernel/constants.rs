/// Application name
pub const APP_NAME: &str = "edgeflow";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name of the stages bundled with the runtime and its plugins
pub const BASIC_LIBRARY: &str = "edgeflow-basic-lib";

/// Default maximum number of records per batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Default data directory (offsets) relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Directory under the data directory holding per-pipeline state
pub const PIPELINES_DIR: &str = "pipelines";

/// Offset file name inside a pipeline's state directory
pub const OFFSET_FILE_NAME: &str = "offset.json";

/// Version written into offset files
pub const OFFSET_FILE_VERSION: u32 = 1;
