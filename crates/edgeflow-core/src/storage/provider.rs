use std::fmt::Debug;
use std::path::Path;
use crate::kernel::error::Result;

/// Trait for storage providers that hold runtime state (offsets) and
/// pipeline definitions
pub trait StorageProvider: Send + Sync + Debug {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Read a file to a string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write a string to a file, replacing it atomically
    fn write_string(&self, path: &Path, contents: &str) -> Result<()>;

    /// Write bytes to a file, replacing it atomically
    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Remove a file
    fn remove_file(&self, path: &Path) -> Result<()>;
}
