use std::path::PathBuf;
use tempfile::tempdir;

use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;
use crate::storage::local::LocalStorageProvider;

// Helper function to create PathBuf from str for tests
fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn test_write_and_read_string() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.write_string(&p("state.json"), "{\"offset\":\"42\"}")?;
    let retrieved = provider.read_to_string(&p("state.json"))?;

    assert_eq!(retrieved, "{\"offset\":\"42\"}");
    assert!(provider.is_file(&p("state.json")));
    Ok(())
}

#[test]
fn test_write_creates_parent_directories() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    let nested = p("pipelines/tail/offset.json");
    provider.write_bytes(&nested, b"data")?;

    assert!(temp_dir.path().join("pipelines/tail").is_dir());
    assert_eq!(provider.read_to_string(&nested)?, "data");
    Ok(())
}

#[test]
fn test_overwrite_replaces_contents() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.write_string(&p("offset"), "first")?;
    provider.write_string(&p("offset"), "second")?;

    assert_eq!(provider.read_to_string(&p("offset"))?, "second");
    // Only the target file remains, no leftover temp files
    let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
    assert_eq!(entries, 1);
    Ok(())
}

#[test]
fn test_remove_file() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.write_string(&p("test.key"), "x")?;
    assert!(provider.exists(&p("test.key")), "Data should exist after writing");

    provider.remove_file(&p("test.key"))?;
    assert!(!provider.exists(&p("test.key")), "Data should not exist after deletion");
    Ok(())
}

#[test]
fn test_read_missing_file_reports_path() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    let result = provider.read_to_string(&p("missing.json"));
    match result {
        Err(Error::StorageSystem(StorageSystemError::Io { path, operation, .. })) => {
            assert_eq!(operation, "read_to_string");
            assert!(path.ends_with("missing.json"));
        }
        other => panic!("Expected Io error, got {:?}", other),
    }
}

#[test]
fn test_absolute_paths_bypass_base() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let other_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    let absolute = other_dir.path().join("abs.txt");
    provider.write_string(&absolute, "abs")?;

    assert_eq!(std::fs::read_to_string(&absolute).unwrap(), "abs");
    Ok(())
}
