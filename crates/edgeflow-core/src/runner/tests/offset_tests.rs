use std::sync::Arc;

use tempfile::tempdir;

use crate::kernel::error::{Error, Result};
use crate::runner::offset::{FileOffsetStore, MemoryOffsetStore, OffsetStore};
use crate::storage::error::StorageSystemError;
use crate::storage::{LocalStorageProvider, StorageProvider};

#[test]
fn test_memory_store_starts_empty_and_shares_state() -> Result<()> {
    let store = MemoryOffsetStore::new();
    let shared = store.clone();

    assert_eq!(store.load()?, "");
    shared.save("17")?;

    assert_eq!(store.load()?, "17");
    assert_eq!(store.save_count(), 1);

    store.reset()?;
    assert_eq!(shared.current(), "");
    Ok(())
}

#[test]
fn test_memory_store_with_offset() -> Result<()> {
    let store = MemoryOffsetStore::with_offset("{\"/var/log/app.log\":120}");
    assert_eq!(store.load()?, "{\"/var/log/app.log\":120}");
    assert_eq!(store.save_count(), 0);
    Ok(())
}

#[test]
fn test_file_store_missing_file_loads_empty() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let store = FileOffsetStore::for_data_dir(temp_dir.path(), "tail-pipeline");

    assert_eq!(store.load()?, "");
    Ok(())
}

#[test]
fn test_file_store_round_trip_and_layout() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let store = FileOffsetStore::for_data_dir(temp_dir.path(), "tail-pipeline");

    store.save("{\"/var/log/app.log\":4096}")?;

    let on_disk = temp_dir.path().join("pipelines").join("tail-pipeline").join("offset.json");
    assert!(on_disk.is_file(), "offset file should exist at {}", on_disk.display());
    let content: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&on_disk).expect("read offset file")).expect("valid json");
    assert_eq!(content["version"], serde_json::json!(1));
    assert_eq!(content["offset"], serde_json::json!("{\"/var/log/app.log\":4096}"));

    let reopened = FileOffsetStore::for_data_dir(temp_dir.path(), "tail-pipeline");
    assert_eq!(reopened.load()?, "{\"/var/log/app.log\":4096}");
    Ok(())
}

#[test]
fn test_file_store_reset_removes_file() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let store = FileOffsetStore::for_data_dir(temp_dir.path(), "p1");

    store.reset()?;
    store.save("3")?;
    store.reset()?;

    assert_eq!(store.load()?, "");
    assert!(!temp_dir.path().join("pipelines/p1/offset.json").exists());
    Ok(())
}

#[test]
fn test_file_store_sanitizes_pipeline_id() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(temp_dir.path().to_path_buf()));

    let store = FileOffsetStore::new(provider.clone(), "../escape/me");
    assert_eq!(store.path(), std::path::Path::new("pipelines/.._escape_me/offset.json"));

    let dots = FileOffsetStore::new(provider, "..");
    assert_eq!(dots.path(), std::path::Path::new("pipelines/_/offset.json"));
}

#[test]
fn test_file_store_corrupt_file_is_an_error() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());
    provider
        .write_string(std::path::Path::new("pipelines/p2/offset.json"), "not json")
        .expect("write corrupt file");

    let store = FileOffsetStore::for_data_dir(temp_dir.path(), "p2");
    let err = store.load().unwrap_err();

    assert!(matches!(
        err,
        Error::StorageSystem(StorageSystemError::DeserializationError { .. })
    ));
}
