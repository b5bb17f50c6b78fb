use std::error::Error as StdError;
use std::path::PathBuf;

use crate::kernel::error::Error;
use crate::runner::error::RunnerError;
use crate::stage_manager::error::StageSystemError;
use crate::storage::error::StorageSystemError;

#[test]
fn test_subsystem_errors_convert() {
    let err: Error = StageSystemError::UnknownStage {
        library: "lib".to_string(),
        stage_name: "x".to_string(),
    }
    .into();
    assert!(matches!(err, Error::StageSystem(_)));
    assert!(err.to_string().contains("'x'"));

    let err: Error = StorageSystemError::FileNotFound(PathBuf::from("/missing")).into();
    assert!(matches!(err, Error::StorageSystem(_)));
}

#[test]
fn test_io_error_keeps_path_and_operation() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = Error::io(io, "open", PathBuf::from("/var/log/app.log"));

    match err {
        Error::StorageSystem(StorageSystemError::Io { path, operation, .. }) => {
            assert_eq!(path, PathBuf::from("/var/log/app.log"));
            assert_eq!(operation, "open");
        }
        other => panic!("Expected Io error, got {:?}", other),
    }
}

#[test]
fn test_stage_error_chains_source() {
    let cause = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    let err = Error::stage_with_source("tail", "cannot open file", cause);

    assert_eq!(err.to_string(), "Stage 'tail' failed: cannot open file");
    assert!(err.source().is_some());
    assert!(Error::stage("tail", "plain").source().is_none());
}

#[test]
fn test_runner_error_wraps_stage_error() {
    let err: Error = RunnerError::Production {
        instance: "tail".to_string(),
        source: Box::new(Error::stage("tail", "file vanished")),
    }
    .into();

    let message = err.to_string();
    assert!(message.contains("Origin 'tail' failed to produce a batch"));
    assert!(message.contains("file vanished"));
}
