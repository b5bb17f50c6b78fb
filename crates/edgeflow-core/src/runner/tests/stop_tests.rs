use std::time::Duration;

use crate::runner::stop::StopHandle;

#[test]
fn test_stop_handle_is_shared_between_clones() {
    let handle = StopHandle::new();
    let clone = handle.clone();

    assert!(!handle.is_stop_requested());
    clone.request_stop();
    assert!(handle.is_stop_requested());
}

#[tokio::test]
async fn test_stopped_resolves_immediately_when_already_requested() {
    let handle = StopHandle::new();
    handle.request_stop();

    tokio::time::timeout(Duration::from_millis(100), handle.stopped())
        .await
        .expect("stopped() should resolve");
}

#[tokio::test]
async fn test_stopped_wakes_waiting_task() {
    let handle = StopHandle::new();
    let waiter = handle.clone();

    let task = tokio::spawn(async move {
        waiter.stopped().await;
        true
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.request_stop();

    let woke = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("waiter should wake")
        .expect("task should not panic");
    assert!(woke);
}
