use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Cooperative stop signal shared between a pipeline runner, its stages and
/// whoever manages the pipeline
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pipeline to stop after the current cycle
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        loop {
            // Register before checking the flag so a concurrent request_stop is not missed
            let notified = self.notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}
