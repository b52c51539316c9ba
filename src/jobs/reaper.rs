//! Periodic removal of finished jobs

use super::registry::JobRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

/// Sweeps the registry for jobs past retention
pub struct JobReaper {
    registry: Arc<JobRegistry>,
    check_interval: Duration,
}

impl JobReaper {
    pub fn new(registry: Arc<JobRegistry>, check_interval: Duration) -> Self {
        Self {
            registry,
            check_interval,
        }
    }

    /// Start the sweep loop; runs until the task is dropped
    pub async fn run(&self) {
        let mut ticker = interval(self.check_interval);

        loop {
            ticker.tick().await;

            let expired = self.registry.cleanup_expired().await;
            if !expired.is_empty() {
                debug!("Cleaned up {} expired jobs", expired.len());
            }
        }
    }
}
