//! Registry of background command jobs

use quadlink_shared::{now_ms, CommandResult};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration for the job registry and its reaper
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// How long finished jobs stay queryable
    pub retention: Duration,
    /// How often the reaper sweeps
    pub check_interval: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(300),
            check_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Connect,
    Takeoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

/// A job as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: u64,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,
}

impl JobRecord {
    fn pending(job_id: u64, kind: JobKind) -> Self {
        Self {
            job_id,
            kind,
            status: JobStatus::Pending,
            created_at_ms: now_ms(),
            finished_at_ms: None,
            result: None,
        }
    }

    fn finish(&mut self, result: CommandResult) {
        self.status = if result.is_success() {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        self.finished_at_ms = Some(now_ms());
        self.result = Some(result);
    }

    /// Check if the job finished before `now_ms - retention`
    pub fn is_expired(&self, now_ms: u64, retention: Duration) -> bool {
        match self.finished_at_ms {
            Some(finished) => now_ms.saturating_sub(finished) >= retention.as_millis() as u64,
            None => false,
        }
    }
}

/// Tracks background jobs and their outcomes
pub struct JobRegistry {
    next_id: AtomicU64,
    jobs: Arc<RwLock<HashMap<u64, JobRecord>>>,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(config: &JobConfig) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention: config.retention,
        }
    }

    /// Run `work` in the background and return its pending record
    pub async fn spawn<F>(&self, kind: JobKind, work: F) -> JobRecord
    where
        F: Future<Output = CommandResult> + Send + 'static,
    {
        let job_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = JobRecord::pending(job_id, kind);
        self.jobs.write().await.insert(job_id, record.clone());
        info!("Job {} ({:?}) started", job_id, kind);

        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            let result = work.await;
            let mut jobs = jobs.write().await;
            if let Some(job) = jobs.get_mut(&job_id) {
                job.finish(result);
                info!("Job {} ({:?}) {:?}", job_id, job.kind, job.status);
            }
        });

        record
    }

    pub async fn get(&self, job_id: u64) -> Option<JobRecord> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Remove finished jobs past retention, returning their ids
    pub async fn cleanup_expired(&self) -> Vec<u64> {
        self.cleanup_expired_at(now_ms()).await
    }

    pub async fn cleanup_expired_at(&self, now_ms: u64) -> Vec<u64> {
        let mut jobs = self.jobs.write().await;
        let expired: Vec<u64> = jobs
            .values()
            .filter(|job| job.is_expired(now_ms, self.retention))
            .map(|job| job.job_id)
            .collect();

        for id in &expired {
            jobs.remove(id);
            debug!("Job {} reaped", id);
        }
        expired
    }
}
