//! In-memory job registry.
//!
//! Holds every accepted job with its cancellation sender. Jobs are archived
//! after settlement or refund but never removed.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::info;
use vgen_models::{JobId, JobStatus, JobStatusView, VideoJob};
use vgen_providers::CancelSignal;

use crate::error::{WorkerError, WorkerResult};

struct JobEntry {
    job: VideoJob,
    cancel: watch::Sender<bool>,
    /// Set once settlement has started; cancellation is refused from then on.
    settling: bool,
}

/// Service statistics derived from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub accepted: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    /// Completed share of finished jobs, 0.0 when nothing has finished
    pub success_rate: f64,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queued job and return the signal its units watch.
    pub async fn insert(&self, job: VideoJob) -> CancelSignal {
        let (cancel, signal) = watch::channel(false);
        self.jobs
            .write()
            .await
            .insert(
                job.id.clone(),
                JobEntry {
                    job,
                    cancel,
                    settling: false,
                },
            );
        signal
    }

    pub async fn get(&self, job_id: &JobId) -> Option<VideoJob> {
        self.jobs.read().await.get(job_id).map(|e| e.job.clone())
    }

    pub async fn view(&self, job_id: &JobId) -> Option<JobStatusView> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map(|e| JobStatusView::from_job(&e.job))
    }

    /// Apply `f` to a job under the write lock.
    pub async fn update<R>(&self, job_id: &JobId, f: impl FnOnce(&mut VideoJob) -> R) -> WorkerResult<R> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;
        Ok(f(&mut entry.job))
    }

    /// Signal cancellation. Returns `false` for a job already in a terminal
    /// state or one whose settlement has started.
    pub async fn cancel(&self, job_id: &JobId) -> WorkerResult<bool> {
        let jobs = self.jobs.read().await;
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;

        if entry.job.status.is_terminal() || entry.settling {
            return Ok(false);
        }
        entry.cancel.send_replace(true);
        info!(job_id = %job_id, status = %entry.job.status, "Cancellation requested");
        Ok(true)
    }

    /// Claim the job for settlement. Returns `false` if cancellation was
    /// already signalled; after a `true` return, `cancel` refuses the job.
    pub async fn begin_settlement(&self, job_id: &JobId) -> WorkerResult<bool> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;

        if *entry.cancel.borrow() {
            return Ok(false);
        }
        entry.settling = true;
        Ok(true)
    }

    pub async fn is_cancelled(&self, job_id: &JobId) -> bool {
        self.jobs
            .read()
            .await
            .get(job_id)
            .is_some_and(|e| *e.cancel.borrow())
    }

    /// Jobs not yet in a terminal state.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| !e.job.status.is_terminal())
            .count()
    }

    pub async fn stats(&self) -> JobStats {
        let jobs = self.jobs.read().await;
        let count = |status: JobStatus| jobs.values().filter(|e| e.job.status == status).count();
        let completed = count(JobStatus::Completed);
        let failed = count(JobStatus::Failed);
        let finished = completed + failed;

        JobStats {
            accepted: jobs.len(),
            active: jobs.len() - finished,
            completed,
            failed,
            success_rate: if finished == 0 {
                0.0
            } else {
                completed as f64 / finished as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> VideoJob {
        VideoJob::new("user-1", "prompt", 10, 2, 30)
    }

    #[tokio::test]
    async fn test_cancel_signals_until_terminal() {
        let registry = JobRegistry::new();
        let job = job();
        let id = job.id.clone();
        let signal = registry.insert(job).await;

        assert!(registry.cancel(&id).await.unwrap());
        assert!(*signal.borrow());
        assert!(registry.is_cancelled(&id).await);

        registry
            .update(&id, |job| job.fail("job cancelled"))
            .await
            .unwrap()
            .unwrap();
        assert!(!registry.cancel(&id).await.unwrap());
        assert!(matches!(
            registry.cancel(&JobId::from_string("missing")).await,
            Err(WorkerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_refused_once_settlement_begins() {
        let registry = JobRegistry::new();
        let job = job();
        let id = job.id.clone();
        let signal = registry.insert(job).await;

        assert!(registry.begin_settlement(&id).await.unwrap());
        assert!(!registry.cancel(&id).await.unwrap());
        assert!(!*signal.borrow());
        assert!(!registry.is_cancelled(&id).await);
    }

    #[tokio::test]
    async fn test_settlement_not_claimed_after_cancel() {
        let registry = JobRegistry::new();
        let job = job();
        let id = job.id.clone();
        registry.insert(job).await;

        assert!(registry.cancel(&id).await.unwrap());
        assert!(!registry.begin_settlement(&id).await.unwrap());
        assert!(matches!(
            registry.begin_settlement(&JobId::from_string("missing")).await,
            Err(WorkerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = JobRegistry::new();
        let done = job();
        let done_id = done.id.clone();
        registry.insert(done).await;
        registry.insert(job()).await;

        registry
            .update(&done_id, |job| {
                job.transition(JobStatus::Dispatching)?;
                job.fail("no scenes generated successfully")
            })
            .await
            .unwrap()
            .unwrap();

        let stats = registry.stats().await;
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(registry.active_count().await, 1);

        let view = registry.view(&done_id).await.unwrap();
        assert_eq!(view.error_message.as_deref(), Some("no scenes generated successfully"));
    }
}
