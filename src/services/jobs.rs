//! Job run bookkeeping shared by the sync, list sync and recommendation jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::db::{JobRun, Store};
use crate::domain::events::NotificationEvent;
use crate::domain::{JobRunId, JobStatus, JobType};

/// Persists one `job_runs` row and broadcasts every transition.
#[derive(Clone)]
pub struct JobTracker {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
    run_id: i32,
    job_type: JobType,
}

impl JobTracker {
    pub async fn start(
        store: Store,
        event_bus: broadcast::Sender<NotificationEvent>,
        job_type: JobType,
    ) -> Result<(Self, JobRun)> {
        let run = store.create_job_run(job_type).await?;
        let tracker = Self {
            store,
            event_bus,
            run_id: run.id,
            job_type,
        };

        tracker.emit(NotificationEvent::JobStarted {
            run_id: tracker.id(),
            job_type,
        });
        Ok((tracker, run))
    }

    #[must_use]
    pub const fn id(&self) -> JobRunId {
        JobRunId::new(self.run_id)
    }

    fn emit(&self, event: NotificationEvent) {
        // No subscribers is fine.
        if self.event_bus.send(event).is_err() {
            debug!(run_id = self.run_id, "No event subscribers");
        }
    }

    pub async fn progress(&self, processed: u32, total: u32) {
        let progress = percent(processed, total);
        if let Err(e) = self
            .store
            .update_job_progress(self.run_id, processed, total, progress)
            .await
        {
            warn!(run_id = self.run_id, error = %e, "Failed to persist job progress");
        }

        self.emit(NotificationEvent::JobProgress {
            run_id: self.id(),
            job_type: self.job_type,
            processed,
            total,
            progress,
        });
    }

    pub async fn complete(&self, message: impl Into<String>) -> Result<()> {
        self.finish(JobStatus::Completed, Some(message.into())).await
    }

    pub async fn fail(&self, error: impl std::fmt::Display) -> Result<()> {
        self.finish(JobStatus::Failed, Some(error.to_string())).await
    }

    async fn finish(&self, status: JobStatus, message: Option<String>) -> Result<()> {
        self.store
            .finish_job_run(self.run_id, status, message.as_deref())
            .await?;

        self.emit(NotificationEvent::JobFinished {
            run_id: self.id(),
            job_type: self.job_type,
            status,
            message,
        });
        Ok(())
    }
}

/// Single-flight flag of a job, released on drop.
pub(crate) struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    pub(crate) fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Whole-number percentage, 100 for an empty job.
#[must_use]
pub fn percent(processed: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (u64::from(processed.min(total)) * 100) / u64::from(total);
    u8::try_from(pct).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(5, 4), 100);
    }

    #[test]
    fn test_run_guard_is_single_flight() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = RunGuard::try_acquire(&flag).unwrap();
        assert!(RunGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(RunGuard::try_acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn test_tracker_persists_and_broadcasts() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let (tx, mut rx) = broadcast::channel(16);

        let (tracker, run) = JobTracker::start(store.clone(), tx, JobType::ListSync)
            .await
            .unwrap();
        tracker.progress(1, 2).await;
        tracker.complete("2 lists").await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), NotificationEvent::JobStarted { .. }));
        match rx.recv().await.unwrap() {
            NotificationEvent::JobProgress { progress, .. } => assert_eq!(progress, 50),
            other => panic!("unexpected event {other:?}"),
        }
        match rx.recv().await.unwrap() {
            NotificationEvent::JobFinished { status, message, .. } => {
                assert_eq!(status, JobStatus::Completed);
                assert_eq!(message.as_deref(), Some("2 lists"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let stored = store.get_job_run(run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.processed, 1);
    }
}
