use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::services::list_sync::ListSyncError;
use crate::services::recommendations::RecommendationError;
use crate::services::sync::SyncError;
use crate::state::SharedState;

pub type SchedulerState = Arc<SharedState>;

pub struct Scheduler {
    state: SchedulerState,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Period of the recommendation refresh; zero hours disables it.
fn refresh_period(hours: u32) -> Option<Duration> {
    (hours > 0).then(|| Duration::from_secs(u64::from(hours) * 60 * 60))
}

/// Media sync followed by list sync, as one scheduled job.
async fn sync_cycle(state: &SharedState) {
    let start = Instant::now();
    info!(event = "job_started", job_name = "media_sync", "Starting scheduled media sync");

    match state.media_sync.run(None).await {
        Ok(stats) => info!(
            event = "job_finished",
            job_name = "media_sync",
            duration_ms = elapsed_ms(start),
            summary = %stats.summary(),
            "Scheduled media sync finished"
        ),
        Err(SyncError::AlreadyRunning) => {
            info!(job_name = "media_sync", "Media sync already running, skipping");
        }
        Err(e) => {
            error!(
                event = "job_failed",
                job_name = "media_sync",
                error = %e,
                "Scheduled media sync failed"
            );
        }
    }

    let start = Instant::now();
    info!(event = "job_started", job_name = "list_sync", "Starting scheduled list sync");

    match state.list_sync.run_all().await {
        Ok(summary) => info!(
            event = "job_finished",
            job_name = "list_sync",
            duration_ms = elapsed_ms(start),
            synced = summary.synced,
            failed = summary.failed,
            "Scheduled list sync finished"
        ),
        Err(ListSyncError::AlreadyRunning) => {
            info!(job_name = "list_sync", "List sync already running, skipping");
        }
        Err(e) => {
            error!(
                event = "job_failed",
                job_name = "list_sync",
                error = %e,
                "Scheduled list sync failed"
            );
        }
    }
}

async fn refresh_recommendations(state: &SharedState) {
    let start = Instant::now();
    info!(
        event = "job_started",
        job_name = "recommendations",
        "Starting scheduled recommendation refresh"
    );

    match state.recommendations.refresh().await {
        Ok(outcome) => info!(
            event = "job_finished",
            job_name = "recommendations",
            duration_ms = elapsed_ms(start),
            count = outcome.count,
            source = %outcome.source,
            "Scheduled recommendation refresh finished"
        ),
        Err(RecommendationError::NoProvider) => {
            debug!(job_name = "recommendations", "No recommendation provider configured");
        }
        Err(RecommendationError::AlreadyRunning) => {
            info!(job_name = "recommendations", "Recommendation refresh already running, skipping");
        }
        Err(e) => {
            error!(
                event = "job_failed",
                job_name = "recommendations",
                error = %e,
                "Scheduled recommendation refresh failed"
            );
        }
    }
}

impl Scheduler {
    pub fn new(state: SchedulerState, config: SchedulerConfig) -> Self {
        Self {
            state,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        let cron_expr = self
            .config
            .cron_expression
            .as_deref()
            .filter(|c| !c.trim().is_empty());
        if let Some(cron_expr) = cron_expr {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let sync_job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let state = Arc::clone(&state);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                sync_cycle(&state).await;
            })
        })?;
        sched.add(sync_job).await?;
        info!("Scheduler running with cron: {}", cron_expr);

        let refresh_hours = self.config.recommendation_refresh_hours;
        if let Some(period) = refresh_period(refresh_hours) {
            let state = Arc::clone(&self.state);
            let running = Arc::clone(&self.running);
            let refresh_job = Job::new_repeated_async(period, move |_uuid, _lock| {
                let state = Arc::clone(&state);
                let running = Arc::clone(&running);
                Box::pin(async move {
                    if !*running.read().await {
                        return;
                    }
                    refresh_recommendations(&state).await;
                })
            })?;
            sched.add(refresh_job).await?;
            info!("Recommendation refresh scheduled every {}h", refresh_hours);
        }

        sched.start().await?;

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.sync_interval_minutes.max(1);
        let refresh_hours = self.config.recommendation_refresh_hours;

        info!(
            "Scheduler running: Sync every {}m, Recommendations every {}h",
            interval_mins, refresh_hours
        );

        let refresh_every = refresh_period(refresh_hours);
        let mut sync_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        // A disabled refresh still ticks hourly; the tick is ignored.
        let mut refresh_interval =
            interval(refresh_every.unwrap_or(Duration::from_secs(60 * 60)));

        loop {
            tokio::select! {
                _ = sync_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    sync_cycle(&self.state).await;
                }
                _ = refresh_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    if refresh_every.is_some() {
                        refresh_recommendations(&self.state).await;
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Media sync, list sync and recommendations, one after the other.
    pub async fn run_once(&self) -> Result<()> {
        info!("Running manual sync...");

        let stats = self.state.media_sync.run(None).await?;
        info!("Media sync: {}", stats.summary());

        let summary = self.state.list_sync.run_all().await?;
        info!(synced = summary.synced, failed = summary.failed, "List sync finished");

        match self.state.recommendations.refresh().await {
            Ok(outcome) => info!(
                count = outcome.count,
                source = %outcome.source,
                "Recommendations refreshed"
            ),
            Err(RecommendationError::NoProvider) => {
                debug!("No recommendation provider configured");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_period_follows_hours() {
        assert_eq!(refresh_period(0), None);
        assert_eq!(refresh_period(6), Some(Duration::from_secs(6 * 3600)));
        assert_eq!(refresh_period(36), Some(Duration::from_secs(36 * 3600)));
        assert_eq!(refresh_period(48), Some(Duration::from_secs(2 * 24 * 3600)));
    }
}
