//! Events broadcast on the event bus and streamed to SSE subscribers.

use serde::Serialize;

use super::{JobRunId, JobStatus, JobType};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    JobStarted {
        run_id: JobRunId,
        job_type: JobType,
    },
    JobProgress {
        run_id: JobRunId,
        job_type: JobType,
        processed: u32,
        total: u32,
        progress: u8,
    },
    JobFinished {
        run_id: JobRunId,
        job_type: JobType,
        status: JobStatus,
        message: Option<String>,
    },

    SyncUnitFinished {
        client: String,
        media_type: String,
        fetched: usize,
        created: usize,
        updated: usize,
        failed: usize,
    },
    SyncUnitFailed {
        client: String,
        media_type: String,
        error: String,
    },

    ListSyncFinished {
        name: String,
        added: usize,
        removed: usize,
        unmatched: usize,
    },

    RecommendationsUpdated {
        count: usize,
        source: String,
    },
}

impl NotificationEvent {
    /// Value of the `type` tag, also used as the SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "JobStarted",
            Self::JobProgress { .. } => "JobProgress",
            Self::JobFinished { .. } => "JobFinished",
            Self::SyncUnitFinished { .. } => "SyncUnitFinished",
            Self::SyncUnitFailed { .. } => "SyncUnitFailed",
            Self::ListSyncFinished { .. } => "ListSyncFinished",
            Self::RecommendationsUpdated { .. } => "RecommendationsUpdated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = NotificationEvent::JobProgress {
            run_id: JobRunId::new(3),
            job_type: JobType::MediaSync,
            processed: 1,
            total: 4,
            progress: 25,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "JobProgress");
        assert_eq!(json["payload"]["run_id"], 3);
        assert_eq!(json["payload"]["job_type"], "media_sync");
        assert_eq!(json["payload"]["progress"], 25);
        assert_eq!(json["type"], event.name());
    }
}
