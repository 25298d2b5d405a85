//! Playlist mirroring between servers.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::clients::{ClientError, ClientFactory, MediaClient};
use crate::config::Config;
use crate::db::{JobRun, ListSyncRecord, Store};
use crate::domain::JobType;
use crate::domain::events::NotificationEvent;
use crate::matching::{MatchOptions, find_best_match};
use crate::models::{AnyMediaItem, ListEntry, MediaType};
use crate::services::jobs::{JobTracker, RunGuard};

#[derive(Debug, Error)]
pub enum ListSyncError {
    #[error("A list sync is already running")]
    AlreadyRunning,

    #[error("Client not found: {0}")]
    ClientNotFound(i32),

    #[error("List '{0}' not found on the source client")]
    SourceListNotFound(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ListSyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Changes needed to make a target list mirror a source list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListSyncPlan {
    /// Target client item ids to append, in source order.
    pub to_add: Vec<String>,
    /// Target entry ids to remove.
    pub to_remove: Vec<String>,
    /// Titles of source entries the target library has no match for.
    pub unmatched: Vec<String>,
}

impl ListSyncPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub struct ListSyncHelper;

impl ListSyncHelper {
    /// Works out the additions and removals for one list.
    ///
    /// Source entries are matched against `target_library` (items fetched from
    /// the target client). Entries already on the target list are kept, target
    /// entries no source entry maps to are removed.
    #[must_use]
    pub fn plan(
        source_entries: &[ListEntry],
        target_library: &[AnyMediaItem],
        target_client_id: i32,
        target_entries: &[ListEntry],
        opts: &MatchOptions,
    ) -> ListSyncPlan {
        let mut plan = ListSyncPlan::default();
        let mut wanted: HashSet<String> = HashSet::new();
        let present: HashSet<&str> = target_entries.iter().map(|e| e.item_id.as_str()).collect();

        for entry in source_entries {
            let target_id = find_best_match(entry, target_library, opts)
                .and_then(|(idx, _)| target_library[idx].source_for(target_client_id));

            let Some(target_id) = target_id else {
                plan.unmatched.push(entry.title.clone());
                continue;
            };

            if wanted.insert(target_id.to_string()) && !present.contains(target_id) {
                plan.to_add.push(target_id.to_string());
            }
        }

        plan.to_remove = target_entries
            .iter()
            .filter(|e| !wanted.contains(&e.item_id))
            .map(|e| e.removal_id().to_string())
            .collect();

        plan
    }
}

/// Outcome of one list sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListSyncOutcome {
    pub added: usize,
    pub removed: usize,
    pub unmatched: usize,
    pub created_list: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListSyncSummary {
    pub synced: usize,
    pub failed: usize,
}

pub struct ListSyncService {
    store: Store,
    config: Arc<RwLock<Config>>,
    factory: Arc<dyn ClientFactory>,
    event_bus: broadcast::Sender<NotificationEvent>,
    running: Arc<AtomicBool>,
}

impl ListSyncService {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<RwLock<Config>>,
        factory: Arc<dyn ClientFactory>,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            store,
            config,
            factory,
            event_bus,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn acquire(&self) -> Result<RunGuard, ListSyncError> {
        RunGuard::try_acquire(&self.running).ok_or(ListSyncError::AlreadyRunning)
    }

    /// Syncs every enabled list sync, one after another.
    pub async fn run_all(&self) -> Result<ListSyncSummary, ListSyncError> {
        let _guard = self.acquire()?;
        let (tracker, _) =
            JobTracker::start(self.store.clone(), self.event_bus.clone(), JobType::ListSync).await?;
        self.execute(&tracker).await
    }

    pub async fn trigger(self: &Arc<Self>) -> Result<JobRun, ListSyncError> {
        let guard = self.acquire()?;
        let (tracker, run) =
            JobTracker::start(self.store.clone(), self.event_bus.clone(), JobType::ListSync).await?;

        let service = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = service.execute(&tracker).await {
                warn!(error = %e, "Background list sync failed");
            }
        });
        Ok(run)
    }

    async fn execute(&self, tracker: &JobTracker) -> Result<ListSyncSummary, ListSyncError> {
        let syncs = match self.store.list_enabled_list_syncs().await {
            Ok(syncs) => syncs,
            Err(e) => {
                let err = ListSyncError::from(e);
                let _ = tracker.fail(&err).await;
                return Err(err);
            }
        };

        let total = u32::try_from(syncs.len()).unwrap_or(u32::MAX);
        let mut summary = ListSyncSummary::default();
        let mut processed = 0;
        tracker.progress(processed, total).await;

        for sync in &syncs {
            match self.sync_one(sync).await {
                Ok(outcome) => {
                    summary.synced += 1;
                    info!(
                        list_sync = %sync.name,
                        added = outcome.added,
                        removed = outcome.removed,
                        unmatched = outcome.unmatched,
                        "List sync finished"
                    );
                    let _ = self.event_bus.send(NotificationEvent::ListSyncFinished {
                        name: sync.name.clone(),
                        added: outcome.added,
                        removed: outcome.removed,
                        unmatched: outcome.unmatched,
                    });
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(list_sync = %sync.name, error = %e, "List sync failed");
                }
            }
            processed += 1;
            tracker.progress(processed, total).await;
        }

        let message = format!("{} synced, {} failed", summary.synced, summary.failed);
        if let Err(e) = tracker.complete(message).await {
            warn!(error = %e, "Failed to record list sync completion");
        }
        Ok(summary)
    }

    async fn client(&self, id: i32) -> Result<Arc<dyn MediaClient>, ListSyncError> {
        let record = self
            .store
            .get_client(id)
            .await?
            .ok_or(ListSyncError::ClientNotFound(id))?;
        Ok(self.factory.build(&record)?)
    }

    pub async fn sync_one(&self, sync: &ListSyncRecord) -> Result<ListSyncOutcome, ListSyncError> {
        let opts = MatchOptions::from(&self.config.read().await.sync);
        let source = self.client(sync.source_client_id).await?;
        let target = self.client(sync.target_client_id).await?;

        let source_list = source
            .playlist(&sync.source_list_id)
            .await?
            .ok_or_else(|| ListSyncError::SourceListNotFound(sync.source_list_id.clone()))?;
        let source_entries = source_list.data.entries;

        let types: BTreeSet<MediaType> = source_entries.iter().map(|e| e.media_type).collect();
        let mut target_library = Vec::new();
        for media_type in &types {
            if target.supports(*media_type) {
                target_library.extend(target.fetch(*media_type).await?);
            }
        }

        let (target_list_id, target_entries) = match sync.target_list_id.as_deref() {
            Some(id) => match target.playlist(id).await? {
                Some(list) => (Some(id.to_string()), list.data.entries),
                None => {
                    warn!(list_sync = %sync.name, list_id = id, "Target list is gone, recreating");
                    (None, Vec::new())
                }
            },
            None => (None, Vec::new()),
        };

        let plan = ListSyncHelper::plan(
            &source_entries,
            &target_library,
            target.client_id(),
            &target_entries,
            &opts,
        );

        let mut outcome = ListSyncOutcome {
            unmatched: plan.unmatched.len(),
            ..Default::default()
        };

        match target_list_id.as_deref() {
            Some(list_id) => {
                if !plan.to_remove.is_empty() {
                    target.remove_from_playlist(list_id, &plan.to_remove).await?;
                    outcome.removed = plan.to_remove.len();
                }
                if !plan.to_add.is_empty() {
                    target.add_to_playlist(list_id, &plan.to_add).await?;
                    outcome.added = plan.to_add.len();
                }
            }
            None if plan.to_add.is_empty() => {
                info!(list_sync = %sync.name, "Nothing to create on the target yet");
            }
            None => {
                let media_type = dominant_type(&source_entries).unwrap_or(MediaType::Track);
                let list_id = target
                    .create_playlist(&source_list.title, media_type, &plan.to_add)
                    .await?;
                self.store.set_list_sync_target(sync.id, &list_id).await?;
                outcome.added = plan.to_add.len();
                outcome.created_list = Some(list_id);
            }
        }

        self.store.touch_list_sync(sync.id).await?;
        Ok(outcome)
    }
}

/// Most common media type among the entries; ties go to the first seen.
fn dominant_type(entries: &[ListEntry]) -> Option<MediaType> {
    let mut counts: Vec<(MediaType, usize)> = Vec::new();
    for entry in entries {
        match counts.iter_mut().find(|(t, _)| *t == entry.media_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((entry.media_type, 1)),
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(MediaType, usize)>, (t, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((t, n)),
        })
        .map(|(t, _)| t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalIds, MediaItem, Track};

    fn entry(entry_id: &str, item_id: &str, title: &str, artist: &str) -> ListEntry {
        ListEntry {
            entry_id: Some(entry_id.into()),
            item_id: item_id.into(),
            media_type: MediaType::Track,
            title: title.into(),
            year: None,
            artist: Some(artist.into()),
            external_ids: ExternalIds::default(),
        }
    }

    fn track(client_id: i32, id: &str, title: &str, artist: &str) -> AnyMediaItem {
        MediaItem::new(
            title,
            Track {
                artist: Some(artist.into()),
                ..Default::default()
            },
        )
        .with_source(client_id, id)
        .into()
    }

    #[test]
    fn test_plan_adds_removes_and_reports_unmatched() {
        let source = vec![
            entry("s1", "a1", "Yesterday", "The Beatles"),
            entry("s2", "a2", "Let It Be", "The Beatles"),
            entry("s3", "a3", "Unknown Song", "Nobody"),
            entry("s4", "a1", "Yesterday", "The Beatles"),
        ];
        let library = vec![
            track(2, "t1", "Yesterday", "Beatles"),
            track(2, "t2", "Let It Be", "The Beatles"),
            track(2, "t3", "Paranoid", "Black Sabbath"),
        ];
        let target = vec![
            entry("e1", "t1", "Yesterday", "Beatles"),
            entry("e3", "t3", "Paranoid", "Black Sabbath"),
        ];

        let plan = ListSyncHelper::plan(&source, &library, 2, &target, &MatchOptions::default());
        assert_eq!(plan.to_add, vec!["t2".to_string()]);
        assert_eq!(plan.to_remove, vec!["e3".to_string()]);
        assert_eq!(plan.unmatched, vec!["Unknown Song".to_string()]);
    }

    #[test]
    fn test_plan_respects_artist() {
        let source = vec![entry("s1", "a1", "Yesterday", "Some Cover Band")];
        let library = vec![track(2, "t1", "Yesterday", "The Beatles")];

        let plan = ListSyncHelper::plan(&source, &library, 2, &[], &MatchOptions::default());
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.unmatched.len(), 1);
    }

    #[test]
    fn test_plan_against_empty_target() {
        let source = vec![entry("s1", "a1", "Yesterday", "The Beatles")];
        let library = vec![track(2, "t1", "Yesterday", "The Beatles")];

        let plan = ListSyncHelper::plan(&source, &library, 2, &[], &MatchOptions::default());
        assert_eq!(plan.to_add, vec!["t1".to_string()]);
        assert!(plan.to_remove.is_empty());
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_dominant_type() {
        let mut movie = entry("1", "1", "Heat", "x");
        movie.media_type = MediaType::Movie;
        let entries = vec![
            movie,
            entry("2", "2", "a", "b"),
            entry("3", "3", "c", "d"),
        ];
        assert_eq!(dominant_type(&entries), Some(MediaType::Track));
        assert_eq!(dominant_type(&[]), None);
    }
}
