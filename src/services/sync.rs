//! The media sync job: pulls every configured server's library into the
//! unified repository.
//!
//! A run walks (client, media type) units one after another. Each unit fetches
//! the vendor items, matches them against the stored items of that type,
//! merges-and-overwrites or inserts, and finally drops source links the
//! server no longer reports. A failing unit is logged and skipped.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::clients::{ClientError, ClientFactory, MediaClient};
use crate::config::Config;
use crate::db::{JobRun, Store};
use crate::domain::JobType;
use crate::domain::events::NotificationEvent;
use crate::matching::{MatchOptions, find_best_match};
use crate::models::{ClientRecord, MediaData, MediaItem, MediaType, Movie, Series};
use crate::services::jobs::{JobTracker, RunGuard};
use crate::services::metadata::MetadataService;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A media sync is already running")]
    AlreadyRunning,

    #[error("Client not found: {0}")]
    ClientNotFound(i32),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Counters for one (client, media type) unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnitStats {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub pruned: u64,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub clients: usize,
    pub units: u32,
    pub failed_units: u32,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub pruned: u64,
    pub enriched: usize,
    pub orphans_deleted: u64,
}

impl SyncStats {
    fn add(&mut self, unit: &UnitStats) {
        self.fetched += unit.fetched;
        self.created += unit.created;
        self.updated += unit.updated;
        self.unchanged += unit.unchanged;
        self.failed += unit.failed;
        self.pruned += unit.pruned;
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} clients, {}/{} units ok: {} fetched, {} created, {} updated, \
             {} unchanged, {} failed",
            self.clients,
            self.units - self.failed_units,
            self.units,
            self.fetched,
            self.created,
            self.updated,
            self.unchanged,
            self.failed
        )
    }
}

pub struct MediaSyncJob {
    store: Store,
    config: Arc<RwLock<Config>>,
    factory: Arc<dyn ClientFactory>,
    metadata: Arc<MetadataService>,
    event_bus: broadcast::Sender<NotificationEvent>,
    running: Arc<AtomicBool>,
}

impl MediaSyncJob {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<RwLock<Config>>,
        factory: Arc<dyn ClientFactory>,
        metadata: Arc<MetadataService>,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            store,
            config,
            factory,
            metadata,
            event_bus,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<RunGuard, SyncError> {
        RunGuard::try_acquire(&self.running).ok_or(SyncError::AlreadyRunning)
    }

    /// Runs a sync to completion. `client_id` restricts it to one client.
    pub async fn run(&self, client_id: Option<i32>) -> Result<SyncStats, SyncError> {
        let _guard = self.acquire()?;
        let (tracker, _, clients) = self.start(client_id).await?;
        self.execute(&tracker, clients).await
    }

    /// Starts a sync in the background and returns its job run.
    pub async fn trigger(self: &Arc<Self>, client_id: Option<i32>) -> Result<JobRun, SyncError> {
        let guard = self.acquire()?;
        let (tracker, run, clients) = self.start(client_id).await?;

        let job = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = job.execute(&tracker, clients).await {
                warn!(error = %e, "Background media sync failed");
            }
        });

        Ok(run)
    }

    /// Records the job run, then resolves its clients. A run whose clients
    /// cannot be loaded is stored as failed.
    async fn start(
        &self,
        client_id: Option<i32>,
    ) -> Result<(JobTracker, JobRun, Vec<ClientRecord>), SyncError> {
        let (tracker, run) =
            JobTracker::start(self.store.clone(), self.event_bus.clone(), JobType::MediaSync)
                .await?;

        match self.load_clients(client_id).await {
            Ok(clients) => Ok((tracker, run, clients)),
            Err(e) => {
                warn!(event = "media_sync_failed", error = %e, "Media sync failed");
                if let Err(db) = tracker.fail(&e).await {
                    warn!(error = %db, "Failed to record media sync failure");
                }
                metrics::counter!("sync_runs_total", "status" => "failed").increment(1);
                Err(e)
            }
        }
    }

    async fn load_clients(&self, client_id: Option<i32>) -> Result<Vec<ClientRecord>, SyncError> {
        match client_id {
            Some(id) => {
                let record = self
                    .store
                    .get_client(id)
                    .await?
                    .ok_or(SyncError::ClientNotFound(id))?;
                Ok(vec![record])
            }
            None => Ok(self.store.list_enabled_clients().await?),
        }
    }

    async fn execute(
        &self,
        tracker: &JobTracker,
        clients: Vec<ClientRecord>,
    ) -> Result<SyncStats, SyncError> {
        let start = std::time::Instant::now();
        let result = self.sync_all(tracker, clients).await;

        let status = match &result {
            Ok(stats) => {
                info!(
                    event = "media_sync_finished",
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    created = stats.created,
                    updated = stats.updated,
                    failed_units = stats.failed_units,
                    "Media sync finished"
                );
                if let Err(e) = tracker.complete(stats.summary()).await {
                    warn!(error = %e, "Failed to record media sync completion");
                }
                "completed"
            }
            Err(e) => {
                warn!(event = "media_sync_failed", error = %e, "Media sync failed");
                if let Err(db) = tracker.fail(e).await {
                    warn!(error = %db, "Failed to record media sync failure");
                }
                "failed"
            }
        };
        metrics::counter!("sync_runs_total", "status" => status).increment(1);

        result
    }

    async fn sync_all(
        &self,
        tracker: &JobTracker,
        records: Vec<ClientRecord>,
    ) -> Result<SyncStats, SyncError> {
        let config = self.config.read().await.sync.clone();
        let opts = MatchOptions::from(&config);

        let mut clients: Vec<(Arc<dyn MediaClient>, Vec<MediaType>)> = Vec::new();
        for record in &records {
            match self.factory.build(record) {
                Ok(client) => {
                    let types = client
                        .supported_types()
                        .iter()
                        .copied()
                        .filter(|t| config.media_types.contains(t))
                        .collect();
                    clients.push((client, types));
                }
                Err(e) => {
                    warn!(client = %record.name, error = %e, "Skipping misconfigured client");
                }
            }
        }

        let total: u32 = clients
            .iter()
            .map(|(_, types)| u32::try_from(types.len()).unwrap_or(u32::MAX))
            .sum();
        let mut stats = SyncStats {
            clients: clients.len(),
            units: total,
            ..Default::default()
        };
        let mut processed = 0;
        tracker.progress(processed, total).await;

        for (idx, (client, types)) in clients.iter().enumerate() {
            if idx > 0 && config.client_delay_seconds > 0 {
                tokio::time::sleep(Duration::from_secs(config.client_delay_seconds)).await;
            }

            let mut any_ok = false;
            for &media_type in types {
                info!(client = %client.name(), %media_type, "Syncing unit");
                match self.sync_unit(client.as_ref(), media_type, &opts).await {
                    Ok(unit) => {
                        any_ok = true;
                        stats.add(&unit);
                        record_unit_metrics(&unit);
                        let _ = self.event_bus.send(NotificationEvent::SyncUnitFinished {
                            client: client.name().to_string(),
                            media_type: media_type.to_string(),
                            fetched: unit.fetched,
                            created: unit.created,
                            updated: unit.updated,
                            failed: unit.failed,
                        });
                    }
                    Err(e) => {
                        stats.failed_units += 1;
                        warn!(client = %client.name(), %media_type, error = %e, "Sync unit failed");
                        let _ = self.event_bus.send(NotificationEvent::SyncUnitFailed {
                            client: client.name().to_string(),
                            media_type: media_type.to_string(),
                            error: e.to_string(),
                        });
                    }
                }

                processed += 1;
                tracker.progress(processed, total).await;
            }

            if any_ok && let Err(e) = self.store.touch_client_synced(client.client_id()).await {
                warn!(client = %client.name(), error = %e, "Failed to mark client synced");
            }
        }

        if config.enrich_with_tmdb && self.metadata.is_enabled().await {
            stats.enriched = self.enrich(config.enrich_limit).await;
        }

        if config.delete_orphans {
            stats.orphans_deleted = self.store.delete_orphans().await?;
            if stats.orphans_deleted > 0 {
                info!(count = stats.orphans_deleted, "Deleted media items no client reports");
            }
        }

        Ok(stats)
    }

    async fn sync_unit(
        &self,
        client: &dyn MediaClient,
        media_type: MediaType,
        opts: &MatchOptions,
    ) -> Result<UnitStats, SyncError> {
        let id = client.client_id();
        match media_type {
            MediaType::Movie => self.sync_items(id, client.movies().await?, opts).await,
            MediaType::Series => self.sync_items(id, client.series().await?, opts).await,
            MediaType::Episode => self.sync_items(id, client.episodes().await?, opts).await,
            MediaType::Artist => self.sync_items(id, client.artists().await?, opts).await,
            MediaType::Album => self.sync_items(id, client.albums().await?, opts).await,
            MediaType::Track => self.sync_items(id, client.tracks().await?, opts).await,
            MediaType::Playlist => self.sync_items(id, client.playlists().await?, opts).await,
            MediaType::Collection => self.sync_items(id, client.collections().await?, opts).await,
        }
    }

    async fn sync_items<T: MediaData>(
        &self,
        client_id: i32,
        fetched: Vec<MediaItem<T>>,
        opts: &MatchOptions,
    ) -> Result<UnitStats, SyncError> {
        let mut library: Vec<MediaItem<T>> = self.store.items_of_type().await?;
        let mut seen = HashSet::new();
        let mut stats = UnitStats {
            fetched: fetched.len(),
            ..Default::default()
        };

        for mut item in fetched {
            if let Some(source) = item.source_for(client_id) {
                seen.insert(source.to_string());
            }

            match find_best_match(&item, &library, opts) {
                Some((idx, _)) => {
                    let existing = &mut library[idx];
                    if !existing.merge_from(&item) {
                        stats.unchanged += 1;
                        continue;
                    }
                    match self.store.upsert_item(existing).await {
                        Ok(_) => stats.updated += 1,
                        Err(e) => {
                            stats.failed += 1;
                            let title = &existing.title;
                            warn!(%title, error = %e, "Failed to update media item");
                        }
                    }
                }
                None => {
                    item.id = None;
                    match self.store.upsert_item(&item).await {
                        Ok(outcome) => {
                            item.id = Some(outcome.id);
                            library.push(item);
                            stats.created += 1;
                        }
                        Err(e) => {
                            stats.failed += 1;
                            warn!(title = %item.title, error = %e, "Failed to store media item");
                        }
                    }
                }
            }
        }

        stats.pruned = self
            .store
            .prune_sources(client_id, T::MEDIA_TYPE, &seen)
            .await?;

        Ok(stats)
    }

    /// Best-effort TMDB lookup for movies and series without a TMDB id.
    /// Every looked up item is stamped, so runs rotate through the backlog
    /// instead of retrying the same unmatched titles.
    async fn enrich(&self, limit: usize) -> usize {
        let mut enriched = 0;
        let mut attempted = Vec::new();

        let movie_budget = u64::try_from(limit.div_ceil(2)).unwrap_or(u64::MAX);
        match self.store.enrichment_candidates::<Movie>(movie_budget).await {
            Ok(movies) => {
                for mut movie in movies {
                    attempted.extend(movie.id);
                    match self.metadata.enrich_movie(&mut movie).await {
                        Ok(true) => enriched += self.save_enriched(&movie).await,
                        Ok(false) => {}
                        Err(e) => warn!(title = %movie.title, error = %e, "TMDB enrichment failed"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to load movies for enrichment"),
        }

        let series_budget = u64::try_from(limit.saturating_sub(attempted.len())).unwrap_or(0);
        match self.store.enrichment_candidates::<Series>(series_budget).await {
            Ok(series) => {
                for mut show in series {
                    attempted.extend(show.id);
                    match self.metadata.enrich_series(&mut show).await {
                        Ok(true) => enriched += self.save_enriched(&show).await,
                        Ok(false) => {}
                        Err(e) => warn!(title = %show.title, error = %e, "TMDB enrichment failed"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to load series for enrichment"),
        }

        if let Err(e) = self.store.mark_enrich_attempted(&attempted).await {
            warn!(error = %e, "Failed to record enrichment attempts");
        }
        enriched
    }

    async fn save_enriched<T: MediaData>(&self, item: &MediaItem<T>) -> usize {
        match self.store.upsert_item(item).await {
            Ok(_) => 1,
            Err(e) => {
                warn!(title = %item.title, error = %e, "Failed to store enriched media item");
                0
            }
        }
    }
}

fn record_unit_metrics(unit: &UnitStats) {
    for (outcome, count) in [
        ("created", unit.created),
        ("updated", unit.updated),
        ("unchanged", unit.unchanged),
        ("failed", unit.failed),
    ] {
        metrics::counter!("sync_items_total", "outcome" => outcome)
            .increment(u64::try_from(count).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientKind, ServerInfo};
    use crate::domain::JobStatus;
    use crate::models::{Album, ClientInput, Track};
    use async_trait::async_trait;

    struct FakeClient {
        id: i32,
        types: &'static [MediaType],
        movies: Vec<MediaItem<Movie>>,
        tracks: Vec<MediaItem<Track>>,
    }

    #[async_trait]
    impl MediaClient for FakeClient {
        fn kind(&self) -> ClientKind {
            ClientKind::Jellyfin
        }
        fn name(&self) -> &str {
            "fake"
        }
        fn client_id(&self) -> i32 {
            self.id
        }
        fn supported_types(&self) -> &'static [MediaType] {
            self.types
        }
        async fn test_connection(&self) -> Result<ServerInfo, ClientError> {
            Ok(ServerInfo {
                name: "fake".into(),
                version: None,
                id: None,
            })
        }
        async fn movies(&self) -> Result<Vec<MediaItem<Movie>>, ClientError> {
            Ok(self.movies.clone())
        }
        async fn albums(&self) -> Result<Vec<MediaItem<Album>>, ClientError> {
            Err(ClientError::Status {
                service: "fake",
                status: 500,
                body: "boom".into(),
            })
        }
        async fn tracks(&self) -> Result<Vec<MediaItem<Track>>, ClientError> {
            Ok(self.tracks.clone())
        }
    }

    fn intro(client_id: i32, item_id: &str, album: &str) -> MediaItem<Track> {
        let mut track = MediaItem::new(
            "Intro",
            Track {
                artist: Some("The xx".into()),
                album: Some(album.into()),
                ..Default::default()
            },
        )
        .with_source(client_id, item_id);
        track.year = Some(2009);
        track
    }

    struct FakeFactory;

    impl ClientFactory for FakeFactory {
        fn build(&self, record: &ClientRecord) -> Result<Arc<dyn MediaClient>, ClientError> {
            if record.name == "music" {
                return Ok(Arc::new(FakeClient {
                    id: record.id,
                    types: &[MediaType::Track],
                    movies: Vec::new(),
                    tracks: vec![
                        intro(record.id, "t1", "xx"),
                        intro(record.id, "t2", "Coexist"),
                    ],
                }));
            }

            let mut matrix = MediaItem::new("The Matrix", Movie::default())
                .with_source(record.id, format!("{}-matrix", record.name));
            matrix.year = Some(1999);
            if record.name == "b" {
                matrix.title = "Matrix".into();
                matrix.external_ids.imdb = Some("tt0133093".into());
            }
            let heat = MediaItem::new("Heat", Movie::default())
                .with_source(record.id, format!("{}-heat", record.name));

            Ok(Arc::new(FakeClient {
                id: record.id,
                types: &[MediaType::Movie, MediaType::Album],
                movies: vec![matrix, heat],
                tracks: Vec::new(),
            }))
        }
    }

    async fn job_with_clients(names: &[&str]) -> (MediaSyncJob, Store) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        for name in names {
            store
                .create_client(&ClientInput {
                    name: (*name).into(),
                    kind: ClientKind::Jellyfin,
                    base_url: "http://localhost".into(),
                    api_key: Some("k".into()),
                    username: None,
                    password: None,
                    user_id: None,
                    enabled: true,
                })
                .await
                .unwrap();
        }

        let config = Arc::new(RwLock::new(Config::default()));
        let (tx, _) = broadcast::channel(64);
        let metadata = Arc::new(MetadataService::new(config.clone(), reqwest::Client::new()));
        let job = MediaSyncJob::new(store.clone(), config, Arc::new(FakeFactory), metadata, tx);
        (job, store)
    }

    #[tokio::test]
    async fn test_sync_merges_items_across_clients() {
        let (job, store) = job_with_clients(&["a", "b"]).await;

        let stats = job.run(None).await.unwrap();
        assert_eq!(stats.units, 4);
        assert_eq!(stats.failed_units, 2);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.updated, 2);

        let movies: Vec<MediaItem<Movie>> = store.items_of_type().await.unwrap();
        assert_eq!(movies.len(), 2);
        let matrix = movies.iter().find(|m| m.year == Some(1999)).unwrap();
        assert_eq!(matrix.sources.len(), 2);
        assert_eq!(matrix.title, "Matrix");
        assert_eq!(matrix.external_ids.imdb.as_deref(), Some("tt0133093"));

        let run = store.latest_job_run(JobType::MediaSync).await.unwrap().unwrap();
        assert_eq!(run.status, JobStatus::Completed);
        assert_eq!(run.processed, 4);
        assert!(!job.is_running());
    }

    #[tokio::test]
    async fn test_second_run_is_unchanged() {
        let (job, _store) = job_with_clients(&["a"]).await;
        job.run(None).await.unwrap();
        let stats = job.run(None).await.unwrap();
        assert_eq!(stats.created, 0);
        assert_eq!(stats.unchanged, 2);
    }

    #[tokio::test]
    async fn test_same_titled_tracks_from_one_client_stay_separate() {
        let (job, store) = job_with_clients(&["music"]).await;

        let first = job.run(None).await.unwrap();
        assert_eq!(first.created, 2);
        let tracks: Vec<MediaItem<Track>> = store.items_of_type().await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.sources.len() == 1));

        let second = job.run(None).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.pruned, 0);
    }

    #[tokio::test]
    async fn test_unknown_client_and_concurrent_runs() {
        let (job, store) = job_with_clients(&["a"]).await;
        assert!(matches!(job.run(Some(99)).await, Err(SyncError::ClientNotFound(99))));
        assert!(!job.is_running());

        let run = store.latest_job_run(JobType::MediaSync).await.unwrap().unwrap();
        assert_eq!(run.status, JobStatus::Failed);
        assert!(run.message.unwrap_or_default().contains("99"));

        let _guard = job.acquire().unwrap();
        assert!(matches!(job.run(None).await, Err(SyncError::AlreadyRunning)));
    }
}
