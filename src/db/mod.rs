use crate::domain::JobType;
use crate::models::{ClientInput, ClientRecord, MediaData, MediaItem, MediaType};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::job::JobRun;
pub use repositories::list_sync::{ListSyncInput, ListSyncRecord};
pub use repositories::media::{MediaFilter, StoredMediaItem, UpsertOutcome};
pub use repositories::recommendation::{NewRecommendation, Recommendation};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // Every pooled connection to an in-memory database sees its own empty
        // database, so those are pinned to a single connection.
        let in_memory = db_url.contains(":memory:");
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        if !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn client_repo(&self) -> repositories::client::ClientRepository {
        repositories::client::ClientRepository::new(self.conn.clone())
    }

    fn media_repo(&self) -> repositories::media::MediaRepository {
        repositories::media::MediaRepository::new(self.conn.clone())
    }

    fn job_repo(&self) -> repositories::job::JobRepository {
        repositories::job::JobRepository::new(self.conn.clone())
    }

    fn recommendation_repo(&self) -> repositories::recommendation::RecommendationRepository {
        repositories::recommendation::RecommendationRepository::new(self.conn.clone())
    }

    fn list_sync_repo(&self) -> repositories::list_sync::ListSyncRepository {
        repositories::list_sync::ListSyncRepository::new(self.conn.clone())
    }

    // ========== Clients ==========

    pub async fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        self.client_repo().list().await
    }

    pub async fn list_enabled_clients(&self) -> Result<Vec<ClientRecord>> {
        self.client_repo().list_enabled().await
    }

    pub async fn get_client(&self, id: i32) -> Result<Option<ClientRecord>> {
        self.client_repo().get(id).await
    }

    pub async fn get_client_by_name(&self, name: &str) -> Result<Option<ClientRecord>> {
        self.client_repo().get_by_name(name).await
    }

    pub async fn count_clients(&self) -> Result<u64> {
        self.client_repo().count().await
    }

    pub async fn create_client(&self, input: &ClientInput) -> Result<ClientRecord> {
        self.client_repo().create(input).await
    }

    pub async fn update_client(
        &self,
        id: i32,
        input: &ClientInput,
    ) -> Result<Option<ClientRecord>> {
        self.client_repo().update(id, input).await
    }

    pub async fn upsert_client_by_name(&self, input: &ClientInput) -> Result<ClientRecord> {
        self.client_repo().upsert_by_name(input).await
    }

    pub async fn touch_client_synced(&self, id: i32) -> Result<()> {
        self.client_repo().touch_synced(id).await
    }

    pub async fn delete_client(&self, id: i32) -> Result<bool> {
        self.client_repo().delete(id).await
    }

    // ========== Media ==========

    pub async fn list_items(&self, filter: &MediaFilter) -> Result<Vec<StoredMediaItem>> {
        self.media_repo().list(filter).await
    }

    pub async fn count_items(&self, filter: &MediaFilter) -> Result<u64> {
        self.media_repo().count(filter).await
    }

    pub async fn get_item(&self, id: i32) -> Result<Option<StoredMediaItem>> {
        self.media_repo().get(id).await
    }

    pub async fn items_of_type<T: MediaData>(&self) -> Result<Vec<MediaItem<T>>> {
        self.media_repo().items_of_type().await
    }

    pub async fn enrichment_candidates<T: MediaData>(
        &self,
        limit: u64,
    ) -> Result<Vec<MediaItem<T>>> {
        self.media_repo().enrichment_candidates(limit).await
    }

    pub async fn mark_enrich_attempted(&self, ids: &[i32]) -> Result<()> {
        self.media_repo().mark_enrich_attempted(ids).await
    }

    pub async fn recent_items(
        &self,
        types: &[MediaType],
        limit: u64,
    ) -> Result<Vec<StoredMediaItem>> {
        self.media_repo().recent(types, limit).await
    }

    pub async fn item_counts_by_type(&self) -> Result<HashMap<String, u64>> {
        self.media_repo().counts_by_type().await
    }

    pub async fn upsert_item<T: MediaData>(&self, item: &MediaItem<T>) -> Result<UpsertOutcome> {
        self.media_repo().upsert(item).await
    }

    pub async fn delete_item(&self, id: i32) -> Result<bool> {
        self.media_repo().delete(id).await
    }

    pub async fn prune_sources(
        &self,
        client_id: i32,
        media_type: MediaType,
        seen: &HashSet<String>,
    ) -> Result<u64> {
        self.media_repo()
            .prune_sources(client_id, media_type, seen)
            .await
    }

    pub async fn delete_orphans(&self) -> Result<u64> {
        self.media_repo().delete_orphans().await
    }

    // ========== Job Runs ==========

    pub async fn create_job_run(&self, job_type: JobType) -> Result<JobRun> {
        self.job_repo().create(job_type).await
    }

    pub async fn update_job_progress(
        &self,
        id: i32,
        processed: u32,
        total: u32,
        progress: u8,
    ) -> Result<()> {
        self.job_repo()
            .update_progress(id, processed, total, progress)
            .await
    }

    pub async fn finish_job_run(
        &self,
        id: i32,
        status: crate::domain::JobStatus,
        message: Option<&str>,
    ) -> Result<()> {
        self.job_repo().finish(id, status, message).await
    }

    pub async fn get_job_run(&self, id: i32) -> Result<Option<JobRun>> {
        self.job_repo().get(id).await
    }

    pub async fn list_job_runs(&self, limit: u64) -> Result<Vec<JobRun>> {
        self.job_repo().list(limit).await
    }

    pub async fn latest_job_run(&self, job_type: JobType) -> Result<Option<JobRun>> {
        self.job_repo().latest(job_type).await
    }

    pub async fn fail_stale_runs(&self) -> Result<u64> {
        self.job_repo().fail_stale().await
    }

    // ========== Recommendations ==========

    pub async fn replace_recommendations(&self, items: &[NewRecommendation]) -> Result<usize> {
        self.recommendation_repo().replace_all(items).await
    }

    pub async fn list_recommendations(&self, limit: u64) -> Result<Vec<Recommendation>> {
        self.recommendation_repo().list(limit).await
    }

    // ========== List Syncs ==========

    pub async fn list_list_syncs(&self) -> Result<Vec<ListSyncRecord>> {
        self.list_sync_repo().list().await
    }

    pub async fn list_enabled_list_syncs(&self) -> Result<Vec<ListSyncRecord>> {
        self.list_sync_repo().list_enabled().await
    }

    pub async fn get_list_sync(&self, id: i32) -> Result<Option<ListSyncRecord>> {
        self.list_sync_repo().get(id).await
    }

    pub async fn create_list_sync(&self, input: &ListSyncInput) -> Result<ListSyncRecord> {
        self.list_sync_repo().create(input).await
    }

    pub async fn set_list_sync_target(&self, id: i32, target_list_id: &str) -> Result<()> {
        self.list_sync_repo().set_target(id, target_list_id).await
    }

    pub async fn touch_list_sync(&self, id: i32) -> Result<()> {
        self.list_sync_repo().touch_synced(id).await
    }

    pub async fn delete_list_sync(&self, id: i32) -> Result<bool> {
        self.list_sync_repo().delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientKind;
    use crate::domain::JobStatus;
    use crate::models::{Album, Movie};

    async fn store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    fn client_input(name: &str) -> ClientInput {
        ClientInput {
            name: name.into(),
            kind: ClientKind::Jellyfin,
            base_url: "http://jf:8096".into(),
            api_key: Some("key".into()),
            username: None,
            password: None,
            user_id: None,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_client_crud_and_upsert_by_name() {
        let store = store().await;
        let created = store.create_client(&client_input("Living Room")).await.unwrap();
        assert_eq!(created.kind, ClientKind::Jellyfin);

        let mut changed = client_input("living room");
        changed.base_url = "http://jf2:8096".into();
        let upserted = store.upsert_client_by_name(&changed).await.unwrap();
        assert_eq!(upserted.id, created.id);
        assert_eq!(upserted.base_url, "http://jf2:8096");
        assert_eq!(store.count_clients().await.unwrap(), 1);

        store.touch_client_synced(created.id).await.unwrap();
        let fetched = store.get_client(created.id).await.unwrap().unwrap();
        assert!(fetched.last_synced_at.is_some());

        assert!(store.delete_client(created.id).await.unwrap());
        assert!(!store.delete_client(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_item_is_idempotent_on_sources() {
        let store = store().await;
        let client = store.create_client(&client_input("A")).await.unwrap();

        let mut movie = MediaItem::new("The Matrix", Movie::default()).with_source(client.id, "m1");
        movie.year = Some(1999);
        movie.genres = vec!["Action".into()];

        let first = store.upsert_item(&movie).await.unwrap();
        assert!(first.created);

        movie.id = Some(first.id);
        movie.overview = Some("Neo".into());
        let second = store.upsert_item(&movie).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);

        let items: Vec<MediaItem<Movie>> = store.items_of_type().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sources.len(), 1);
        assert_eq!(items[0].overview.as_deref(), Some("Neo"));
        assert_eq!(items[0].genres, vec!["Action".to_string()]);
    }

    #[tokio::test]
    async fn test_list_filters_and_counts() {
        let store = store().await;
        let a = store.create_client(&client_input("A")).await.unwrap();
        let b = store.create_client(&client_input("B")).await.unwrap();

        store
            .upsert_item(&MediaItem::new("The Matrix", Movie::default()).with_source(a.id, "1"))
            .await
            .unwrap();
        store
            .upsert_item(&MediaItem::new("Heat", Movie::default()).with_source(b.id, "2"))
            .await
            .unwrap();
        store
            .upsert_item(
                &MediaItem::new(
                    "Abbey Road",
                    Album {
                        artist: Some("The Beatles".into()),
                        track_count: None,
                    },
                )
                .with_source(b.id, "3"),
            )
            .await
            .unwrap();

        let movies = MediaFilter {
            media_type: Some(MediaType::Movie),
            ..Default::default()
        };
        assert_eq!(store.count_items(&movies).await.unwrap(), 2);

        let query = MediaFilter {
            query: Some("matrix".into()),
            ..Default::default()
        };
        let found = store.list_items(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "The Matrix");
        assert_eq!(found[0].sources[0].item_id, "1");

        let from_b = MediaFilter {
            client_id: Some(b.id),
            ..Default::default()
        };
        assert_eq!(store.count_items(&from_b).await.unwrap(), 2);

        let counts = store.item_counts_by_type().await.unwrap();
        assert_eq!(counts.get("movie"), Some(&2));
        assert_eq!(counts.get("album"), Some(&1));
    }

    #[tokio::test]
    async fn test_prune_sources_and_delete_orphans() {
        let store = store().await;
        let client = store.create_client(&client_input("A")).await.unwrap();

        for (title, id) in [("One", "1"), ("Two", "2")] {
            store
                .upsert_item(&MediaItem::new(title, Movie::default()).with_source(client.id, id))
                .await
                .unwrap();
        }

        let seen: HashSet<String> = ["1".to_string()].into_iter().collect();
        let pruned = store
            .prune_sources(client.id, MediaType::Movie, &seen)
            .await
            .unwrap();
        assert_eq!(pruned, 1);

        assert_eq!(store.delete_orphans().await.unwrap(), 1);
        let remaining: Vec<MediaItem<Movie>> = store.items_of_type().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "One");
    }

    #[tokio::test]
    async fn test_enrichment_candidates_rotate() {
        let store = store().await;
        let mut ids = Vec::new();
        for title in ["One", "Two", "Three"] {
            let stored = store.upsert_item(&MediaItem::new(title, Movie::default())).await;
            ids.push(stored.unwrap().id);
        }
        let mut known = MediaItem::new("Known", Movie::default());
        known.external_ids.tmdb = Some("603".into());
        store.upsert_item(&known).await.unwrap();

        let first: Vec<MediaItem<Movie>> = store.enrichment_candidates(2).await.unwrap();
        let titles: Vec<&str> = first.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["One", "Two"]);

        store.mark_enrich_attempted(&ids[..2]).await.unwrap();
        let next: Vec<MediaItem<Movie>> = store.enrichment_candidates(2).await.unwrap();
        let titles: Vec<&str> = next.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["Three", "One"]);
    }

    #[tokio::test]
    async fn test_job_runs_lifecycle() {
        let store = store().await;
        let run = store.create_job_run(JobType::MediaSync).await.unwrap();
        assert_eq!(run.status, JobStatus::Running);

        store.update_job_progress(run.id, 1, 4, 25).await.unwrap();
        let fetched = store.get_job_run(run.id).await.unwrap().unwrap();
        assert_eq!((fetched.processed, fetched.total, fetched.progress), (1, 4, 25));

        store
            .finish_job_run(run.id, JobStatus::Completed, Some("done"))
            .await
            .unwrap();
        let finished = store.latest_job_run(JobType::MediaSync).await.unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.progress, 100);
        assert!(finished.finished_at.is_some());

        let stale = store.create_job_run(JobType::ListSync).await.unwrap();
        assert_eq!(store.fail_stale_runs().await.unwrap(), 1);
        let failed = store.get_job_run(stale.id).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_recommendations_replace_all() {
        let store = store().await;
        let rec = |title: &str| NewRecommendation {
            title: title.into(),
            year: Some(2020),
            media_type: MediaType::Movie,
            reason: None,
            source: "tmdb".into(),
            tmdb_id: None,
            image_url: None,
        };

        store.replace_recommendations(&[rec("A"), rec("B")]).await.unwrap();
        store.replace_recommendations(&[rec("C")]).await.unwrap();

        let stored = store.list_recommendations(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "C");
    }

    #[tokio::test]
    async fn test_list_sync_target_and_cascade() {
        let store = store().await;
        let a = store.create_client(&client_input("A")).await.unwrap();
        let b = store.create_client(&client_input("B")).await.unwrap();

        let sync = store
            .create_list_sync(&ListSyncInput {
                name: "Favourites".into(),
                source_client_id: a.id,
                source_list_id: "pl1".into(),
                target_client_id: b.id,
                target_list_id: None,
                enabled: true,
            })
            .await
            .unwrap();

        store.set_list_sync_target(sync.id, "pl9").await.unwrap();
        let fetched = store.get_list_sync(sync.id).await.unwrap().unwrap();
        assert_eq!(fetched.target_list_id.as_deref(), Some("pl9"));

        store.delete_client(b.id).await.unwrap();
        assert!(store.list_list_syncs().await.unwrap().is_empty());
    }
}
