use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::clients::{ClientFactory, HttpClientFactory};
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::services::{
    ClientService, ListSyncService, MediaService, MediaSyncJob, MetadataService,
    RecommendationService, SeaOrmClientService, SeaOrmMediaService, SeaOrmSystemService,
    SystemService,
};

/// Build the HTTP client shared by every vendor and provider client.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds.max(1)))
        .user_agent(concat!("mediahub/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub http: reqwest::Client,

    pub factory: Arc<dyn ClientFactory>,

    pub event_bus: broadcast::Sender<NotificationEvent>,

    pub metadata: Arc<MetadataService>,

    pub media_sync: Arc<MediaSyncJob>,

    pub list_sync: Arc<ListSyncService>,

    pub recommendations: Arc<RecommendationService>,

    pub client_service: Arc<dyn ClientService>,

    pub media_service: Arc<dyn MediaService>,

    pub system_service: Arc<dyn SystemService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http = build_shared_http_client(config.general.request_timeout_seconds)?;
        let factory = Arc::new(HttpClientFactory::new(http.clone(), config.sync.page_size));
        Self::init(config, http, factory).await
    }

    /// State with a custom client factory, used to run against fake servers.
    pub async fn with_factory(
        config: Config,
        factory: Arc<dyn ClientFactory>,
    ) -> anyhow::Result<Self> {
        let http = build_shared_http_client(config.general.request_timeout_seconds)?;
        Self::init(config, http, factory).await
    }

    async fn init(
        config: Config,
        http: reqwest::Client,
        factory: Arc<dyn ClientFactory>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));
        let seed = config.clients.clone();
        let config = Arc::new(RwLock::new(config));

        let metadata = Arc::new(MetadataService::new(config.clone(), http.clone()));

        let media_sync = Arc::new(MediaSyncJob::new(
            store.clone(),
            config.clone(),
            factory.clone(),
            metadata.clone(),
            event_bus.clone(),
        ));

        let list_sync = Arc::new(ListSyncService::new(
            store.clone(),
            config.clone(),
            factory.clone(),
            event_bus.clone(),
        ));

        let recommendations = Arc::new(RecommendationService::new(
            store.clone(),
            config.clone(),
            http.clone(),
            event_bus.clone(),
        ));

        let client_service: Arc<dyn ClientService> =
            Arc::new(SeaOrmClientService::new(store.clone(), factory.clone()));
        let media_service: Arc<dyn MediaService> =
            Arc::new(SeaOrmMediaService::new(store.clone()));
        let system_service: Arc<dyn SystemService> =
            Arc::new(SeaOrmSystemService::new(store.clone(), config.clone()));

        client_service.seed_from_config(&seed).await?;

        let stale = store.fail_stale_runs().await?;
        if stale > 0 {
            warn!(count = stale, "Marked interrupted job runs as failed");
        }

        info!("Shared state initialized");

        Ok(Self {
            config,
            store,
            http,
            factory,
            event_bus,
            metadata,
            media_sync,
            list_sync,
            recommendations,
            client_service,
            media_service,
            system_service,
        })
    }
}
