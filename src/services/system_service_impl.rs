//! `SeaORM` implementation of the `SystemService` trait.

use crate::api::types::SystemStatus;
use crate::config::Config;
use crate::db::Store;
use crate::domain::JobType;
use crate::services::system_service::{SystemError, SystemService};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct SeaOrmSystemService {
    store: Store,
    config: Arc<RwLock<Config>>,
}

impl SeaOrmSystemService {
    #[must_use]
    pub const fn new(store: Store, config: Arc<RwLock<Config>>) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl SystemService for SeaOrmSystemService {
    async fn get_status(
        &self,
        uptime_secs: u64,
        version: &str,
    ) -> Result<SystemStatus, SystemError> {
        let items_by_type = self.store.item_counts_by_type().await?;
        let clients = self.store.count_clients().await?;
        let last_media_sync = self.store.latest_job_run(JobType::MediaSync).await?;
        let last_list_sync = self.store.latest_job_run(JobType::ListSync).await?;

        let (scheduler_enabled, tmdb_enabled, claude_enabled) = {
            let config = self.config.read().await;
            (
                config.scheduler.enabled,
                config.tmdb.enabled,
                config.claude.enabled,
            )
        };

        Ok(SystemStatus {
            version: version.to_string(),
            uptime: uptime_secs,
            total_items: items_by_type.values().sum(),
            items_by_type,
            clients,
            scheduler_enabled,
            tmdb_enabled,
            claude_enabled,
            last_media_sync,
            last_list_sync,
        })
    }

    async fn get_config(&self) -> Result<Config, SystemError> {
        Ok(self.config.read().await.redacted())
    }

    async fn update_config(&self, mut new_config: Config) -> Result<Config, SystemError> {
        let mut config = self.config.write().await;

        new_config.restore_secrets(&config);
        new_config
            .validate()
            .map_err(|e| SystemError::Validation(e.to_string()))?;

        new_config
            .save()
            .map_err(|e| SystemError::Internal(format!("{e:#}")))?;

        *config = new_config;
        let redacted = config.redacted();
        drop(config);

        info!("Configuration updated");
        Ok(redacted)
    }
}
