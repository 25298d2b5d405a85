//! Domain service for browsing the aggregated library.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::db::{MediaFilter, StoredMediaItem};

/// One page of library items.
#[derive(Debug, Clone, Serialize)]
pub struct MediaPage {
    pub items: Vec<StoredMediaItem>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media item not found: {0}")]
    NotFound(i32),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for MediaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[async_trait::async_trait]
pub trait MediaService: Send + Sync {
    async fn list(&self, filter: MediaFilter) -> Result<MediaPage, MediaError>;

    async fn get(&self, id: i32) -> Result<StoredMediaItem, MediaError>;

    /// Removes the item and its source links.
    async fn delete(&self, id: i32) -> Result<(), MediaError>;

    /// Item count per media type name.
    async fn counts_by_type(&self) -> Result<HashMap<String, u64>, MediaError>;
}
