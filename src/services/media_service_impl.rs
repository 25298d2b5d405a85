//! `SeaORM` implementation of the `MediaService` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::db::{MediaFilter, Store, StoredMediaItem};
use crate::services::media_service::{MediaError, MediaPage, MediaService};

const MAX_PAGE_SIZE: u32 = 1000;

pub struct SeaOrmMediaService {
    store: Store,
}

impl SeaOrmMediaService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MediaService for SeaOrmMediaService {
    async fn list(&self, mut filter: MediaFilter) -> Result<MediaPage, MediaError> {
        filter.page = filter.page.max(1);
        filter.limit = filter.limit.clamp(1, MAX_PAGE_SIZE);

        let (items, total) = tokio::try_join!(
            self.store.list_items(&filter),
            self.store.count_items(&filter)
        )?;

        Ok(MediaPage {
            items,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn get(&self, id: i32) -> Result<StoredMediaItem, MediaError> {
        self.store
            .get_item(id)
            .await?
            .ok_or(MediaError::NotFound(id))
    }

    async fn delete(&self, id: i32) -> Result<(), MediaError> {
        if !self.store.delete_item(id).await? {
            return Err(MediaError::NotFound(id));
        }
        info!(media_item_id = id, "Media item deleted");
        Ok(())
    }

    async fn counts_by_type(&self) -> Result<HashMap<String, u64>, MediaError> {
        Ok(self.store.item_counts_by_type().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaItem, MediaType, Movie, Series};

    #[tokio::test]
    async fn test_list_get_delete() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        for title in ["Alien", "Aliens", "Heat"] {
            store
                .upsert_item(&MediaItem::new(title, Movie::default()))
                .await
                .unwrap();
        }
        store
            .upsert_item(&MediaItem::new("Fargo", Series::default()))
            .await
            .unwrap();

        let service = SeaOrmMediaService::new(store);
        let page = service
            .list(MediaFilter {
                media_type: Some(MediaType::Movie),
                limit: 2,
                page: 0,
                ..MediaFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.page, 1);

        let counts = service.counts_by_type().await.unwrap();
        assert_eq!(counts.get("movie"), Some(&3));
        assert_eq!(counts.get("series"), Some(&1));

        let id = page.items[0].id;
        assert_eq!(service.get(id).await.unwrap().id, id);
        service.delete(id).await.unwrap();
        assert!(matches!(service.get(id).await, Err(MediaError::NotFound(_))));
    }
}
