use std::collections::{HashMap, HashSet};

use crate::entities::{media_item_sources, media_items, prelude::*};
use crate::matching::normalize_title;
use crate::models::{ClientItemRef, ExternalIds, MediaData, MediaItem, MediaType};
use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::warn;

const ID_CHUNK: usize = 500;

/// Repository for unified media items and their per-client source links
pub struct MediaRepository {
    conn: DatabaseConnection,
}

impl MediaRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ========================================================================
    // Model Conversion Helpers
    // ========================================================================

    fn parse_genres(raw: &str) -> Vec<String> {
        serde_json::from_str(raw).unwrap_or_default()
    }

    fn map_sources(rows: &[media_item_sources::Model]) -> Vec<ClientItemRef> {
        rows.iter()
            .map(|s| ClientItemRef {
                client_id: s.client_id,
                item_id: s.client_item_id.clone(),
            })
            .collect()
    }

    fn external_ids(r: &media_items::Model) -> ExternalIds {
        ExternalIds {
            tmdb: r.tmdb_id.clone(),
            imdb: r.imdb_id.clone(),
            tvdb: r.tvdb_id.clone(),
            musicbrainz: r.musicbrainz_id.clone(),
        }
    }

    fn map_typed<T: MediaData>(
        r: media_items::Model,
        sources: &[media_item_sources::Model],
    ) -> Result<MediaItem<T>> {
        let data: T = serde_json::from_str(&r.data)
            .with_context(|| format!("media item {} has unreadable data", r.id))?;

        Ok(MediaItem {
            id: Some(r.id),
            media_type: T::MEDIA_TYPE,
            external_ids: Self::external_ids(&r),
            genres: Self::parse_genres(&r.genres),
            sources: Self::map_sources(sources),
            title: r.title,
            original_title: r.original_title,
            year: r.year,
            overview: r.overview,
            image_url: r.image_url,
            data,
        })
    }

    fn map_stored(r: media_items::Model, sources: &[media_item_sources::Model]) -> StoredMediaItem {
        StoredMediaItem {
            id: r.id,
            external_ids: Self::external_ids(&r),
            genres: Self::parse_genres(&r.genres),
            sources: Self::map_sources(sources),
            data: serde_json::from_str(&r.data).unwrap_or(serde_json::Value::Null),
            media_type: r.media_type,
            title: r.title,
            original_title: r.original_title,
            year: r.year,
            overview: r.overview,
            image_url: r.image_url,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }

    fn items_from_source(client_id: i32) -> sea_orm::sea_query::SelectStatement {
        Query::select()
            .column(media_item_sources::Column::MediaItemId)
            .from(MediaItemSources)
            .and_where(Expr::col(media_item_sources::Column::ClientId).eq(client_id))
            .to_owned()
    }

    fn items_of(media_type: MediaType) -> sea_orm::sea_query::SelectStatement {
        Query::select()
            .column(media_items::Column::Id)
            .from(MediaItems)
            .and_where(Expr::col(media_items::Column::MediaType).eq(media_type.as_str()))
            .to_owned()
    }

    fn apply_filter(
        mut query: sea_orm::Select<MediaItems>,
        filter: &MediaFilter,
    ) -> sea_orm::Select<MediaItems> {
        if let Some(media_type) = filter.media_type {
            query = query.filter(media_items::Column::MediaType.eq(media_type.as_str()));
        }
        if let Some(q) = filter.query.as_deref() {
            let needle = normalize_title(q);
            if !needle.is_empty() {
                query = query.filter(media_items::Column::NormalizedTitle.contains(&needle));
            }
        }
        if let Some(year) = filter.year {
            query = query.filter(media_items::Column::Year.eq(year));
        }
        if let Some(client_id) = filter.client_id {
            query = query
                .filter(media_items::Column::Id.in_subquery(Self::items_from_source(client_id)));
        }
        query
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn list(&self, filter: &MediaFilter) -> Result<Vec<StoredMediaItem>> {
        let limit = u64::from(filter.limit.clamp(1, 1000));
        let offset = u64::from(filter.page.max(1) - 1) * limit;

        let rows = Self::apply_filter(MediaItems::find(), filter)
            .order_by_asc(media_items::Column::NormalizedTitle)
            .order_by_asc(media_items::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.conn)
            .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut sources: HashMap<i32, Vec<media_item_sources::Model>> = HashMap::new();
        if !ids.is_empty() {
            for source in MediaItemSources::find()
                .filter(media_item_sources::Column::MediaItemId.is_in(ids))
                .all(&self.conn)
                .await?
            {
                sources.entry(source.media_item_id).or_default().push(source);
            }
        }

        Ok(rows
            .into_iter()
            .map(|item| {
                let linked = sources.remove(&item.id).unwrap_or_default();
                Self::map_stored(item, &linked)
            })
            .collect())
    }

    pub async fn count(&self, filter: &MediaFilter) -> Result<u64> {
        Ok(Self::apply_filter(MediaItems::find(), filter)
            .count(&self.conn)
            .await?)
    }

    pub async fn get(&self, id: i32) -> Result<Option<StoredMediaItem>> {
        let Some(item) = MediaItems::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };
        let sources = MediaItemSources::find()
            .filter(media_item_sources::Column::MediaItemId.eq(id))
            .all(&self.conn)
            .await?;
        Ok(Some(Self::map_stored(item, &sources)))
    }

    /// Every stored item of `T`'s media type with its source links.
    pub async fn items_of_type<T: MediaData>(&self) -> Result<Vec<MediaItem<T>>> {
        let rows = MediaItems::find()
            .filter(media_items::Column::MediaType.eq(T::MEDIA_TYPE.as_str()))
            .order_by_asc(media_items::Column::Id)
            .find_with_related(MediaItemSources)
            .all(&self.conn)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for (row, sources) in rows {
            let id = row.id;
            match Self::map_typed::<T>(row, &sources) {
                Ok(item) => items.push(item),
                Err(e) => warn!(media_item_id = id, error = %e, "Skipping unreadable media item"),
            }
        }
        Ok(items)
    }

    /// Items of `T`'s media type without a TMDB id, least recently tried
    /// first. Source links are not loaded.
    pub async fn enrichment_candidates<T: MediaData>(
        &self,
        limit: u64,
    ) -> Result<Vec<MediaItem<T>>> {
        let rows = MediaItems::find()
            .filter(media_items::Column::MediaType.eq(T::MEDIA_TYPE.as_str()))
            .filter(media_items::Column::TmdbId.is_null())
            .order_by_asc(media_items::Column::EnrichAttemptedAt)
            .order_by_asc(media_items::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match Self::map_typed::<T>(row, &[]) {
                Ok(item) => items.push(item),
                Err(e) => warn!(media_item_id = id, error = %e, "Skipping unreadable media item"),
            }
        }
        Ok(items)
    }

    /// Most recently updated items of the given types, newest first.
    pub async fn recent(&self, types: &[MediaType], limit: u64) -> Result<Vec<StoredMediaItem>> {
        let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
        let rows = MediaItems::find()
            .filter(media_items::Column::MediaType.is_in(names))
            .order_by_desc(media_items::Column::UpdatedAt)
            .order_by_desc(media_items::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|item| Self::map_stored(item, &[]))
            .collect())
    }

    pub async fn counts_by_type(&self) -> Result<HashMap<String, u64>> {
        let rows: Vec<(String, i64)> = MediaItems::find()
            .select_only()
            .column(media_items::Column::MediaType)
            .column_as(Expr::col(media_items::Column::Id).count(), "count")
            .group_by(media_items::Column::MediaType)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(media_type, count)| (media_type, u64::try_from(count).unwrap_or(0)))
            .collect())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Inserts a new item or updates the stored one, then writes its source
    /// links idempotently. Returns the item id and whether it was created.
    pub async fn upsert<T: MediaData>(&self, item: &MediaItem<T>) -> Result<UpsertOutcome> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();

        let genres = serde_json::to_string(&item.genres)?;
        let data = serde_json::to_string(&item.data)?;

        let existing = match item.id {
            Some(id) => MediaItems::find_by_id(id).one(&txn).await?,
            None => None,
        };
        let created = existing.is_none();

        let mut active: media_items::ActiveModel = match existing {
            Some(model) => model.into(),
            None => media_items::ActiveModel {
                created_at: Set(now.clone()),
                ..Default::default()
            },
        };
        active.media_type = Set(item.media_type.as_str().to_string());
        active.title = Set(item.title.clone());
        active.normalized_title = Set(normalize_title(&item.title));
        active.original_title = Set(item.original_title.clone());
        active.year = Set(item.year);
        active.overview = Set(item.overview.clone());
        active.genres = Set(genres);
        active.tmdb_id = Set(item.external_ids.tmdb.clone());
        active.imdb_id = Set(item.external_ids.imdb.clone());
        active.tvdb_id = Set(item.external_ids.tvdb.clone());
        active.musicbrainz_id = Set(item.external_ids.musicbrainz.clone());
        active.image_url = Set(item.image_url.clone());
        active.data = Set(data);
        active.updated_at = Set(now.clone());

        let model = if created {
            active.insert(&txn).await?
        } else {
            active.update(&txn).await?
        };

        for source in &item.sources {
            Self::write_source(&txn, model.id, source, &now).await?;
        }

        txn.commit().await?;

        Ok(UpsertOutcome {
            id: model.id,
            created,
        })
    }

    async fn write_source(
        txn: &DatabaseTransaction,
        media_item_id: i32,
        source: &ClientItemRef,
        now: &str,
    ) -> Result<()> {
        let existing = MediaItemSources::find()
            .filter(media_item_sources::Column::ClientId.eq(source.client_id))
            .filter(media_item_sources::Column::ClientItemId.eq(source.item_id.as_str()))
            .one(txn)
            .await?;

        match existing {
            Some(row) => {
                let mut active: media_item_sources::ActiveModel = row.into();
                active.media_item_id = Set(media_item_id);
                active.last_seen_at = Set(now.to_string());
                active.update(txn).await?;
            }
            None => {
                media_item_sources::ActiveModel {
                    media_item_id: Set(media_item_id),
                    client_id: Set(source.client_id),
                    client_item_id: Set(source.item_id.clone()),
                    last_seen_at: Set(now.to_string()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
            }
        }
        Ok(())
    }

    /// Stamps the enrichment attempt time so the next run moves on to others.
    pub async fn mark_enrich_attempted(&self, ids: &[i32]) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        for chunk in ids.chunks(ID_CHUNK) {
            MediaItems::update_many()
                .col_expr(media_items::Column::EnrichAttemptedAt, Expr::value(now.as_str()))
                .filter(media_items::Column::Id.is_in(chunk.to_vec()))
                .exec(&self.conn)
                .await?;
        }
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = MediaItems::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    /// Removes source links of `client_id` for items of `media_type` whose
    /// vendor id is not in `seen`. Returns the number of links removed.
    pub async fn prune_sources(
        &self,
        client_id: i32,
        media_type: MediaType,
        seen: &HashSet<String>,
    ) -> Result<u64> {
        let rows = MediaItemSources::find()
            .filter(media_item_sources::Column::ClientId.eq(client_id))
            .filter(
                media_item_sources::Column::MediaItemId.in_subquery(Self::items_of(media_type)),
            )
            .all(&self.conn)
            .await?;

        let stale: Vec<i32> = rows
            .into_iter()
            .filter(|row| !seen.contains(&row.client_item_id))
            .map(|row| row.id)
            .collect();

        let mut removed = 0;
        for chunk in stale.chunks(ID_CHUNK) {
            let result = MediaItemSources::delete_many()
                .filter(media_item_sources::Column::Id.is_in(chunk.to_vec()))
                .exec(&self.conn)
                .await?;
            removed += result.rows_affected;
        }
        Ok(removed)
    }

    /// Deletes items that no client links to anymore.
    pub async fn delete_orphans(&self) -> Result<u64> {
        let linked = Query::select()
            .column(media_item_sources::Column::MediaItemId)
            .from(MediaItemSources)
            .to_owned();

        let result = MediaItems::delete_many()
            .filter(media_items::Column::Id.not_in_subquery(linked))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

// ============================================================================
// Data Types
// ============================================================================

/// Query for listing stored media.
#[derive(Debug, Clone)]
pub struct MediaFilter {
    pub media_type: Option<MediaType>,
    /// Substring matched against the normalized title.
    pub query: Option<String>,
    pub year: Option<i32>,
    pub client_id: Option<i32>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self {
            media_type: None,
            query: None,
            year: None,
            client_id: None,
            page: 1,
            limit: 50,
        }
    }
}

/// A stored media item with its payload left as JSON, for API output.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMediaItem {
    pub id: i32,
    pub media_type: String,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub external_ids: ExternalIds,
    pub image_url: Option<String>,
    pub sources: Vec<ClientItemRef>,
    pub data: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i32,
    pub created: bool,
}
