use crate::entities::{prelude::*, recommendations};
use crate::models::MediaType;
use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::Serialize;

/// Repository for the current recommendation set
pub struct RecommendationRepository {
    conn: DatabaseConnection,
}

impl RecommendationRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(r: recommendations::Model) -> Recommendation {
        Recommendation {
            id: r.id,
            title: r.title,
            year: r.year,
            media_type: r.media_type,
            reason: r.reason,
            source: r.source,
            tmdb_id: r.tmdb_id,
            image_url: r.image_url,
            created_at: r.created_at,
        }
    }

    /// Swaps the stored set for `items` atomically.
    pub async fn replace_all(&self, items: &[NewRecommendation]) -> Result<usize> {
        let txn = self.conn.begin().await?;
        Recommendations::delete_many().exec(&txn).await?;

        let now = chrono::Utc::now().to_rfc3339();
        for item in items {
            recommendations::ActiveModel {
                title: Set(item.title.clone()),
                year: Set(item.year),
                media_type: Set(item.media_type.as_str().to_string()),
                reason: Set(item.reason.clone()),
                source: Set(item.source.clone()),
                tmdb_id: Set(item.tmdb_id.clone()),
                image_url: Set(item.image_url.clone()),
                created_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(items.len())
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<Recommendation>> {
        let rows = Recommendations::find()
            .order_by_asc(recommendations::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }
}

// ============================================================================
// Data Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: i32,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: String,
    pub reason: Option<String>,
    pub source: String,
    pub tmdb_id: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecommendation {
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    pub reason: Option<String>,
    pub source: String,
    pub tmdb_id: Option<String>,
    pub image_url: Option<String>,
}
