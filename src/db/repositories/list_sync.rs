use crate::entities::{list_syncs, prelude::*};
use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Repository for playlist mirroring definitions
pub struct ListSyncRepository {
    conn: DatabaseConnection,
}

impl ListSyncRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(r: list_syncs::Model) -> ListSyncRecord {
        ListSyncRecord {
            id: r.id,
            name: r.name,
            source_client_id: r.source_client_id,
            source_list_id: r.source_list_id,
            target_client_id: r.target_client_id,
            target_list_id: r.target_list_id,
            enabled: r.enabled,
            last_synced_at: r.last_synced_at,
            created_at: r.created_at,
        }
    }

    pub async fn list(&self) -> Result<Vec<ListSyncRecord>> {
        let rows = ListSyncs::find()
            .order_by_asc(list_syncs::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn list_enabled(&self) -> Result<Vec<ListSyncRecord>> {
        let rows = ListSyncs::find()
            .filter(list_syncs::Column::Enabled.eq(true))
            .order_by_asc(list_syncs::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<ListSyncRecord>> {
        let row = ListSyncs::find_by_id(id).one(&self.conn).await?;
        Ok(row.map(Self::map_model))
    }

    pub async fn create(&self, input: &ListSyncInput) -> Result<ListSyncRecord> {
        let model = list_syncs::ActiveModel {
            name: Set(input.name.trim().to_string()),
            source_client_id: Set(input.source_client_id),
            source_list_id: Set(input.source_list_id.clone()),
            target_client_id: Set(input.target_client_id),
            target_list_id: Set(input.target_list_id.clone()),
            enabled: Set(input.enabled),
            last_synced_at: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        info!(list_sync = %model.name, "Added list sync");
        Ok(Self::map_model(model))
    }

    pub async fn set_target(&self, id: i32, target_list_id: &str) -> Result<()> {
        ListSyncs::update_many()
            .col_expr(
                list_syncs::Column::TargetListId,
                sea_orm::sea_query::Expr::value(target_list_id),
            )
            .filter(list_syncs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn touch_synced(&self, id: i32) -> Result<()> {
        ListSyncs::update_many()
            .col_expr(
                list_syncs::Column::LastSyncedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(list_syncs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = ListSyncs::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}

// ============================================================================
// Data Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ListSyncRecord {
    pub id: i32,
    pub name: String,
    pub source_client_id: i32,
    pub source_list_id: String,
    pub target_client_id: i32,
    pub target_list_id: Option<String>,
    pub enabled: bool,
    pub last_synced_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListSyncInput {
    pub name: String,
    pub source_client_id: i32,
    pub source_list_id: String,
    pub target_client_id: i32,
    #[serde(default)]
    pub target_list_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}
