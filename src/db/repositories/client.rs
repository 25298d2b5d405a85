use crate::entities::{clients, prelude::*};
use crate::models::{ClientInput, ClientRecord};
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;

/// Repository for configured media server connections
pub struct ClientRepository {
    conn: DatabaseConnection,
}

impl ClientRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(r: clients::Model) -> Result<ClientRecord> {
        let kind = r
            .kind
            .parse()
            .with_context(|| format!("client {} has unknown kind '{}'", r.id, r.kind))?;

        Ok(ClientRecord {
            id: r.id,
            name: r.name,
            kind,
            base_url: r.base_url,
            api_key: r.api_key,
            username: r.username,
            password: r.password,
            user_id: r.user_id,
            enabled: r.enabled,
            created_at: r.created_at,
            last_synced_at: r.last_synced_at,
        })
    }

    fn map_all(rows: Vec<clients::Model>) -> Result<Vec<ClientRecord>> {
        rows.into_iter().map(Self::map_model).collect()
    }

    pub async fn list(&self) -> Result<Vec<ClientRecord>> {
        let rows = Clients::find()
            .order_by_asc(clients::Column::Name)
            .all(&self.conn)
            .await?;
        Self::map_all(rows)
    }

    pub async fn list_enabled(&self) -> Result<Vec<ClientRecord>> {
        let rows = Clients::find()
            .filter(clients::Column::Enabled.eq(true))
            .order_by_asc(clients::Column::Id)
            .all(&self.conn)
            .await?;
        Self::map_all(rows)
    }

    pub async fn get(&self, id: i32) -> Result<Option<ClientRecord>> {
        Clients::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(Self::map_model)
            .transpose()
    }

    /// Case-insensitive lookup by display name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<ClientRecord>> {
        let wanted = name.trim().to_lowercase();
        let rows = Clients::find().all(&self.conn).await?;
        rows.into_iter()
            .find(|r| r.name.to_lowercase() == wanted)
            .map(Self::map_model)
            .transpose()
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(Clients::find().count(&self.conn).await?)
    }

    pub async fn create(&self, input: &ClientInput) -> Result<ClientRecord> {
        let active = clients::ActiveModel {
            name: Set(input.name.trim().to_string()),
            kind: Set(input.kind.as_str().to_string()),
            base_url: Set(input.base_url.clone()),
            api_key: Set(input.api_key.clone()),
            username: Set(input.username.clone()),
            password: Set(input.password.clone()),
            user_id: Set(input.user_id.clone()),
            enabled: Set(input.enabled),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            last_synced_at: Set(None),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        info!(client = %model.name, kind = %model.kind, "Added client");
        Self::map_model(model)
    }

    pub async fn update(&self, id: i32, input: &ClientInput) -> Result<Option<ClientRecord>> {
        let Some(existing) = Clients::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: clients::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.kind = Set(input.kind.as_str().to_string());
        active.base_url = Set(input.base_url.clone());
        active.api_key = Set(input.api_key.clone());
        active.username = Set(input.username.clone());
        active.password = Set(input.password.clone());
        active.user_id = Set(input.user_id.clone());
        active.enabled = Set(input.enabled);

        let model = active.update(&self.conn).await?;
        Self::map_model(model).map(Some)
    }

    /// Seeds a client from the config file, updating the row with the same name.
    pub async fn upsert_by_name(&self, input: &ClientInput) -> Result<ClientRecord> {
        match self.get_by_name(&input.name).await? {
            Some(existing) => self
                .update(existing.id, input)
                .await?
                .context("client disappeared during upsert"),
            None => self.create(input).await,
        }
    }

    pub async fn touch_synced(&self, id: i32) -> Result<()> {
        Clients::update_many()
            .col_expr(
                clients::Column::LastSyncedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(clients::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Clients::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
