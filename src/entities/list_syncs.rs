use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "list_syncs")]
pub struct Model {
    #[sea_orm(primary_key)]
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::clients::Entity",
        from = "Column::SourceClientId",
        to = "super::clients::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SourceClient,
    #[sea_orm(
        belongs_to = "super::clients::Entity",
        from = "Column::TargetClientId",
        to = "super::clients::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TargetClient,
}

impl ActiveModelBehavior for ActiveModel {}
