use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub kind: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_id: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub last_synced_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::media_item_sources::Entity")]
    MediaItemSources,
}

impl Related<super::media_item_sources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MediaItemSources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
