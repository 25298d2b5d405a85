use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "media_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub media_type: String,
    pub title: String,
    pub normalized_title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub overview: Option<String>,
    /// JSON array of genre names.
    pub genres: String,
    pub tmdb_id: Option<String>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub image_url: Option<String>,
    /// JSON of the type-specific payload.
    pub data: String,
    /// Last TMDB enrichment attempt, RFC 3339.
    pub enrich_attempted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
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
