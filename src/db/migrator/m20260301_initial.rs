use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Clients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Clients::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Clients::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Clients::Kind).string().not_null())
                    .col(ColumnDef::new(Clients::BaseUrl).string().not_null())
                    .col(ColumnDef::new(Clients::ApiKey).string())
                    .col(ColumnDef::new(Clients::Username).string())
                    .col(ColumnDef::new(Clients::Password).string())
                    .col(ColumnDef::new(Clients::UserId).string())
                    .col(
                        ColumnDef::new(Clients::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Clients::CreatedAt).string().not_null())
                    .col(ColumnDef::new(Clients::LastSyncedAt).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MediaItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MediaItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MediaItems::MediaType).string().not_null())
                    .col(ColumnDef::new(MediaItems::Title).string().not_null())
                    .col(ColumnDef::new(MediaItems::NormalizedTitle).string().not_null())
                    .col(ColumnDef::new(MediaItems::OriginalTitle).string())
                    .col(ColumnDef::new(MediaItems::Year).integer())
                    .col(ColumnDef::new(MediaItems::Overview).text())
                    .col(
                        ColumnDef::new(MediaItems::Genres)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(MediaItems::TmdbId).string())
                    .col(ColumnDef::new(MediaItems::ImdbId).string())
                    .col(ColumnDef::new(MediaItems::TvdbId).string())
                    .col(ColumnDef::new(MediaItems::MusicbrainzId).string())
                    .col(ColumnDef::new(MediaItems::ImageUrl).string())
                    .col(ColumnDef::new(MediaItems::Data).text().not_null())
                    .col(ColumnDef::new(MediaItems::EnrichAttemptedAt).string())
                    .col(ColumnDef::new(MediaItems::CreatedAt).string().not_null())
                    .col(ColumnDef::new(MediaItems::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_items_type_title")
                    .table(MediaItems::Table)
                    .col(MediaItems::MediaType)
                    .col(MediaItems::NormalizedTitle)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MediaItemSources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MediaItemSources::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MediaItemSources::MediaItemId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MediaItemSources::ClientId).integer().not_null())
                    .col(
                        ColumnDef::new(MediaItemSources::ClientItemId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MediaItemSources::LastSeenAt)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_media_item_sources_item")
                            .from(MediaItemSources::Table, MediaItemSources::MediaItemId)
                            .to(MediaItems::Table, MediaItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_media_item_sources_client")
                            .from(MediaItemSources::Table, MediaItemSources::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_item_sources_client_item")
                    .table(MediaItemSources::Table)
                    .col(MediaItemSources::ClientId)
                    .col(MediaItemSources::ClientItemId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_item_sources_item")
                    .table(MediaItemSources::Table)
                    .col(MediaItemSources::MediaItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(JobRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobRuns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobRuns::JobType).string().not_null())
                    .col(ColumnDef::new(JobRuns::Status).string().not_null())
                    .col(ColumnDef::new(JobRuns::Progress).integer().not_null().default(0))
                    .col(ColumnDef::new(JobRuns::Processed).integer().not_null().default(0))
                    .col(ColumnDef::new(JobRuns::Total).integer().not_null().default(0))
                    .col(ColumnDef::new(JobRuns::Message).text())
                    .col(ColumnDef::new(JobRuns::StartedAt).string().not_null())
                    .col(ColumnDef::new(JobRuns::FinishedAt).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Recommendations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Recommendations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Recommendations::Title).string().not_null())
                    .col(ColumnDef::new(Recommendations::Year).integer())
                    .col(ColumnDef::new(Recommendations::MediaType).string().not_null())
                    .col(ColumnDef::new(Recommendations::Reason).text())
                    .col(ColumnDef::new(Recommendations::Source).string().not_null())
                    .col(ColumnDef::new(Recommendations::TmdbId).string())
                    .col(ColumnDef::new(Recommendations::ImageUrl).string())
                    .col(ColumnDef::new(Recommendations::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ListSyncs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ListSyncs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ListSyncs::Name).string().not_null())
                    .col(ColumnDef::new(ListSyncs::SourceClientId).integer().not_null())
                    .col(ColumnDef::new(ListSyncs::SourceListId).string().not_null())
                    .col(ColumnDef::new(ListSyncs::TargetClientId).integer().not_null())
                    .col(ColumnDef::new(ListSyncs::TargetListId).string())
                    .col(
                        ColumnDef::new(ListSyncs::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ListSyncs::LastSyncedAt).string())
                    .col(ColumnDef::new(ListSyncs::CreatedAt).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_list_syncs_source_client")
                            .from(ListSyncs::Table, ListSyncs::SourceClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_list_syncs_target_client")
                            .from(ListSyncs::Table, ListSyncs::TargetClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ListSyncs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Recommendations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JobRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MediaItemSources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MediaItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clients::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Clients {
    Table,
    Id,
    Name,
    Kind,
    BaseUrl,
    ApiKey,
    Username,
    Password,
    UserId,
    Enabled,
    CreatedAt,
    LastSyncedAt,
}

#[derive(DeriveIden)]
enum MediaItems {
    Table,
    Id,
    MediaType,
    Title,
    NormalizedTitle,
    OriginalTitle,
    Year,
    Overview,
    Genres,
    TmdbId,
    ImdbId,
    TvdbId,
    MusicbrainzId,
    ImageUrl,
    Data,
    EnrichAttemptedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MediaItemSources {
    Table,
    Id,
    MediaItemId,
    ClientId,
    ClientItemId,
    LastSeenAt,
}

#[derive(DeriveIden)]
enum JobRuns {
    Table,
    Id,
    JobType,
    Status,
    Progress,
    Processed,
    Total,
    Message,
    StartedAt,
    FinishedAt,
}

#[derive(DeriveIden)]
enum Recommendations {
    Table,
    Id,
    Title,
    Year,
    MediaType,
    Reason,
    Source,
    TmdbId,
    ImageUrl,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ListSyncs {
    Table,
    Id,
    Name,
    SourceClientId,
    SourceListId,
    TargetClientId,
    TargetListId,
    Enabled,
    LastSyncedAt,
    CreatedAt,
}
