pub use super::clients::Entity as Clients;
pub use super::job_runs::Entity as JobRuns;
pub use super::list_syncs::Entity as ListSyncs;
pub use super::media_item_sources::Entity as MediaItemSources;
pub use super::media_items::Entity as MediaItems;
pub use super::recommendations::Entity as Recommendations;
