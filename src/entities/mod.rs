pub mod prelude;

pub mod clients;
pub mod job_runs;
pub mod list_syncs;
pub mod media_item_sources;
pub mod media_items;
pub mod recommendations;
