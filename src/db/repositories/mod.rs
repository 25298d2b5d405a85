pub mod client;
pub mod job;
pub mod list_sync;
pub mod media;
pub mod recommendation;
