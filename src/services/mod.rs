pub mod jobs;
pub use jobs::JobTracker;

pub mod metadata;
pub use metadata::{MetadataError, MetadataService};

pub mod sync;
pub use sync::{MediaSyncJob, SyncError, SyncStats};

pub mod list_sync;
pub use list_sync::{ListSyncError, ListSyncHelper, ListSyncPlan, ListSyncService};

pub mod recommendations;
pub use recommendations::{RecommendationError, RecommendationService};

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod client_service;
pub mod client_service_impl;
pub use client_service::{ClientService, ClientServiceError};
pub use client_service_impl::SeaOrmClientService;

pub mod media_service;
pub mod media_service_impl;
pub use media_service::{MediaError, MediaPage, MediaService};
pub use media_service_impl::SeaOrmMediaService;

pub mod system_service;
pub mod system_service_impl;
pub use system_service::{SystemError, SystemService};
pub use system_service_impl::SeaOrmSystemService;
