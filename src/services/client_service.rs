//! Domain service for managing media server connections.

use thiserror::Error;

use crate::clients::{ClientError, ServerInfo};
use crate::config::ClientEntry;
use crate::models::{ClientInput, ClientRecord, MediaItem, Playlist};

#[derive(Debug, Error)]
pub enum ClientServiceError {
    #[error("Client not found: {0}")]
    NotFound(i32),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl From<anyhow::Error> for ClientServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Domain service trait for clients. Records leave the service masked.
#[async_trait::async_trait]
pub trait ClientService: Send + Sync {
    async fn list(&self) -> Result<Vec<ClientRecord>, ClientServiceError>;

    async fn get(&self, id: i32) -> Result<ClientRecord, ClientServiceError>;

    /// Creates a client after validating name and url.
    async fn create(&self, input: ClientInput) -> Result<ClientRecord, ClientServiceError>;

    /// Replaces a client. Masked secrets keep the stored value.
    async fn update(
        &self,
        id: i32,
        input: ClientInput,
    ) -> Result<ClientRecord, ClientServiceError>;

    async fn delete(&self, id: i32) -> Result<(), ClientServiceError>;

    /// Builds the client and asks the server to identify itself.
    async fn test_connection(&self, id: i32) -> Result<ServerInfo, ClientServiceError>;

    /// Playlists of one client, entries included.
    async fn playlists(
        &self,
        id: i32,
    ) -> Result<Vec<MediaItem<Playlist>>, ClientServiceError>;

    /// Inserts or updates the `[[clients]]` entries of the config file.
    async fn seed_from_config(&self, entries: &[ClientEntry]) -> Result<usize, ClientServiceError>;
}
