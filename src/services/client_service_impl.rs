//! `SeaORM` implementation of the `ClientService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::clients::{ClientFactory, ServerInfo, normalize_base_url};
use crate::config::{ClientEntry, MASKED_SECRET};
use crate::db::Store;
use crate::models::{ClientInput, ClientRecord, MediaItem, Playlist};
use crate::services::client_service::{ClientService, ClientServiceError};

const MAX_NAME_LEN: usize = 64;

pub struct SeaOrmClientService {
    store: Store,
    factory: Arc<dyn ClientFactory>,
}

impl SeaOrmClientService {
    #[must_use]
    pub fn new(store: Store, factory: Arc<dyn ClientFactory>) -> Self {
        Self { store, factory }
    }

    async fn record(&self, id: i32) -> Result<ClientRecord, ClientServiceError> {
        self.store
            .get_client(id)
            .await?
            .ok_or(ClientServiceError::NotFound(id))
    }

    async fn ensure_unique_name(
        &self,
        name: &str,
        except: Option<i32>,
    ) -> Result<(), ClientServiceError> {
        match self.store.get_client_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => Err(ClientServiceError::Conflict(
                format!("A client named '{name}' already exists"),
            )),
            _ => Ok(()),
        }
    }
}

/// Trims the input and checks name and url.
pub(crate) fn validate_input(mut input: ClientInput) -> Result<ClientInput, ClientServiceError> {
    input.name = input.name.trim().to_string();

    if input.name.is_empty() {
        return Err(ClientServiceError::Validation(
            "Client name cannot be empty".into(),
        ));
    }
    if input.name.chars().count() > MAX_NAME_LEN {
        return Err(ClientServiceError::Validation(format!(
            "Client name must be {MAX_NAME_LEN} characters or less"
        )));
    }
    if !input
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(ClientServiceError::Validation(
            "Client name can only contain letters, numbers, spaces, hyphens, and underscores"
                .into(),
        ));
    }

    input.base_url = normalize_base_url(&input.base_url)
        .map_err(|e| ClientServiceError::Validation(e.to_string()))?;

    Ok(input)
}

fn keep_secret(incoming: &mut Option<String>, stored: &Option<String>) {
    if incoming.as_deref() == Some(MASKED_SECRET) {
        incoming.clone_from(stored);
    }
}

#[async_trait]
impl ClientService for SeaOrmClientService {
    async fn list(&self) -> Result<Vec<ClientRecord>, ClientServiceError> {
        Ok(self
            .store
            .list_clients()
            .await?
            .iter()
            .map(ClientRecord::masked)
            .collect())
    }

    async fn get(&self, id: i32) -> Result<ClientRecord, ClientServiceError> {
        Ok(self.record(id).await?.masked())
    }

    async fn create(&self, input: ClientInput) -> Result<ClientRecord, ClientServiceError> {
        let input = validate_input(input)?;
        self.ensure_unique_name(&input.name, None).await?;

        let record = self.store.create_client(&input).await?;
        info!(client_id = record.id, name = %record.name, kind = %record.kind, "Client created");
        Ok(record.masked())
    }

    async fn update(
        &self,
        id: i32,
        input: ClientInput,
    ) -> Result<ClientRecord, ClientServiceError> {
        let mut input = validate_input(input)?;
        let stored = self.record(id).await?;
        self.ensure_unique_name(&input.name, Some(id)).await?;

        keep_secret(&mut input.api_key, &stored.api_key);
        keep_secret(&mut input.password, &stored.password);

        let record = self
            .store
            .update_client(id, &input)
            .await?
            .ok_or(ClientServiceError::NotFound(id))?;
        info!(client_id = id, name = %record.name, "Client updated");
        Ok(record.masked())
    }

    async fn delete(&self, id: i32) -> Result<(), ClientServiceError> {
        if !self.store.delete_client(id).await? {
            return Err(ClientServiceError::NotFound(id));
        }
        info!(client_id = id, "Client deleted");
        Ok(())
    }

    async fn test_connection(&self, id: i32) -> Result<ServerInfo, ClientServiceError> {
        let record = self.record(id).await?;
        let client = self.factory.build(&record)?;
        Ok(client.test_connection().await?)
    }

    async fn playlists(
        &self,
        id: i32,
    ) -> Result<Vec<MediaItem<Playlist>>, ClientServiceError> {
        let record = self.record(id).await?;
        let client = self.factory.build(&record)?;
        Ok(client.playlists().await?)
    }

    async fn seed_from_config(&self, entries: &[ClientEntry]) -> Result<usize, ClientServiceError> {
        for entry in entries {
            let input = validate_input(ClientInput::from(entry))?;
            self.store.upsert_client_by_name(&input).await?;
        }
        if !entries.is_empty() {
            info!(count = entries.len(), "Seeded clients from config");
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientError, ClientKind, MediaClient};

    struct NoFactory;

    impl ClientFactory for NoFactory {
        fn build(
            &self,
            _record: &ClientRecord,
        ) -> Result<Arc<dyn MediaClient>, ClientError> {
            Err(ClientError::Config("offline".into()))
        }
    }

    fn input(name: &str) -> ClientInput {
        ClientInput {
            name: name.into(),
            kind: ClientKind::Jellyfin,
            base_url: "http://jellyfin:8096/".into(),
            api_key: Some("secret".into()),
            username: None,
            password: None,
            user_id: None,
            enabled: true,
        }
    }

    async fn service() -> SeaOrmClientService {
        let store = Store::new("sqlite::memory:").await.unwrap();
        SeaOrmClientService::new(store, Arc::new(NoFactory))
    }

    #[test]
    fn test_validate_input() {
        let ok = validate_input(input("  Living Room ")).unwrap();
        assert_eq!(ok.name, "Living Room");
        assert_eq!(ok.base_url, "http://jellyfin:8096");

        assert!(validate_input(input("")).is_err());
        assert!(validate_input(input("bad/name")).is_err());
        assert!(validate_input(input(&"x".repeat(65))).is_err());

        let mut bad_url = input("ok");
        bad_url.base_url = "jellyfin".into();
        assert!(matches!(
            validate_input(bad_url),
            Err(ClientServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_masks_and_rejects_duplicates() {
        let service = service().await;

        let created = service.create(input("Jelly")).await.unwrap();
        assert_eq!(created.api_key.as_deref(), Some(MASKED_SECRET));

        assert!(matches!(
            service.create(input("jelly")).await,
            Err(ClientServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_masked_secret() {
        let service = service().await;
        let created = service.create(input("Jelly")).await.unwrap();

        let mut change = input("Jelly 2");
        change.api_key = Some(MASKED_SECRET.into());
        service.update(created.id, change).await.unwrap();

        let stored = service.store.get_client(created.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Jelly 2");
        assert_eq!(stored.api_key.as_deref(), Some("secret"));

        assert!(matches!(
            service.update(999, input("Other")).await,
            Err(ClientServiceError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_delete_and_test_connection_errors() {
        let service = service().await;
        let created = service.create(input("Jelly")).await.unwrap();

        assert!(matches!(
            service.test_connection(created.id).await,
            Err(ClientServiceError::Client(ClientError::Config(_)))
        ));

        service.delete(created.id).await.unwrap();
        assert!(matches!(
            service.delete(created.id).await,
            Err(ClientServiceError::NotFound(_))
        ));
    }
}
