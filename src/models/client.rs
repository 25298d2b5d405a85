use serde::{Deserialize, Serialize};

use crate::clients::ClientKind;
use crate::config::MASKED_SECRET;

/// A configured media server connection as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: i32,
    pub name: String,
    pub kind: ClientKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_id: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub last_synced_at: Option<String>,
}

impl ClientRecord {
    /// Copy safe to hand out over the API.
    #[must_use]
    pub fn masked(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| MASKED_SECRET.to_string());
        Self {
            api_key: mask(&self.api_key),
            password: mask(&self.password),
            ..self.clone()
        }
    }
}

/// Fields accepted when creating or replacing a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInput {
    pub name: String,
    pub kind: ClientKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl From<&crate::config::ClientEntry> for ClientInput {
    fn from(entry: &crate::config::ClientEntry) -> Self {
        Self {
            name: entry.name.clone(),
            kind: entry.kind,
            base_url: entry.url.clone(),
            api_key: entry.api_key.clone(),
            username: entry.username.clone(),
            password: entry.password.clone(),
            user_id: entry.user_id.clone(),
            enabled: entry.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_secrets_only() {
        let record = ClientRecord {
            id: 1,
            name: "Plex".into(),
            kind: ClientKind::Plex,
            base_url: "http://plex:32400".into(),
            api_key: Some("token".into()),
            username: Some("me".into()),
            password: None,
            user_id: None,
            enabled: true,
            created_at: "2026-01-01T00:00:00Z".into(),
            last_synced_at: None,
        };

        let masked = record.masked();
        assert_eq!(masked.api_key.as_deref(), Some(MASKED_SECRET));
        assert_eq!(masked.password, None);
        assert_eq!(masked.username.as_deref(), Some("me"));
    }
}
