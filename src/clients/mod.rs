//! Wrappers around the REST APIs of media servers and metadata providers.
//!
//! Every media server implements [`MediaClient`], which converts vendor DTOs
//! into [`MediaItem`]s. Clients are built from stored [`ClientRecord`]s by a
//! [`ClientFactory`].

pub mod claude;
pub mod mediabrowser;
pub mod plex;
pub mod subsonic;
pub mod tmdb;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    Album, AnyMediaItem, Artist, ClientRecord, Collection, Episode, MediaItem, MediaType, Movie,
    Playlist, Series, Track, into_any,
};

const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} rejected the credentials: {message}")]
    Auth {
        service: &'static str,
        message: String,
    },

    #[error("Failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Unsupported(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Emby,
    Jellyfin,
    Plex,
    Subsonic,
}

impl ClientKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emby => "emby",
            Self::Jellyfin => "jellyfin",
            Self::Plex => "plex",
            Self::Subsonic => "subsonic",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emby" => Ok(Self::Emby),
            "jellyfin" => Ok(Self::Jellyfin),
            "plex" => Ok(Self::Plex),
            "subsonic" | "navidrome" => Ok(Self::Subsonic),
            other => Err(ClientError::Config(format!("unknown client kind '{other}'"))),
        }
    }
}

/// What a server says about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: Option<String>,
    pub id: Option<String>,
}

#[async_trait]
pub trait MediaClient: Send + Sync {
    fn kind(&self) -> ClientKind;

    fn name(&self) -> &str;

    /// Database id of the client record this instance was built from.
    fn client_id(&self) -> i32;

    fn supported_types(&self) -> &'static [MediaType];

    fn supports(&self, media_type: MediaType) -> bool {
        self.supported_types().contains(&media_type)
    }

    async fn test_connection(&self) -> Result<ServerInfo, ClientError>;

    async fn movies(&self) -> Result<Vec<MediaItem<Movie>>, ClientError> {
        Err(unsupported(self.kind(), "movies"))
    }

    async fn series(&self) -> Result<Vec<MediaItem<Series>>, ClientError> {
        Err(unsupported(self.kind(), "series"))
    }

    async fn episodes(&self) -> Result<Vec<MediaItem<Episode>>, ClientError> {
        Err(unsupported(self.kind(), "episodes"))
    }

    async fn artists(&self) -> Result<Vec<MediaItem<Artist>>, ClientError> {
        Err(unsupported(self.kind(), "artists"))
    }

    async fn albums(&self) -> Result<Vec<MediaItem<Album>>, ClientError> {
        Err(unsupported(self.kind(), "albums"))
    }

    async fn tracks(&self) -> Result<Vec<MediaItem<Track>>, ClientError> {
        Err(unsupported(self.kind(), "tracks"))
    }

    async fn playlists(&self) -> Result<Vec<MediaItem<Playlist>>, ClientError> {
        Err(unsupported(self.kind(), "playlists"))
    }

    async fn collections(&self) -> Result<Vec<MediaItem<Collection>>, ClientError> {
        Err(unsupported(self.kind(), "collections"))
    }

    /// One playlist with its entries. `None` when the server has no such list.
    async fn playlist(&self, list_id: &str) -> Result<Option<MediaItem<Playlist>>, ClientError> {
        let client_id = self.client_id();
        Ok(self
            .playlists()
            .await?
            .into_iter()
            .find(|p| p.source_for(client_id) == Some(list_id)))
    }

    /// Everything of one media type, type-erased.
    async fn fetch(&self, media_type: MediaType) -> Result<Vec<AnyMediaItem>, ClientError> {
        Ok(match media_type {
            MediaType::Movie => into_any(self.movies().await?),
            MediaType::Series => into_any(self.series().await?),
            MediaType::Episode => into_any(self.episodes().await?),
            MediaType::Artist => into_any(self.artists().await?),
            MediaType::Album => into_any(self.albums().await?),
            MediaType::Track => into_any(self.tracks().await?),
            MediaType::Playlist => into_any(self.playlists().await?),
            MediaType::Collection => into_any(self.collections().await?),
        })
    }

    /// Creates a playlist and returns its id.
    async fn create_playlist(
        &self,
        _name: &str,
        _media_type: MediaType,
        _item_ids: &[String],
    ) -> Result<String, ClientError> {
        Err(unsupported(self.kind(), "creating playlists"))
    }

    async fn add_to_playlist(
        &self,
        _list_id: &str,
        _item_ids: &[String],
    ) -> Result<(), ClientError> {
        Err(unsupported(self.kind(), "editing playlists"))
    }

    async fn remove_from_playlist(
        &self,
        _list_id: &str,
        _entry_ids: &[String],
    ) -> Result<(), ClientError> {
        Err(unsupported(self.kind(), "editing playlists"))
    }
}

fn unsupported(kind: ClientKind, what: &str) -> ClientError {
    ClientError::Unsupported(format!("{kind} does not support {what}"))
}

/// Builds live clients from stored records.
pub trait ClientFactory: Send + Sync {
    fn build(&self, record: &ClientRecord) -> Result<Arc<dyn MediaClient>, ClientError>;
}

/// Factory producing the real HTTP clients, all sharing one connection pool.
#[derive(Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
    page_size: u32,
}

impl HttpClientFactory {
    #[must_use]
    pub const fn new(http: reqwest::Client, page_size: u32) -> Self {
        Self { http, page_size }
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, record: &ClientRecord) -> Result<Arc<dyn MediaClient>, ClientError> {
        build_client(record, self.http.clone(), self.page_size)
    }
}

pub fn build_client(
    record: &ClientRecord,
    http: reqwest::Client,
    page_size: u32,
) -> Result<Arc<dyn MediaClient>, ClientError> {
    let base_url = normalize_base_url(&record.base_url)?;

    Ok(match record.kind {
        ClientKind::Emby | ClientKind::Jellyfin => Arc::new(
            mediabrowser::MediaBrowserClient::new(http, record, base_url, page_size)?,
        ),
        ClientKind::Plex => Arc::new(plex::PlexClient::new(http, record, base_url, page_size)?),
        ClientKind::Subsonic => Arc::new(subsonic::SubsonicClient::new(
            http, record, base_url, page_size,
        )?),
    })
}

/// Validates a server url and strips trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| ClientError::Config(format!("invalid url '{raw}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::Config(format!(
            "url '{raw}' must use http or https"
        )));
    }

    Ok(trimmed.to_string())
}

pub(crate) fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let mut cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        cut.push_str("...");
        cut
    }
}

/// Fails with `Auth` on 401/403 and `Status` on any other non-2xx response.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    metrics::counter!(
        "client_requests_total",
        "client_kind" => service,
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ClientError::Auth {
            service,
            message: format!("HTTP {status}"),
        });
    }

    Err(ClientError::Status {
        service,
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}

/// Checks the status and decodes a JSON body, logging the payload on failure.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let response = check_status(service, response).await?;
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        debug!(service, body = %truncate_body(&text), "Failed to parse response");
        ClientError::Decode {
            service,
            message: e.to_string(),
        }
    })
}

/// `None` for empty strings.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_kind_round_trip() {
        for kind in [
            ClientKind::Emby,
            ClientKind::Jellyfin,
            ClientKind::Plex,
            ClientKind::Subsonic,
        ] {
            assert_eq!(kind.to_string().parse::<ClientKind>().unwrap(), kind);
        }
        assert_eq!("Navidrome".parse::<ClientKind>().unwrap(), ClientKind::Subsonic);
        assert!("kodi".parse::<ClientKind>().is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://emby:8096/").unwrap(),
            "http://emby:8096"
        );
        assert_eq!(
            normalize_base_url(" https://host/jellyfin// ").unwrap(),
            "https://host/jellyfin"
        );
        assert!(normalize_base_url("ftp://host").is_err());
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let cut = truncate_body(&long);
        assert_eq!(cut.len(), 503);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn test_build_client_by_kind() {
        let record = ClientRecord {
            id: 7,
            name: "Music".into(),
            kind: ClientKind::Subsonic,
            base_url: "http://navidrome:4533/".into(),
            api_key: None,
            username: Some("admin".into()),
            password: Some("secret".into()),
            user_id: None,
            enabled: true,
            created_at: String::new(),
            last_synced_at: None,
        };

        let client = build_client(&record, reqwest::Client::new(), 100).unwrap();
        assert_eq!(client.kind(), ClientKind::Subsonic);
        assert_eq!(client.client_id(), 7);
        assert_eq!(client.name(), "Music");
        assert!(client.supports(MediaType::Track));
        assert!(!client.supports(MediaType::Movie));
    }
}
