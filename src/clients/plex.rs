use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{ClientError, ClientKind, MediaClient, ServerInfo, check_status, non_empty, read_json};
use crate::models::{
    Album, Artist, ClientRecord, Collection, Episode, ExternalIds, ListEntry, MediaData, MediaItem,
    MediaType, Movie, Playlist, Series, Track,
};

const SERVICE: &str = "plex";

const SUPPORTED: &[MediaType] = &[
    MediaType::Movie,
    MediaType::Series,
    MediaType::Episode,
    MediaType::Artist,
    MediaType::Album,
    MediaType::Track,
    MediaType::Playlist,
    MediaType::Collection,
];

/// Numeric `type` filter of `/library/sections/{key}/all`.
const fn plex_type(media_type: MediaType) -> Option<u8> {
    match media_type {
        MediaType::Movie => Some(1),
        MediaType::Series => Some(2),
        MediaType::Episode => Some(4),
        MediaType::Artist => Some(8),
        MediaType::Album => Some(9),
        MediaType::Track => Some(10),
        MediaType::Playlist | MediaType::Collection => None,
    }
}

/// Library section type holding a media type.
const fn section_type(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Series | MediaType::Episode => "show",
        MediaType::Artist | MediaType::Album | MediaType::Track => "artist",
        _ => "movie",
    }
}

pub struct PlexClient {
    http: Client,
    client_id: i32,
    name: String,
    base_url: String,
    token: String,
    machine_id: OnceCell<String>,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<T> {
    media_container: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IdentityContainer {
    machine_identifier: String,
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SectionsContainer {
    #[serde(rename = "Directory")]
    directory: Vec<Section>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Section {
    key: String,
    title: String,
    #[serde(rename = "type")]
    section_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MetadataContainer {
    total_size: Option<u32>,
    #[serde(rename = "Metadata")]
    metadata: Vec<PlexMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlexMetadata {
    rating_key: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    original_title: Option<String>,
    year: Option<i32>,
    summary: Option<String>,
    /// Milliseconds.
    duration: Option<u64>,
    audience_rating: Option<f32>,
    rating: Option<f32>,
    content_rating: Option<String>,
    grandparent_title: Option<String>,
    parent_title: Option<String>,
    parent_index: Option<u32>,
    index: Option<u32>,
    child_count: Option<u32>,
    leaf_count: Option<u32>,
    thumb: Option<String>,
    originally_available_at: Option<String>,
    #[serde(rename = "playlistItemID")]
    playlist_item_id: Option<u64>,
    playlist_type: Option<String>,
    smart: Option<bool>,
    #[serde(rename = "Genre")]
    genre: Vec<Tag>,
    #[serde(rename = "Guid")]
    guid: Vec<GuidEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Tag {
    tag: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GuidEntry {
    id: String,
}

impl PlexClient {
    pub fn new(
        http: Client,
        record: &ClientRecord,
        base_url: String,
        page_size: u32,
    ) -> Result<Self, ClientError> {
        let token = non_empty(record.api_key.clone()).ok_or_else(|| {
            ClientError::Config(format!("plex client '{}' needs a token", record.name))
        })?;

        Ok(Self {
            http,
            client_id: record.id,
            name: record.name.clone(),
            base_url,
            token,
            machine_id: OnceCell::new(),
            page_size: page_size.max(1),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.token)
            .header("X-Plex-Product", "mediahub")
            .header("X-Plex-Client-Identifier", format!("mediahub-{}", self.client_id))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let envelope: Envelope<T> =
            read_json(SERVICE, self.request(Method::GET, path).query(query).send().await?).await?;
        Ok(envelope.media_container)
    }

    async fn identity(&self) -> Result<IdentityContainer, ClientError> {
        self.get("/identity", &[]).await
    }

    async fn machine_id(&self) -> Result<&str, ClientError> {
        self.machine_id
            .get_or_try_init(|| async {
                Ok::<_, ClientError>(self.identity().await?.machine_identifier)
            })
            .await
            .map(String::as_str)
    }

    async fn sections(&self, kind: &str) -> Result<Vec<Section>, ClientError> {
        let container: SectionsContainer = self.get("/library/sections", &[]).await?;
        Ok(container
            .directory
            .into_iter()
            .filter(|s| s.section_type == kind)
            .collect())
    }

    /// Pages through a metadata listing with the container start/size parameters.
    async fn paged(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<PlexMetadata>, ClientError> {
        let mut items = Vec::new();
        let mut start = 0u32;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("X-Plex-Container-Start", start.to_string()),
                ("X-Plex-Container-Size", self.page_size.to_string()),
                ("includeGuids", "1".to_string()),
            ];
            query.extend(extra.iter().cloned());

            let page: MetadataContainer = self.get(path, &query).await?;
            let received = u32::try_from(page.metadata.len()).unwrap_or(u32::MAX);
            items.extend(page.metadata);
            start = start.saturating_add(received);

            let done = match page.total_size {
                Some(total) => start >= total,
                None => received < self.page_size,
            };
            if received == 0 || done {
                break;
            }
        }

        Ok(items)
    }

    async fn library_items(&self, media_type: MediaType) -> Result<Vec<PlexMetadata>, ClientError> {
        let Some(type_id) = plex_type(media_type) else {
            return Ok(Vec::new());
        };

        let mut items = Vec::new();
        for section in self.sections(section_type(media_type)).await? {
            let path = format!("/library/sections/{}/all", section.key);
            let found = self.paged(&path, &[("type", type_id.to_string())]).await?;
            debug!(
                client = %self.name,
                section = %section.title,
                %media_type,
                count = found.len(),
                "Fetched section"
            );
            items.extend(found);
        }
        Ok(items)
    }

    async fn list_entries(&self, path: &str) -> Result<Vec<ListEntry>, ClientError> {
        Ok(self.paged(path, &[]).await?.iter().map(to_list_entry).collect())
    }

    fn library_uri(machine_id: &str, item_ids: &[String]) -> String {
        format!(
            "server://{machine_id}/com.plexapp.plugins.library/library/metadata/{}",
            item_ids.join(",")
        )
    }

    fn item<T: MediaData>(&self, meta: &PlexMetadata, data: T) -> MediaItem<T> {
        let mut item = MediaItem::new(meta.title.clone().unwrap_or_default(), data)
            .with_source(self.client_id, meta.rating_key.clone());
        item.original_title = non_empty(meta.original_title.clone());
        item.year = meta.year;
        item.overview = non_empty(meta.summary.clone());
        item.genres = meta.genre.iter().map(|g| g.tag.clone()).collect();
        item.external_ids = external_ids(&meta.guid);
        item.image_url = meta
            .thumb
            .as_ref()
            .map(|thumb| format!("{}{thumb}", self.base_url));
        item
    }
}

fn external_ids(guids: &[GuidEntry]) -> ExternalIds {
    let mut ids = ExternalIds::default();
    for guid in guids {
        let Some((scheme, value)) = guid.id.split_once("://") else {
            continue;
        };
        let value = Some(value.to_string());
        match scheme {
            "tmdb" => ids.tmdb = value,
            "imdb" => ids.imdb = value,
            "tvdb" => ids.tvdb = value,
            "mbid" => ids.musicbrainz = value,
            _ => {}
        }
    }
    ids
}

fn media_type_of(meta: &PlexMetadata) -> MediaType {
    match meta.kind.as_deref() {
        Some("show") => MediaType::Series,
        Some("episode") => MediaType::Episode,
        Some("artist") => MediaType::Artist,
        Some("album") => MediaType::Album,
        Some("track") => MediaType::Track,
        Some("playlist") => MediaType::Playlist,
        Some("collection") => MediaType::Collection,
        _ => MediaType::Movie,
    }
}

fn to_list_entry(meta: &PlexMetadata) -> ListEntry {
    ListEntry {
        entry_id: meta.playlist_item_id.map(|id| id.to_string()),
        item_id: meta.rating_key.clone(),
        media_type: media_type_of(meta),
        title: meta.title.clone().unwrap_or_default(),
        year: meta.year,
        artist: meta.grandparent_title.clone(),
        external_ids: external_ids(&meta.guid),
    }
}

fn duration_seconds(meta: &PlexMetadata) -> Option<u32> {
    meta.duration.and_then(|ms| u32::try_from(ms / 1000).ok())
}

#[async_trait]
impl MediaClient for PlexClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Plex
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn client_id(&self) -> i32 {
        self.client_id
    }

    fn supported_types(&self) -> &'static [MediaType] {
        SUPPORTED
    }

    async fn test_connection(&self) -> Result<ServerInfo, ClientError> {
        let identity = self.identity().await?;
        Ok(ServerInfo {
            name: self.name.clone(),
            version: identity.version,
            id: Some(identity.machine_identifier),
        })
    }

    async fn movies(&self) -> Result<Vec<MediaItem<Movie>>, ClientError> {
        let items = self.library_items(MediaType::Movie).await?;
        Ok(items
            .iter()
            .map(|meta| {
                let data = Movie {
                    runtime_minutes: duration_seconds(meta).map(|s| s / 60),
                    community_rating: meta.audience_rating.or(meta.rating),
                    official_rating: meta.content_rating.clone(),
                };
                self.item(meta, data)
            })
            .collect())
    }

    async fn series(&self) -> Result<Vec<MediaItem<Series>>, ClientError> {
        let items = self.library_items(MediaType::Series).await?;
        Ok(items
            .iter()
            .map(|meta| {
                let data = Series {
                    status: None,
                    season_count: meta.child_count,
                    episode_count: meta.leaf_count,
                };
                self.item(meta, data)
            })
            .collect())
    }

    async fn episodes(&self) -> Result<Vec<MediaItem<Episode>>, ClientError> {
        let items = self.library_items(MediaType::Episode).await?;
        Ok(items
            .iter()
            .map(|meta| {
                let data = Episode {
                    series_title: meta.grandparent_title.clone(),
                    season_number: meta.parent_index,
                    episode_number: meta.index,
                    air_date: meta.originally_available_at.clone(),
                };
                self.item(meta, data)
            })
            .collect())
    }

    async fn artists(&self) -> Result<Vec<MediaItem<Artist>>, ClientError> {
        let items = self.library_items(MediaType::Artist).await?;
        Ok(items
            .iter()
            .map(|meta| {
                let data = Artist {
                    album_count: meta.child_count,
                };
                self.item(meta, data)
            })
            .collect())
    }

    async fn albums(&self) -> Result<Vec<MediaItem<Album>>, ClientError> {
        let items = self.library_items(MediaType::Album).await?;
        Ok(items
            .iter()
            .map(|meta| {
                let data = Album {
                    artist: meta.parent_title.clone(),
                    track_count: meta.leaf_count,
                };
                self.item(meta, data)
            })
            .collect())
    }

    async fn tracks(&self) -> Result<Vec<MediaItem<Track>>, ClientError> {
        let items = self.library_items(MediaType::Track).await?;
        Ok(items
            .iter()
            .map(|meta| {
                let data = Track {
                    artist: meta.grandparent_title.clone(),
                    album: meta.parent_title.clone(),
                    track_number: meta.index,
                    duration_seconds: duration_seconds(meta),
                };
                self.item(meta, data)
            })
            .collect())
    }

    async fn playlists(&self) -> Result<Vec<MediaItem<Playlist>>, ClientError> {
        let lists: MetadataContainer = self.get("/playlists", &[]).await?;
        let mut result = Vec::with_capacity(lists.metadata.len());

        for meta in lists
            .metadata
            .iter()
            .filter(|m| m.playlist_type.as_deref() != Some("photo") && m.smart != Some(true))
        {
            let entries = self
                .list_entries(&format!("/playlists/{}/items", meta.rating_key))
                .await?;
            result.push(self.item(
                meta,
                Playlist {
                    owner: None,
                    entries,
                },
            ));
        }

        Ok(result)
    }

    async fn collections(&self) -> Result<Vec<MediaItem<Collection>>, ClientError> {
        let mut result = Vec::new();

        for kind in ["movie", "show", "artist"] {
            for section in self.sections(kind).await? {
                let sets = self
                    .paged(&format!("/library/sections/{}/collections", section.key), &[])
                    .await?;
                for meta in &sets {
                    let entries = self
                        .list_entries(&format!("/library/collections/{}/children", meta.rating_key))
                        .await?;
                    result.push(self.item(meta, Collection { entries }));
                }
            }
        }

        Ok(result)
    }

    async fn playlist(&self, list_id: &str) -> Result<Option<MediaItem<Playlist>>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/playlists/{list_id}"))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: Envelope<MetadataContainer> = read_json(SERVICE, response).await?;
        let Some(meta) = envelope.media_container.metadata.first() else {
            return Ok(None);
        };

        let entries = self
            .list_entries(&format!("/playlists/{list_id}/items"))
            .await?;
        Ok(Some(self.item(
            meta,
            Playlist {
                owner: None,
                entries,
            },
        )))
    }

    async fn create_playlist(
        &self,
        name: &str,
        media_type: MediaType,
        item_ids: &[String],
    ) -> Result<String, ClientError> {
        let machine_id = self.machine_id().await?;
        let list_type = if media_type.is_music() { "audio" } else { "video" };
        let uri = Self::library_uri(machine_id, item_ids);

        let envelope: Envelope<MetadataContainer> = read_json(
            SERVICE,
            self.request(Method::POST, "/playlists")
                .query(&[
                    ("type", list_type),
                    ("title", name),
                    ("smart", "0"),
                    ("uri", uri.as_str()),
                ])
                .send()
                .await?,
        )
        .await?;

        envelope
            .media_container
            .metadata
            .first()
            .map(|m| m.rating_key.clone())
            .ok_or_else(|| ClientError::Decode {
                service: SERVICE,
                message: "playlist creation returned no metadata".to_string(),
            })
    }

    async fn add_to_playlist(&self, list_id: &str, item_ids: &[String]) -> Result<(), ClientError> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let machine_id = self.machine_id().await?;
        let uri = Self::library_uri(machine_id, item_ids);

        check_status(
            SERVICE,
            self.request(Method::PUT, &format!("/playlists/{list_id}/items"))
                .query(&[("uri", uri)])
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn remove_from_playlist(
        &self,
        list_id: &str,
        entry_ids: &[String],
    ) -> Result<(), ClientError> {
        for entry_id in entry_ids {
            check_status(
                SERVICE,
                self.request(
                    Method::DELETE,
                    &format!("/playlists/{list_id}/items/{entry_id}"),
                )
                .send()
                .await?,
            )
            .await?;
        }
        Ok(())
    }
}
