//! Emby and Jellyfin share the MediaBrowser REST API; one client serves both.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{ClientError, ClientKind, MediaClient, ServerInfo, check_status, non_empty, read_json};
use crate::models::{
    Album, Artist, ClientRecord, Collection, Episode, ExternalIds, ListEntry, MediaData, MediaItem,
    MediaType, Movie, Playlist, Series, Track,
};

const TICKS_PER_SECOND: i64 = 10_000_000;

const ITEM_FIELDS: &str = concat!(
    "ProviderIds,Genres,Overview,ProductionYear,OriginalTitle,",
    "PremiereDate,ChildCount,RecursiveItemCount"
);

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

pub struct MediaBrowserClient {
    http: Client,
    kind: ClientKind,
    client_id: i32,
    name: String,
    base_url: String,
    api_key: String,
    configured_user: Option<String>,
    user_id: OnceCell<String>,
    page_size: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ItemsResponse {
    items: Vec<BaseItemDto>,
    total_record_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct BaseItemDto {
    id: String,
    name: Option<String>,
    original_title: Option<String>,
    production_year: Option<i32>,
    overview: Option<String>,
    genres: Vec<String>,
    provider_ids: HashMap<String, String>,
    run_time_ticks: Option<i64>,
    community_rating: Option<f32>,
    official_rating: Option<String>,
    status: Option<String>,
    child_count: Option<u32>,
    recursive_item_count: Option<u32>,
    series_name: Option<String>,
    parent_index_number: Option<u32>,
    index_number: Option<u32>,
    premiere_date: Option<String>,
    album: Option<String>,
    album_artist: Option<String>,
    artists: Vec<String>,
    playlist_item_id: Option<String>,
    image_tags: HashMap<String, String>,
    #[serde(rename = "Type")]
    item_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SystemInfo {
    server_name: Option<String>,
    version: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserDto {
    id: String,
    #[serde(default)]
    policy: Option<UserPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserPolicy {
    #[serde(default)]
    is_administrator: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedPlaylist {
    id: String,
}

impl MediaBrowserClient {
    pub fn new(
        http: Client,
        record: &ClientRecord,
        base_url: String,
        page_size: u32,
    ) -> Result<Self, ClientError> {
        let api_key = non_empty(record.api_key.clone()).ok_or_else(|| {
            let (kind, name) = (record.kind, &record.name);
            ClientError::Config(format!("{kind} client '{name}' needs an api key"))
        })?;

        Ok(Self {
            http,
            kind: record.kind,
            client_id: record.id,
            name: record.name.clone(),
            base_url,
            api_key,
            configured_user: non_empty(record.user_id.clone()),
            user_id: OnceCell::new(),
            page_size: page_size.max(1),
        })
    }

    const fn service(&self) -> &'static str {
        self.kind.as_str()
    }

    fn authorization(&self) -> String {
        format!(
            concat!(
                r#"MediaBrowser Client="mediahub", Device="mediahub", "#,
                r#"DeviceId="mediahub-{}", Version="{}", Token="{}""#
            ),
            self.client_id,
            env!("CARGO_PKG_VERSION"),
            self.api_key
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let auth = self.authorization();
        let builder = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .header("Accept", "application/json")
            .header("X-Emby-Token", &self.api_key)
            .header("X-Emby-Authorization", &auth);

        if self.kind == ClientKind::Jellyfin {
            builder.header("Authorization", auth)
        } else {
            builder
        }
    }

    async fn user_id(&self) -> Result<&str, ClientError> {
        self.user_id
            .get_or_try_init(|| async {
                if let Some(user) = &self.configured_user {
                    return Ok(user.clone());
                }

                let users: Vec<UserDto> =
                    read_json(self.service(), self.request(Method::GET, "/Users").send().await?)
                        .await?;

                let chosen = users
                    .iter()
                    .find(|u| u.policy.as_ref().is_some_and(|p| p.is_administrator))
                    .or_else(|| users.first())
                    .ok_or_else(|| ClientError::Auth {
                        service: self.service(),
                        message: "no users visible with this api key".to_string(),
                    })?;

                debug!(client = %self.name, user_id = %chosen.id, "Resolved browsing user");
                Ok::<_, ClientError>(chosen.id.clone())
            })
            .await
            .map(String::as_str)
    }

    /// Pages through `/Users/{id}/Items` until `TotalRecordCount` is reached.
    async fn fetch_items(
        &self,
        params: &[(&str, String)],
    ) -> Result<Vec<BaseItemDto>, ClientError> {
        let user_id = self.user_id().await?;
        let path = format!("/Users/{user_id}/Items");
        let mut items = Vec::new();
        let mut start = 0u32;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("Recursive", "true".to_string()),
                ("Fields", ITEM_FIELDS.to_string()),
                ("StartIndex", start.to_string()),
                ("Limit", self.page_size.to_string()),
            ];
            query.extend(params.iter().cloned());

            let page: ItemsResponse = read_json(
                self.service(),
                self.request(Method::GET, &path).query(&query).send().await?,
            )
            .await?;

            let received = u32::try_from(page.items.len()).unwrap_or(u32::MAX);
            items.extend(page.items);
            start = start.saturating_add(received);

            let total = page.total_record_count.unwrap_or(0);
            if received == 0 || start >= total {
                break;
            }
        }

        debug!(client = %self.name, count = items.len(), "Fetched items");
        Ok(items)
    }

    async fn fetch_type(&self, item_type: &str) -> Result<Vec<BaseItemDto>, ClientError> {
        self.fetch_items(&[("IncludeItemTypes", item_type.to_string())])
            .await
    }

    async fn playlist_entries(&self, list_id: &str) -> Result<Vec<ListEntry>, ClientError> {
        let user_id = self.user_id().await?;
        let page: ItemsResponse = read_json(
            self.service(),
            self.request(Method::GET, &format!("/Playlists/{list_id}/Items"))
                .query(&[("UserId", user_id), ("Fields", ITEM_FIELDS)])
                .send()
                .await?,
        )
        .await?;

        Ok(page.items.iter().map(to_list_entry).collect())
    }

    fn item<T: MediaData>(
        &self,
        dto: &BaseItemDto,
        data: T,
        musicbrainz_key: Option<&str>,
    ) -> MediaItem<T> {
        let mut item = MediaItem::new(dto.name.clone().unwrap_or_default(), data)
            .with_source(self.client_id, dto.id.clone());
        item.original_title = non_empty(dto.original_title.clone());
        item.year = dto.production_year;
        item.overview = non_empty(dto.overview.clone());
        item.genres.clone_from(&dto.genres);
        item.external_ids = external_ids(&dto.provider_ids, musicbrainz_key);
        if dto.image_tags.contains_key("Primary") {
            item.image_url = Some(format!("{}/Items/{}/Images/Primary", self.base_url, dto.id));
        }
        item
    }
}

fn provider_id(ids: &HashMap<String, String>, key: &str) -> Option<String> {
    ids.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
}

fn external_ids(ids: &HashMap<String, String>, musicbrainz_key: Option<&str>) -> ExternalIds {
    ExternalIds {
        tmdb: provider_id(ids, "Tmdb"),
        imdb: provider_id(ids, "Imdb"),
        tvdb: provider_id(ids, "Tvdb"),
        musicbrainz: musicbrainz_key.and_then(|k| provider_id(ids, k)),
    }
}

fn ticks_to_seconds(ticks: Option<i64>) -> Option<u32> {
    ticks.and_then(|t| u32::try_from(t / TICKS_PER_SECOND).ok())
}

fn item_media_type(dto: &BaseItemDto) -> MediaType {
    match dto.item_type.as_deref() {
        Some("Series") => MediaType::Series,
        Some("Episode") => MediaType::Episode,
        Some("MusicArtist") => MediaType::Artist,
        Some("MusicAlbum") => MediaType::Album,
        Some("Audio") => MediaType::Track,
        Some("Playlist") => MediaType::Playlist,
        Some("BoxSet") => MediaType::Collection,
        _ => MediaType::Movie,
    }
}

fn to_list_entry(dto: &BaseItemDto) -> ListEntry {
    let media_type = item_media_type(dto);
    let musicbrainz = match media_type {
        MediaType::Track => Some("MusicBrainzTrack"),
        MediaType::Album => Some("MusicBrainzAlbum"),
        _ => None,
    };

    ListEntry {
        entry_id: dto.playlist_item_id.clone(),
        item_id: dto.id.clone(),
        media_type,
        title: dto.name.clone().unwrap_or_default(),
        year: dto.production_year,
        artist: dto
            .album_artist
            .clone()
            .or_else(|| dto.artists.first().cloned()),
        external_ids: external_ids(&dto.provider_ids, musicbrainz),
    }
}

#[async_trait]
impl MediaClient for MediaBrowserClient {
    fn kind(&self) -> ClientKind {
        self.kind
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
        let info: SystemInfo = read_json(
            self.service(),
            self.request(Method::GET, "/System/Info").send().await?,
        )
        .await?;

        Ok(ServerInfo {
            name: info.server_name.unwrap_or_else(|| self.name.clone()),
            version: info.version,
            id: info.id,
        })
    }

    async fn movies(&self) -> Result<Vec<MediaItem<Movie>>, ClientError> {
        let items = self.fetch_type("Movie").await?;
        Ok(items
            .iter()
            .map(|dto| {
                let data = Movie {
                    runtime_minutes: ticks_to_seconds(dto.run_time_ticks).map(|s| s / 60),
                    community_rating: dto.community_rating,
                    official_rating: dto.official_rating.clone(),
                };
                self.item(dto, data, None)
            })
            .collect())
    }

    async fn series(&self) -> Result<Vec<MediaItem<Series>>, ClientError> {
        let items = self.fetch_type("Series").await?;
        Ok(items
            .iter()
            .map(|dto| {
                let data = Series {
                    status: dto.status.clone(),
                    season_count: dto.child_count,
                    episode_count: dto.recursive_item_count,
                };
                self.item(dto, data, None)
            })
            .collect())
    }

    async fn episodes(&self) -> Result<Vec<MediaItem<Episode>>, ClientError> {
        let items = self.fetch_type("Episode").await?;
        Ok(items
            .iter()
            .map(|dto| {
                let data = Episode {
                    series_title: dto.series_name.clone(),
                    season_number: dto.parent_index_number,
                    episode_number: dto.index_number,
                    air_date: dto
                        .premiere_date
                        .as_deref()
                        .map(|d| d.chars().take(10).collect()),
                };
                self.item(dto, data, None)
            })
            .collect())
    }

    async fn artists(&self) -> Result<Vec<MediaItem<Artist>>, ClientError> {
        let items = self.fetch_type("MusicArtist").await?;
        Ok(items
            .iter()
            .map(|dto| {
                let data = Artist {
                    album_count: dto.child_count,
                };
                self.item(dto, data, Some("MusicBrainzArtist"))
            })
            .collect())
    }

    async fn albums(&self) -> Result<Vec<MediaItem<Album>>, ClientError> {
        let items = self.fetch_type("MusicAlbum").await?;
        Ok(items
            .iter()
            .map(|dto| {
                let data = Album {
                    artist: dto
                        .album_artist
                        .clone()
                        .or_else(|| dto.artists.first().cloned()),
                    track_count: dto.child_count.or(dto.recursive_item_count),
                };
                self.item(dto, data, Some("MusicBrainzAlbum"))
            })
            .collect())
    }

    async fn tracks(&self) -> Result<Vec<MediaItem<Track>>, ClientError> {
        let items = self.fetch_type("Audio").await?;
        Ok(items
            .iter()
            .map(|dto| {
                let data = Track {
                    artist: dto
                        .artists
                        .first()
                        .cloned()
                        .or_else(|| dto.album_artist.clone()),
                    album: dto.album.clone(),
                    track_number: dto.index_number,
                    duration_seconds: ticks_to_seconds(dto.run_time_ticks),
                };
                self.item(dto, data, Some("MusicBrainzTrack"))
            })
            .collect())
    }

    async fn playlists(&self) -> Result<Vec<MediaItem<Playlist>>, ClientError> {
        let lists = self.fetch_type("Playlist").await?;
        let mut result = Vec::with_capacity(lists.len());

        for dto in &lists {
            let entries = self.playlist_entries(&dto.id).await?;
            result.push(self.item(
                dto,
                Playlist {
                    owner: None,
                    entries,
                },
                None,
            ));
        }

        Ok(result)
    }

    async fn collections(&self) -> Result<Vec<MediaItem<Collection>>, ClientError> {
        let sets = self.fetch_type("BoxSet").await?;
        let mut result = Vec::with_capacity(sets.len());

        for dto in &sets {
            let children = self
                .fetch_items(&[("ParentId", dto.id.clone())])
                .await?;
            let entries = children.iter().map(to_list_entry).collect();
            result.push(self.item(dto, Collection { entries }, None));
        }

        Ok(result)
    }

    async fn playlist(&self, list_id: &str) -> Result<Option<MediaItem<Playlist>>, ClientError> {
        let user_id = self.user_id().await?;
        let response = self
            .request(Method::GET, &format!("/Users/{user_id}/Items/{list_id}"))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let dto: BaseItemDto = read_json(self.service(), response).await?;
        let entries = self.playlist_entries(list_id).await?;
        Ok(Some(self.item(
            &dto,
            Playlist {
                owner: None,
                entries,
            },
            None,
        )))
    }

    async fn create_playlist(
        &self,
        name: &str,
        media_type: MediaType,
        item_ids: &[String],
    ) -> Result<String, ClientError> {
        let user_id = self.user_id().await?;
        let list_media_type = if media_type.is_music() { "Audio" } else { "Video" };

        let created: CreatedPlaylist = read_json(
            self.service(),
            self.request(Method::POST, "/Playlists")
                .query(&[
                    ("Name", name),
                    ("Ids", item_ids.join(",").as_str()),
                    ("UserId", user_id),
                    ("MediaType", list_media_type),
                ])
                .send()
                .await?,
        )
        .await?;

        Ok(created.id)
    }

    async fn add_to_playlist(&self, list_id: &str, item_ids: &[String]) -> Result<(), ClientError> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let user_id = self.user_id().await?;

        check_status(
            self.service(),
            self.request(Method::POST, &format!("/Playlists/{list_id}/Items"))
                .query(&[("Ids", item_ids.join(",").as_str()), ("UserId", user_id)])
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
        if entry_ids.is_empty() {
            return Ok(());
        }

        check_status(
            self.service(),
            self.request(Method::DELETE, &format!("/Playlists/{list_id}/Items"))
                .query(&[("EntryIds", entry_ids.join(","))])
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(kind: ClientKind) -> MediaBrowserClient {
        let record = ClientRecord {
            id: 3,
            name: "Den".into(),
            kind,
            base_url: "http://emby:8096".into(),
            api_key: Some("key".into()),
            username: None,
            password: None,
            user_id: Some("u1".into()),
            enabled: true,
            created_at: String::new(),
            last_synced_at: None,
        };
        MediaBrowserClient::new(Client::new(), &record, "http://emby:8096".into(), 50).unwrap()
    }

    const MOVIE_JSON: &str = r#"{
        "Items": [{
            "Id": "m1",
            "Name": "The Matrix",
            "Type": "Movie",
            "ProductionYear": 1999,
            "Overview": "Neo wakes up.",
            "Genres": ["Action", "Science Fiction"],
            "ProviderIds": {"Tmdb": "603", "Imdb": "tt0133093", "Tvdb": ""},
            "RunTimeTicks": 81600000000,
            "CommunityRating": 8.2,
            "ImageTags": {"Primary": "abc"}
        }],
        "TotalRecordCount": 1
    }"#;

    #[test]
    fn test_parse_items_and_convert_movie() {
        let page: ItemsResponse = serde_json::from_str(MOVIE_JSON).unwrap();
        assert_eq!(page.total_record_count, Some(1));

        let c = client(ClientKind::Emby);
        let dto = &page.items[0];
        let item = c.item(
            dto,
            Movie {
                runtime_minutes: ticks_to_seconds(dto.run_time_ticks).map(|s| s / 60),
                community_rating: dto.community_rating,
                official_rating: None,
            },
            None,
        );

        assert_eq!(item.title, "The Matrix");
        assert_eq!(item.year, Some(1999));
        assert_eq!(item.data.runtime_minutes, Some(136));
        assert_eq!(item.external_ids.tmdb.as_deref(), Some("603"));
        assert_eq!(item.external_ids.imdb.as_deref(), Some("tt0133093"));
        assert_eq!(item.external_ids.tvdb, None);
        assert_eq!(item.source_for(3), Some("m1"));
        assert_eq!(
            item.image_url.as_deref(),
            Some("http://emby:8096/Items/m1/Images/Primary")
        );
    }

    #[test]
    fn test_playlist_entry_conversion() {
        let json = r#"{
            "Id": "t9",
            "Name": "Something",
            "Type": "Audio",
            "PlaylistItemId": "pe-1",
            "Artists": ["The Beatles"],
            "ProviderIds": {"MusicBrainzTrack": "mb-1"}
        }"#;
        let dto: BaseItemDto = serde_json::from_str(json).unwrap();
        let entry = to_list_entry(&dto);

        assert_eq!(entry.media_type, MediaType::Track);
        assert_eq!(entry.entry_id.as_deref(), Some("pe-1"));
        assert_eq!(entry.item_id, "t9");
        assert_eq!(entry.artist.as_deref(), Some("The Beatles"));
        assert_eq!(entry.external_ids.musicbrainz.as_deref(), Some("mb-1"));
    }

    #[test]
    fn test_authorization_header() {
        let c = client(ClientKind::Jellyfin);
        let header = c.authorization();
        assert!(header.starts_with("MediaBrowser Client=\"mediahub\""));
        assert!(header.contains("Token=\"key\""));
        assert!(header.contains("DeviceId=\"mediahub-3\""));
    }

    #[test]
    fn test_requires_api_key() {
        let record = ClientRecord {
            id: 1,
            name: "NoKey".into(),
            kind: ClientKind::Emby,
            base_url: "http://emby".into(),
            api_key: Some("  ".into()),
            username: None,
            password: None,
            user_id: None,
            enabled: true,
            created_at: String::new(),
            last_synced_at: None,
        };
        assert!(matches!(
            MediaBrowserClient::new(Client::new(), &record, "http://emby".into(), 10),
            Err(ClientError::Config(_))
        ));
    }
}
