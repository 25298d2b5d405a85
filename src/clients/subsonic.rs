//! Subsonic API (Navidrome, Airsonic, Gonic, ...). Music only.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{
    ClientError, ClientKind, MediaClient, ServerInfo, check_status, non_empty, truncate_body,
};
use crate::models::{
    Album, Artist, ClientRecord, ExternalIds, ListEntry, MediaData, MediaItem, MediaType, Playlist,
    Track,
};

const SERVICE: &str = "subsonic";
const API_VERSION: &str = "1.16.1";

const SUPPORTED: &[MediaType] = &[
    MediaType::Artist,
    MediaType::Album,
    MediaType::Track,
    MediaType::Playlist,
];

enum Credentials {
    /// Password sent hex encoded as `p=enc:...`.
    Password { username: String, password: String },
    /// OpenSubsonic `apiKey` extension.
    ApiKey(String),
}

pub struct SubsonicClient {
    http: Client,
    client_id: i32,
    name: String,
    base_url: String,
    credentials: Credentials,
    page_size: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PingPayload {
    version: Option<String>,
    #[serde(rename = "type")]
    server_type: Option<String>,
    server_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistsPayload {
    artists: Option<ArtistsIndex>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistsIndex {
    index: Vec<ArtistIndexEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistIndexEntry {
    artist: Vec<SubsonicArtist>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubsonicArtist {
    id: String,
    name: String,
    album_count: Option<u32>,
    music_brainz_id: Option<String>,
    cover_art: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlbumListPayload {
    #[serde(rename = "albumList2")]
    album_list: Option<AlbumList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlbumList {
    album: Vec<SubsonicAlbum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlbumPayload {
    album: Option<SubsonicAlbum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubsonicAlbum {
    id: String,
    name: String,
    artist: Option<String>,
    year: Option<i32>,
    genre: Option<String>,
    song_count: Option<u32>,
    cover_art: Option<String>,
    music_brainz_id: Option<String>,
    song: Vec<SubsonicSong>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubsonicSong {
    id: String,
    title: String,
    album: Option<String>,
    artist: Option<String>,
    track: Option<u32>,
    year: Option<i32>,
    genre: Option<String>,
    duration: Option<u32>,
    cover_art: Option<String>,
    music_brainz_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaylistsPayload {
    playlists: Option<PlaylistList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaylistList {
    playlist: Vec<SubsonicPlaylist>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaylistPayload {
    playlist: Option<SubsonicPlaylist>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubsonicPlaylist {
    id: String,
    name: String,
    owner: Option<String>,
    comment: Option<String>,
    cover_art: Option<String>,
    entry: Vec<SubsonicSong>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmptyPayload {}

/// Unwraps `subsonic-response`, turning `status: failed` into an error.
fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    let decode_error = |message: String| {
        debug!(service = SERVICE, body = %truncate_body(body), "Failed to parse response");
        ClientError::Decode {
            service: SERVICE,
            message,
        }
    };

    let mut root: Value = serde_json::from_str(body).map_err(|e| decode_error(e.to_string()))?;
    let response = root
        .get_mut("subsonic-response")
        .map(Value::take)
        .ok_or_else(|| decode_error("missing subsonic-response".to_string()))?;

    if response.get("status").and_then(Value::as_str) != Some("ok") {
        let code = response
            .pointer("/error/code")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let message = response
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();

        // 40 wrong credentials, 41 token auth unsupported, 44 invalid api key
        return Err(if matches!(code, 40 | 41 | 44) {
            ClientError::Auth {
                service: SERVICE,
                message,
            }
        } else {
            ClientError::Status {
                service: SERVICE,
                status: u16::try_from(code).unwrap_or(0),
                body: message,
            }
        });
    }

    serde_json::from_value(response).map_err(|e| decode_error(e.to_string()))
}

impl SubsonicClient {
    pub fn new(
        http: Client,
        record: &ClientRecord,
        base_url: String,
        page_size: u32,
    ) -> Result<Self, ClientError> {
        let username = non_empty(record.username.clone());
        let password = non_empty(record.password.clone());

        let credentials = match (username, password, non_empty(record.api_key.clone())) {
            (Some(username), Some(password), _) => Credentials::Password { username, password },
            (_, _, Some(key)) => Credentials::ApiKey(key),
            _ => {
                return Err(ClientError::Config(format!(
                    "subsonic client '{}' needs a username and password or an api key",
                    record.name
                )));
            }
        };

        Ok(Self {
            http,
            client_id: record.id,
            name: record.name.clone(),
            base_url,
            credentials,
            page_size: page_size.clamp(1, 500),
        })
    }

    fn auth_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("v", API_VERSION.to_string()),
            ("c", "mediahub".to_string()),
            ("f", "json".to_string()),
        ];
        match &self.credentials {
            Credentials::Password { username, password } => {
                params.push(("u", username.clone()));
                params.push(("p", format!("enc:{}", hex::encode(password))));
            }
            Credentials::ApiKey(key) => params.push(("apiKey", key.clone())),
        }
        params
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .get(format!("{}/rest/{method}.view", self.base_url))
            .query(&self.auth_params())
            .query(params)
            .send()
            .await?;

        let body = check_status(SERVICE, response).await?.text().await?;
        decode_envelope(&body)
    }

    fn cover_url(&self, cover_art: Option<&String>) -> Option<String> {
        cover_art.map(|id| format!("{}/rest/getCoverArt.view?id={id}", self.base_url))
    }

    fn item<T: MediaData>(&self, id: &str, title: &str, data: T) -> MediaItem<T> {
        MediaItem::new(title, data).with_source(self.client_id, id)
    }

    async fn album_list(&self) -> Result<Vec<SubsonicAlbum>, ClientError> {
        let mut albums = Vec::new();
        let mut offset = 0u32;

        loop {
            let payload: AlbumListPayload = self
                .call(
                    "getAlbumList2",
                    &[
                        ("type", "alphabeticalByName".to_string()),
                        ("size", self.page_size.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let page = payload.album_list.map(|l| l.album).unwrap_or_default();
            let received = u32::try_from(page.len()).unwrap_or(u32::MAX);
            albums.extend(page);
            offset = offset.saturating_add(received);

            if received < self.page_size {
                break;
            }
        }

        debug!(client = %self.name, count = albums.len(), "Fetched album list");
        Ok(albums)
    }

    fn album_item(&self, album: &SubsonicAlbum) -> MediaItem<Album> {
        let mut item = self.item(
            &album.id,
            &album.name,
            Album {
                artist: album.artist.clone(),
                track_count: album.song_count,
            },
        );
        item.year = album.year.filter(|y| *y > 0);
        item.genres = album.genre.iter().cloned().collect();
        item.external_ids.musicbrainz = non_empty(album.music_brainz_id.clone());
        item.image_url = self.cover_url(album.cover_art.as_ref());
        item
    }

    fn track_item(&self, song: &SubsonicSong) -> MediaItem<Track> {
        let mut item = self.item(
            &song.id,
            &song.title,
            Track {
                artist: song.artist.clone(),
                album: song.album.clone(),
                track_number: song.track,
                duration_seconds: song.duration,
            },
        );
        item.year = song.year.filter(|y| *y > 0);
        item.genres = song.genre.iter().cloned().collect();
        item.external_ids.musicbrainz = non_empty(song.music_brainz_id.clone());
        item.image_url = self.cover_url(song.cover_art.as_ref());
        item
    }

    fn playlist_item(&self, list: &SubsonicPlaylist) -> MediaItem<Playlist> {
        let entries = list
            .entry
            .iter()
            .enumerate()
            .map(|(index, song)| ListEntry {
                entry_id: Some(index.to_string()),
                item_id: song.id.clone(),
                media_type: MediaType::Track,
                title: song.title.clone(),
                year: song.year.filter(|y| *y > 0),
                artist: song.artist.clone(),
                external_ids: ExternalIds {
                    musicbrainz: non_empty(song.music_brainz_id.clone()),
                    ..ExternalIds::default()
                },
            })
            .collect();

        let mut item = self.item(
            &list.id,
            &list.name,
            Playlist {
                owner: list.owner.clone(),
                entries,
            },
        );
        item.overview = non_empty(list.comment.clone());
        item.image_url = self.cover_url(list.cover_art.as_ref());
        item
    }
}

#[async_trait]
impl MediaClient for SubsonicClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Subsonic
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
        let ping: PingPayload = self.call("ping", &[]).await?;
        Ok(ServerInfo {
            name: ping.server_type.unwrap_or_else(|| self.name.clone()),
            version: ping.server_version.or(ping.version),
            id: None,
        })
    }

    async fn artists(&self) -> Result<Vec<MediaItem<Artist>>, ClientError> {
        let payload: ArtistsPayload = self.call("getArtists", &[]).await?;

        Ok(payload
            .artists
            .map(|a| a.index)
            .unwrap_or_default()
            .iter()
            .flat_map(|index| &index.artist)
            .map(|artist| {
                let mut item = self.item(
                    &artist.id,
                    &artist.name,
                    Artist {
                        album_count: artist.album_count,
                    },
                );
                item.external_ids.musicbrainz = non_empty(artist.music_brainz_id.clone());
                item.image_url = self.cover_url(artist.cover_art.as_ref());
                item
            })
            .collect())
    }

    async fn albums(&self) -> Result<Vec<MediaItem<Album>>, ClientError> {
        Ok(self
            .album_list()
            .await?
            .iter()
            .map(|album| self.album_item(album))
            .collect())
    }

    async fn tracks(&self) -> Result<Vec<MediaItem<Track>>, ClientError> {
        let mut tracks = Vec::new();

        for album in self.album_list().await? {
            let payload: AlbumPayload = self.call("getAlbum", &[("id", album.id.clone())]).await?;
            if let Some(full) = payload.album {
                tracks.extend(full.song.iter().map(|song| self.track_item(song)));
            }
        }

        Ok(tracks)
    }

    async fn playlists(&self) -> Result<Vec<MediaItem<Playlist>>, ClientError> {
        let payload: PlaylistsPayload = self.call("getPlaylists", &[]).await?;
        let lists = payload.playlists.map(|p| p.playlist).unwrap_or_default();

        let mut result = Vec::with_capacity(lists.len());
        for list in &lists {
            if let Some(item) = self.playlist(&list.id).await? {
                result.push(item);
            }
        }
        Ok(result)
    }

    async fn playlist(&self, list_id: &str) -> Result<Option<MediaItem<Playlist>>, ClientError> {
        match self
            .call::<PlaylistPayload>("getPlaylist", &[("id", list_id.to_string())])
            .await
        {
            Ok(payload) => Ok(payload.playlist.map(|list| self.playlist_item(&list))),
            // 70: requested data not found
            Err(ClientError::Status { status: 70, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_playlist(
        &self,
        name: &str,
        _media_type: MediaType,
        item_ids: &[String],
    ) -> Result<String, ClientError> {
        let mut params = vec![("name", name.to_string())];
        params.extend(item_ids.iter().map(|id| ("songId", id.clone())));

        let payload: PlaylistPayload = self.call("createPlaylist", &params).await?;
        if let Some(list) = payload.playlist {
            return Ok(list.id);
        }

        // Servers before 1.14 return an empty body; look the list up by name.
        let lists: PlaylistsPayload = self.call("getPlaylists", &[]).await?;
        lists
            .playlists
            .map(|p| p.playlist)
            .unwrap_or_default()
            .into_iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| ClientError::Decode {
                service: SERVICE,
                message: format!("created playlist '{name}' not found"),
            })
    }

    async fn add_to_playlist(&self, list_id: &str, item_ids: &[String]) -> Result<(), ClientError> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let mut params = vec![("playlistId", list_id.to_string())];
        params.extend(item_ids.iter().map(|id| ("songIdToAdd", id.clone())));

        let _: EmptyPayload = self.call("updatePlaylist", &params).await?;
        Ok(())
    }

    async fn remove_from_playlist(
        &self,
        list_id: &str,
        entry_ids: &[String],
    ) -> Result<(), ClientError> {
        let indexes = removal_indexes(entry_ids)?;
        if indexes.is_empty() {
            return Ok(());
        }

        let mut params = vec![("playlistId", list_id.to_string())];
        params.extend(
            indexes
                .iter()
                .map(|index| ("songIndexToRemove", index.to_string())),
        );

        let _: EmptyPayload = self.call("updatePlaylist", &params).await?;
        Ok(())
    }
}

/// Entry ids are playlist positions; removal happens from the end so earlier
/// positions stay valid.
fn removal_indexes(entry_ids: &[String]) -> Result<Vec<usize>, ClientError> {
    let mut indexes = entry_ids
        .iter()
        .map(|id| {
            id.parse::<usize>()
                .map_err(|_| ClientError::Config(format!("invalid playlist index '{id}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    indexes.sort_unstable_by(|a, b| b.cmp(a));
    indexes.dedup();
    Ok(indexes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ClientRecord {
        ClientRecord {
            id: 9,
            name: "Navidrome".into(),
            kind: ClientKind::Subsonic,
            base_url: "http://music:4533".into(),
            api_key: None,
            username: Some("admin".into()),
            password: Some("sesame".into()),
            user_id: None,
            enabled: true,
            created_at: String::new(),
            last_synced_at: None,
        }
    }

    fn client() -> SubsonicClient {
        SubsonicClient::new(Client::new(), &record(), "http://music:4533".into(), 500).unwrap()
    }

    #[test]
    fn test_password_is_hex_encoded() {
        let params = client().auth_params();
        assert!(params.contains(&("u", "admin".to_string())));
        assert!(params.contains(&("p", "enc:736573616d65".to_string())));
        assert!(params.contains(&("f", "json".to_string())));
    }

    #[test]
    fn test_api_key_credentials() {
        let mut rec = record();
        rec.username = None;
        rec.password = None;
        rec.api_key = Some("k".into());
        let c = SubsonicClient::new(Client::new(), &rec, "http://music".into(), 10).unwrap();
        assert!(c.auth_params().contains(&("apiKey", "k".to_string())));

        rec.api_key = None;
        assert!(SubsonicClient::new(Client::new(), &rec, "http://music".into(), 10).is_err());
    }

    #[test]
    fn test_decode_envelope_ok() {
        let body = r#"{"subsonic-response": {
            "status": "ok", "version": "1.16.1",
            "albumList2": {"album": [
                {"id": "al-1", "name": "Abbey Road", "artist": "The Beatles", "year": 1969,
                 "songCount": 17, "coverArt": "al-1"}
            ]}
        }}"#;
        let payload: AlbumListPayload = decode_envelope(body).unwrap();
        let albums = payload.album_list.unwrap().album;
        let item = client().album_item(&albums[0]);

        assert_eq!(item.title, "Abbey Road");
        assert_eq!(item.data.artist.as_deref(), Some("The Beatles"));
        assert_eq!(item.data.track_count, Some(17));
        assert_eq!(item.year, Some(1969));
        assert_eq!(
            item.image_url.as_deref(),
            Some("http://music:4533/rest/getCoverArt.view?id=al-1")
        );
    }

    #[test]
    fn test_decode_envelope_errors() {
        let auth = r#"{"subsonic-response": {"status": "failed",
            "error": {"code": 40, "message": "Wrong username or password"}}}"#;
        assert!(matches!(
            decode_envelope::<EmptyPayload>(auth),
            Err(ClientError::Auth { .. })
        ));

        let missing = r#"{"subsonic-response": {"status": "failed",
            "error": {"code": 70, "message": "not found"}}}"#;
        assert!(matches!(
            decode_envelope::<EmptyPayload>(missing),
            Err(ClientError::Status { status: 70, .. })
        ));

        assert!(matches!(
            decode_envelope::<EmptyPayload>("<html>"),
            Err(ClientError::Decode { .. })
        ));
    }

    #[test]
    fn test_playlist_entries_use_positions() {
        let body = r#"{"subsonic-response": {"status": "ok", "playlist": {
            "id": "pl-1", "name": "Road Trip", "owner": "admin",
            "entry": [
                {"id": "s1", "title": "Drive", "artist": "R.E.M."},
                {"id": "s2", "title": "Roadrunner", "artist": "The Modern Lovers"}
            ]
        }}}"#;
        let payload: PlaylistPayload = decode_envelope(body).unwrap();
        let item = client().playlist_item(&payload.playlist.unwrap());

        assert_eq!(item.data.owner.as_deref(), Some("admin"));
        assert_eq!(item.data.entries.len(), 2);
        assert_eq!(item.data.entries[1].entry_id.as_deref(), Some("1"));
        assert_eq!(item.data.entries[1].item_id, "s2");
        assert_eq!(item.source_for(9), Some("pl-1"));
    }

    #[test]
    fn test_removal_indexes_descending() {
        let ids = vec!["1".to_string(), "4".to_string(), "2".to_string(), "4".to_string()];
        assert_eq!(removal_indexes(&ids).unwrap(), vec![4, 2, 1]);
        assert!(removal_indexes(&["x".to_string()]).is_err());
    }
}
