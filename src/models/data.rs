use serde::{Deserialize, Serialize};

use super::media::{ExternalIds, MATCH_KEY_SEPARATOR, MediaData, MediaItem, MediaType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Movie {
    pub runtime_minutes: Option<u32>,
    pub community_rating: Option<f32>,
    pub official_rating: Option<String>,
}

impl MediaData for Movie {
    const MEDIA_TYPE: MediaType = MediaType::Movie;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Series {
    pub status: Option<String>,
    pub season_count: Option<u32>,
    pub episode_count: Option<u32>,
}

impl MediaData for Series {
    const MEDIA_TYPE: MediaType = MediaType::Series;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    pub series_title: Option<String>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub air_date: Option<String>,
}

impl MediaData for Episode {
    const MEDIA_TYPE: MediaType = MediaType::Episode;

    fn match_key(&self) -> Option<String> {
        let series = self.series_title.as_deref()?;
        Some(format!(
            "{series} s{:02}e{:02}",
            self.season_number.unwrap_or(0),
            self.episode_number.unwrap_or(0)
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub album_count: Option<u32>,
}

impl MediaData for Artist {
    const MEDIA_TYPE: MediaType = MediaType::Artist;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Album {
    pub artist: Option<String>,
    pub track_count: Option<u32>,
}

impl MediaData for Album {
    const MEDIA_TYPE: MediaType = MediaType::Album;

    fn match_key(&self) -> Option<String> {
        self.artist.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub duration_seconds: Option<u32>,
}

impl MediaData for Track {
    const MEDIA_TYPE: MediaType = MediaType::Track;

    fn match_key(&self) -> Option<String> {
        match (&self.artist, &self.album) {
            (None, None) => None,
            (artist, None) => artist.clone(),
            (artist, Some(album)) => Some(format!(
                "{}{MATCH_KEY_SEPARATOR}{album}",
                artist.as_deref().unwrap_or_default()
            )),
        }
    }
}

/// One position in a playlist or collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Id of the position inside the list. Equal to `item_id` for servers
    /// without separate entry ids; the zero-based index on Subsonic.
    pub entry_id: Option<String>,
    pub item_id: String,
    pub media_type: MediaType,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub external_ids: ExternalIds,
}

impl ListEntry {
    /// Identifier used when asking the server to remove this entry.
    #[must_use]
    pub fn removal_id(&self) -> &str {
        self.entry_id.as_deref().unwrap_or(&self.item_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Playlist {
    pub owner: Option<String>,
    pub entries: Vec<ListEntry>,
}

impl MediaData for Playlist {
    const MEDIA_TYPE: MediaType = MediaType::Playlist;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub entries: Vec<ListEntry>,
}

impl MediaData for Collection {
    const MEDIA_TYPE: MediaType = MediaType::Collection;
}

/// A [`MediaItem`] of any type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyMediaItem {
    Movie(MediaItem<Movie>),
    Series(MediaItem<Series>),
    Episode(MediaItem<Episode>),
    Artist(MediaItem<Artist>),
    Album(MediaItem<Album>),
    Track(MediaItem<Track>),
    Playlist(MediaItem<Playlist>),
    Collection(MediaItem<Collection>),
}

macro_rules! any_media_item {
    ($($variant:ident),*) => {
        $(
            impl From<MediaItem<$variant>> for AnyMediaItem {
                fn from(item: MediaItem<$variant>) -> Self {
                    Self::$variant(item)
                }
            }
        )*

        impl AnyMediaItem {
            #[must_use]
            pub fn media_type(&self) -> MediaType {
                match self {
                    $(Self::$variant(item) => item.media_type,)*
                }
            }

            #[must_use]
            pub fn title(&self) -> &str {
                match self {
                    $(Self::$variant(item) => &item.title,)*
                }
            }

            #[must_use]
            pub fn year(&self) -> Option<i32> {
                match self {
                    $(Self::$variant(item) => item.year,)*
                }
            }

            #[must_use]
            pub fn external_ids(&self) -> &ExternalIds {
                match self {
                    $(Self::$variant(item) => &item.external_ids,)*
                }
            }

            #[must_use]
            pub fn sources(&self) -> &[super::media::ClientItemRef] {
                match self {
                    $(Self::$variant(item) => &item.sources,)*
                }
            }

            #[must_use]
            pub fn match_key(&self) -> Option<String> {
                match self {
                    $(Self::$variant(item) => item.data.match_key(),)*
                }
            }

            #[must_use]
            pub fn source_for(&self, client_id: i32) -> Option<&str> {
                match self {
                    $(Self::$variant(item) => item.source_for(client_id),)*
                }
            }
        }
    };
}

any_media_item!(
    Movie, Series, Episode, Artist, Album, Track, Playlist, Collection
);

pub fn into_any<T>(items: Vec<MediaItem<T>>) -> Vec<AnyMediaItem>
where
    MediaItem<T>: Into<AnyMediaItem>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_keys() {
        let episode = Episode {
            series_title: Some("Breaking Bad".into()),
            season_number: Some(1),
            episode_number: Some(2),
            air_date: None,
        };
        assert_eq!(episode.match_key().as_deref(), Some("Breaking Bad s01e02"));
        assert_eq!(Episode::default().match_key(), None);

        let album = Album {
            artist: Some("The Beatles".into()),
            track_count: Some(17),
        };
        assert_eq!(album.match_key().as_deref(), Some("The Beatles"));
        assert_eq!(Movie::default().match_key(), None);

        let track = Track {
            artist: Some("The xx".into()),
            album: Some("Coexist".into()),
            ..Default::default()
        };
        assert_eq!(track.match_key().as_deref(), Some("The xx|Coexist"));
        let loose = Track {
            album: Some("Coexist".into()),
            ..Default::default()
        };
        assert_eq!(loose.match_key().as_deref(), Some("|Coexist"));
        assert_eq!(Track::default().match_key(), None);
    }

    #[test]
    fn test_any_media_item_accessors() {
        let mut item = MediaItem::new(
            "Abbey Road",
            Album {
                artist: Some("The Beatles".into()),
                track_count: None,
            },
        )
        .with_source(3, "al-1");
        item.year = Some(1969);

        let any: AnyMediaItem = item.into();
        assert_eq!(any.media_type(), MediaType::Album);
        assert_eq!(any.title(), "Abbey Road");
        assert_eq!(any.year(), Some(1969));
        assert_eq!(any.source_for(3), Some("al-1"));
        assert_eq!(any.match_key().as_deref(), Some("The Beatles"));

        let json = serde_json::to_value(&any).unwrap();
        assert_eq!(json["media_type"], "album");
        assert_eq!(json["data"]["artist"], "The Beatles");
    }

    #[test]
    fn test_list_entry_removal_id() {
        let mut entry = ListEntry {
            entry_id: Some("e1".into()),
            item_id: "i1".into(),
            media_type: MediaType::Track,
            title: "Something".into(),
            year: None,
            artist: None,
            external_ids: ExternalIds::default(),
        };
        assert_eq!(entry.removal_id(), "e1");
        entry.entry_id = None;
        assert_eq!(entry.removal_id(), "i1");
    }
}
