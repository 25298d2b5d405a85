use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media a [`MediaItem`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Series,
    Episode,
    Artist,
    Album,
    Track,
    Playlist,
    Collection,
}

impl MediaType {
    pub const ALL: [Self; 8] = [
        Self::Movie,
        Self::Series,
        Self::Episode,
        Self::Artist,
        Self::Album,
        Self::Track,
        Self::Playlist,
        Self::Collection,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Episode => "episode",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Track => "track",
            Self::Playlist => "playlist",
            Self::Collection => "collection",
        }
    }

    #[must_use]
    pub const fn is_music(self) -> bool {
        matches!(self, Self::Artist | Self::Album | Self::Track)
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::Playlist | Self::Collection)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown media type '{0}'")]
pub struct ParseMediaTypeError(pub String);

impl FromStr for MediaType {
    type Err = ParseMediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "series" | "show" | "tv" => Ok(Self::Series),
            "episode" | "episodes" => Ok(Self::Episode),
            "artist" | "artists" => Ok(Self::Artist),
            "album" | "albums" => Ok(Self::Album),
            "track" | "tracks" | "song" => Ok(Self::Track),
            "playlist" | "playlists" => Ok(Self::Playlist),
            "collection" | "collections" => Ok(Self::Collection),
            _ => Err(ParseMediaTypeError(s.to_string())),
        }
    }
}

/// Identifiers assigned by metadata providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub musicbrainz: Option<String>,
}

impl ExternalIds {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tmdb.is_none()
            && self.imdb.is_none()
            && self.tvdb.is_none()
            && self.musicbrainz.is_none()
    }

    /// Takes every id `other` knows. Ids are never cleared.
    pub fn merge(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (mine, theirs) in [
            (&mut self.tmdb, &other.tmdb),
            (&mut self.imdb, &other.imdb),
            (&mut self.tvdb, &other.tvdb),
            (&mut self.musicbrainz, &other.musicbrainz),
        ] {
            if let Some(value) = theirs
                && mine.as_ref() != Some(value)
            {
                *mine = Some(value.clone());
                changed = true;
            }
        }
        changed
    }

    /// True when any id present on both sides is equal.
    #[must_use]
    pub fn shares_any(&self, other: &Self) -> bool {
        fn same(a: Option<&String>, b: Option<&String>) -> bool {
            matches!((a, b), (Some(a), Some(b)) if !a.is_empty() && a.eq_ignore_ascii_case(b))
        }

        same(self.tmdb.as_ref(), other.tmdb.as_ref())
            || same(self.imdb.as_ref(), other.imdb.as_ref())
            || same(self.tvdb.as_ref(), other.tvdb.as_ref())
            || same(self.musicbrainz.as_ref(), other.musicbrainz.as_ref())
    }
}

/// A vendor item id on one configured client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientItemRef {
    pub client_id: i32,
    pub item_id: String,
}

/// Separates the parts of a composite match key, e.g. `artist|album`.
pub const MATCH_KEY_SEPARATOR: char = '|';

/// Type-specific payload of a [`MediaItem`].
pub trait MediaData:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const MEDIA_TYPE: MediaType;

    /// Secondary discriminator for items sharing a title, e.g. the artist of an album.
    /// Parts are joined with [`MATCH_KEY_SEPARATOR`]; an empty part matches anything.
    fn match_key(&self) -> Option<String> {
        None
    }
}

/// One piece of media as the rest of the system sees it, independent of the
/// server it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem<T> {
    pub id: Option<i32>,
    pub media_type: MediaType,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub external_ids: ExternalIds,
    pub sources: Vec<ClientItemRef>,
    pub image_url: Option<String>,
    pub data: T,
}

impl<T: MediaData> MediaItem<T> {
    pub fn new(title: impl Into<String>, data: T) -> Self {
        Self {
            id: None,
            media_type: T::MEDIA_TYPE,
            title: title.into(),
            original_title: None,
            year: None,
            overview: None,
            genres: Vec::new(),
            external_ids: ExternalIds::default(),
            sources: Vec::new(),
            image_url: None,
            data,
        }
    }

    #[must_use]
    pub fn with_source(mut self, client_id: i32, item_id: impl Into<String>) -> Self {
        self.add_source(ClientItemRef {
            client_id,
            item_id: item_id.into(),
        });
        self
    }

    pub fn add_source(&mut self, source: ClientItemRef) -> bool {
        if self.sources.contains(&source) {
            false
        } else {
            self.sources.push(source);
            true
        }
    }

    /// Vendor item id of this item on the given client.
    #[must_use]
    pub fn source_for(&self, client_id: i32) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.client_id == client_id)
            .map(|s| s.item_id.as_str())
    }

    /// Merge-and-overwrite: values the incoming item carries replace ours,
    /// missing ones never clear what we have. Returns whether anything changed.
    pub fn merge_from(&mut self, incoming: &Self) -> bool {
        let mut changed = false;

        if !incoming.title.is_empty() && self.title != incoming.title {
            self.title.clone_from(&incoming.title);
            changed = true;
        }

        changed |= overwrite(&mut self.original_title, incoming.original_title.as_ref());
        changed |= overwrite(&mut self.year, incoming.year.as_ref());
        changed |= overwrite(&mut self.overview, incoming.overview.as_ref());
        changed |= overwrite(&mut self.image_url, incoming.image_url.as_ref());

        if !incoming.genres.is_empty() && self.genres != incoming.genres {
            self.genres.clone_from(&incoming.genres);
            changed = true;
        }

        changed |= self.external_ids.merge(&incoming.external_ids);

        for source in &incoming.sources {
            changed |= self.add_source(source.clone());
        }

        if self.data != incoming.data {
            self.data = incoming.data.clone();
            changed = true;
        }

        changed
    }
}

fn overwrite<V: Clone + PartialEq>(target: &mut Option<V>, incoming: Option<&V>) -> bool {
    match incoming {
        Some(value) if target.as_ref() != Some(value) => {
            *target = Some(value.clone());
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Album, Movie};

    fn movie(title: &str, year: i32) -> MediaItem<Movie> {
        let mut item = MediaItem::new(title, Movie::default());
        item.year = Some(year);
        item
    }

    #[test]
    fn test_media_type_parse_and_display() {
        assert_eq!("Movie".parse::<MediaType>().unwrap(), MediaType::Movie);
        assert_eq!("tv".parse::<MediaType>().unwrap(), MediaType::Series);
        assert_eq!("songs".parse::<MediaType>().ok(), None);
        assert_eq!(MediaType::Collection.to_string(), "collection");
        assert!(MediaType::Track.is_music());
        assert!(MediaType::Playlist.is_list());
        assert!(!MediaType::Movie.is_music());
        for t in MediaType::ALL {
            assert_eq!(t.as_str().parse::<MediaType>().unwrap(), t);
        }
    }

    #[test]
    fn test_media_type_set_is_ordered() {
        let types: std::collections::BTreeSet<MediaType> =
            [MediaType::Track, MediaType::Movie, MediaType::Track, MediaType::Album]
                .into_iter()
                .collect();
        let ordered: Vec<MediaType> = types.into_iter().collect();
        assert_eq!(ordered, [MediaType::Movie, MediaType::Album, MediaType::Track]);
    }

    #[test]
    fn test_external_ids_merge_never_clears() {
        let mut ids = ExternalIds {
            tmdb: Some("603".into()),
            imdb: Some("tt0133093".into()),
            ..Default::default()
        };
        let other = ExternalIds {
            tvdb: Some("1".into()),
            ..Default::default()
        };

        assert!(ids.merge(&other));
        assert_eq!(ids.tmdb.as_deref(), Some("603"));
        assert_eq!(ids.tvdb.as_deref(), Some("1"));
        assert!(!ids.merge(&other));
    }

    #[test]
    fn test_external_ids_shares_any() {
        let a = ExternalIds {
            imdb: Some("tt0133093".into()),
            ..Default::default()
        };
        let b = ExternalIds {
            imdb: Some("TT0133093".into()),
            tmdb: Some("1".into()),
            ..Default::default()
        };
        let c = ExternalIds {
            tmdb: Some("2".into()),
            ..Default::default()
        };
        assert!(a.shares_any(&b));
        assert!(!b.shares_any(&c));
        assert!(!ExternalIds::default().shares_any(&ExternalIds::default()));
    }

    #[test]
    fn test_new_sets_media_type() {
        let album = MediaItem::new("Abbey Road", Album::default());
        assert_eq!(album.media_type, MediaType::Album);
        assert!(album.sources.is_empty());
    }

    #[test]
    fn test_merge_from_overwrites_and_unions_sources() {
        let mut existing = movie("The Matrix", 1999).with_source(1, "a");
        existing.overview = Some("old".into());
        existing.genres = vec!["Action".into()];

        let mut incoming = movie("The Matrix", 1999).with_source(2, "b");
        incoming.overview = Some("new".into());
        incoming.data.runtime_minutes = Some(136);

        assert!(existing.merge_from(&incoming));
        assert_eq!(existing.overview.as_deref(), Some("new"));
        assert_eq!(existing.genres, vec!["Action".to_string()]);
        assert_eq!(existing.sources.len(), 2);
        assert_eq!(existing.source_for(2), Some("b"));
        assert_eq!(existing.data.runtime_minutes, Some(136));

        assert!(!existing.merge_from(&incoming));
    }

    #[test]
    fn test_merge_from_keeps_values_missing_on_incoming() {
        let mut existing = movie("Alien", 1979).with_source(1, "x");
        existing.image_url = Some("http://img".into());
        let mut incoming = MediaItem::new("Alien", Movie::default()).with_source(1, "x");
        incoming.year = None;

        assert!(!existing.merge_from(&incoming));
        assert_eq!(existing.year, Some(1979));
        assert_eq!(existing.image_url.as_deref(), Some("http://img"));
    }
}
