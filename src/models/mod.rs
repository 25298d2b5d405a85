pub mod client;
pub mod data;
pub mod media;

pub use client::{ClientInput, ClientRecord};
pub use data::{
    Album, AnyMediaItem, Artist, Collection, Episode, ListEntry, Movie, Playlist, Series, Track,
    into_any,
};
pub use media::{
    ClientItemRef, ExternalIds, MATCH_KEY_SEPARATOR, MediaData, MediaItem, MediaType,
    ParseMediaTypeError,
};
