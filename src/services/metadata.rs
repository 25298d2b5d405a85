//! TMDB lookups used by the API search and by sync enrichment.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clients::ClientError;
use crate::clients::tmdb::TmdbClient;
use crate::config::Config;
use crate::matching::{MatchKind, MatchOptions, match_score};
use crate::models::{AnyMediaItem, MediaData, MediaItem, MediaType, Movie, Series, into_any};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("TMDB is not enabled")]
    Disabled,

    #[error("Metadata search is not available for {0}")]
    UnsupportedType(MediaType),

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub struct MetadataService {
    config: Arc<RwLock<Config>>,
    http: reqwest::Client,
}

impl MetadataService {
    #[must_use]
    pub const fn new(config: Arc<RwLock<Config>>, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Built per call so config changes apply without a restart.
    async fn tmdb(&self) -> Result<TmdbClient, MetadataError> {
        let config = self.config.read().await;
        if !config.tmdb.enabled || config.tmdb.api_key.is_empty() {
            return Err(MetadataError::Disabled);
        }
        Ok(TmdbClient::new(self.http.clone(), &config.tmdb))
    }

    async fn match_options(&self) -> MatchOptions {
        MatchOptions::from(&self.config.read().await.sync)
    }

    pub async fn is_enabled(&self) -> bool {
        self.tmdb().await.is_ok()
    }

    pub async fn search(
        &self,
        query: &str,
        kind: MediaType,
        year: Option<i32>,
    ) -> Result<Vec<AnyMediaItem>, MetadataError> {
        let tmdb = self.tmdb().await?;
        match kind {
            MediaType::Movie => Ok(into_any(tmdb.search_movie(query, year).await?)),
            MediaType::Series => Ok(into_any(tmdb.search_tv(query, year).await?)),
            other => Err(MetadataError::UnsupportedType(other)),
        }
    }

    /// Fills missing metadata of a library movie from TMDB.
    pub async fn enrich_movie(&self, item: &mut MediaItem<Movie>) -> Result<bool, MetadataError> {
        let tmdb = self.tmdb().await?;
        let opts = self.match_options().await;

        let found = match item.external_ids.imdb.as_deref() {
            Some(imdb) => tmdb.find_by_imdb(imdb).await?.movies.into_iter().next(),
            None => None,
        };
        let found = match found {
            Some(found) => Some(found),
            None => first_match(item, tmdb.search_movie(&item.title, item.year).await?, &opts),
        };

        Ok(found.is_some_and(|found| fill_missing(item, &found)))
    }

    /// Fills missing metadata of a library series from TMDB.
    pub async fn enrich_series(&self, item: &mut MediaItem<Series>) -> Result<bool, MetadataError> {
        let tmdb = self.tmdb().await?;
        let opts = self.match_options().await;

        let found = match item.external_ids.imdb.as_deref() {
            Some(imdb) => tmdb.find_by_imdb(imdb).await?.series.into_iter().next(),
            None => None,
        };
        let found = match found {
            Some(found) => Some(found),
            None => first_match(item, tmdb.search_tv(&item.title, item.year).await?, &opts),
        };

        Ok(found.is_some_and(|found| fill_missing(item, &found)))
    }
}

/// First search result that matches `item` by title with a compatible year.
fn first_match<T: MediaData>(
    item: &MediaItem<T>,
    results: Vec<MediaItem<T>>,
    opts: &MatchOptions,
) -> Option<MediaItem<T>> {
    results.into_iter().find(|candidate| {
        matches!(
            match_score(candidate, item, opts),
            Some(MatchKind::Exact | MatchKind::Fuzzy | MatchKind::ExternalId)
        )
    })
}

/// Copies what `item` lacks from `found`; never overwrites library values.
fn fill_missing<T: MediaData>(item: &mut MediaItem<T>, found: &MediaItem<T>) -> bool {
    let mut changed = false;

    let ids = [
        (&mut item.external_ids.tmdb, &found.external_ids.tmdb),
        (&mut item.external_ids.imdb, &found.external_ids.imdb),
        (&mut item.external_ids.tvdb, &found.external_ids.tvdb),
    ];
    for (ours, theirs) in ids {
        if ours.is_none() && theirs.is_some() {
            ours.clone_from(theirs);
            changed = true;
        }
    }

    if item.overview.is_none() && found.overview.is_some() {
        item.overview.clone_from(&found.overview);
        changed = true;
    }
    if item.genres.is_empty() && !found.genres.is_empty() {
        item.genres.clone_from(&found.genres);
        changed = true;
    }
    if item.image_url.is_none() && found.image_url.is_some() {
        item.image_url.clone_from(&found.image_url);
        changed = true;
    }
    if item.year.is_none() && found.year.is_some() {
        item.year = found.year;
        changed = true;
    }

    if changed {
        debug!(title = %item.title, tmdb_id = ?item.external_ids.tmdb, "Enriched from TMDB");
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn movie(title: &str, year: Option<i32>) -> MediaItem<Movie> {
        let mut item = MediaItem::new(title, Movie::default());
        item.year = year;
        item
    }

    #[test]
    fn test_first_match_requires_compatible_year() {
        let library = movie("Dune", Some(2021));
        let mut old = movie("Dune", Some(1984));
        old.external_ids.tmdb = Some("841".into());
        let mut new = movie("Dune", Some(2021));
        new.external_ids.tmdb = Some("438631".into());

        let found = first_match(&library, vec![old, new], &MatchOptions::default()).unwrap();
        assert_eq!(found.external_ids.tmdb.as_deref(), Some("438631"));
    }

    #[test]
    fn test_fill_missing_keeps_library_values() {
        let mut library = movie("Heat", Some(1995));
        library.overview = Some("Our overview".into());

        let mut found = movie("Heat", Some(1995));
        found.external_ids.tmdb = Some("949".into());
        found.overview = Some("TMDB overview".into());
        found.genres = vec!["Crime".into()];
        found.image_url = Some("https://image.tmdb.org/t/p/w500/heat.jpg".into());

        assert!(fill_missing(&mut library, &found));
        assert_eq!(library.overview.as_deref(), Some("Our overview"));
        assert_eq!(library.external_ids.tmdb.as_deref(), Some("949"));
        assert_eq!(library.genres, vec!["Crime".to_string()]);
        assert!(!fill_missing(&mut library, &found));
    }

    async fn find(Path(imdb): Path<String>) -> Json<Value> {
        let movies = if imdb == "tt0133093" {
            json!([{ "id": 603, "title": "The Matrix", "release_date": "1999-03-30",
                     "overview": "A hacker learns the truth." }])
        } else {
            json!([])
        };
        Json(json!({ "movie_results": movies, "tv_results": [] }))
    }

    async fn search_movie(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let results = if params.get("query").map(String::as_str) == Some("Heat") {
            json!([
                { "id": 47, "title": "Heat", "release_date": "1986-03-14" },
                { "id": 949, "title": "Heat", "release_date": "1995-12-15",
                  "genres": [{ "name": "Crime" }] }
            ])
        } else {
            json!([])
        };
        Json(json!({ "results": results }))
    }

    /// Serves the TMDB endpoints enrichment uses and returns a service
    /// pointed at them.
    async fn service_with_fake_tmdb() -> MetadataService {
        let app = Router::new()
            .route("/find/{imdb}", get(find))
            .route("/search/movie", get(search_movie));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config = Config::default();
        config.tmdb.enabled = true;
        config.tmdb.api_key = "test-key".into();
        config.tmdb.base_url = format!("http://{addr}");
        MetadataService::new(Arc::new(RwLock::new(config)), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_enrich_movie_by_imdb_id() {
        let service = service_with_fake_tmdb().await;
        let mut library = movie("The Matrix", Some(1999));
        library.external_ids.imdb = Some("tt0133093".into());

        assert!(service.enrich_movie(&mut library).await.unwrap());
        assert_eq!(library.external_ids.tmdb.as_deref(), Some("603"));
        assert_eq!(library.overview.as_deref(), Some("A hacker learns the truth."));
    }

    #[tokio::test]
    async fn test_enrich_movie_falls_back_to_search() {
        let service = service_with_fake_tmdb().await;
        let mut library = movie("Heat", Some(1995));
        library.external_ids.imdb = Some("tt0000000".into());

        assert!(service.enrich_movie(&mut library).await.unwrap());
        assert_eq!(library.external_ids.tmdb.as_deref(), Some("949"));
        assert_eq!(library.external_ids.imdb.as_deref(), Some("tt0000000"));
        assert_eq!(library.genres, vec!["Crime".to_string()]);

        let mut unknown = movie("Nothing Like It", None);
        assert!(!service.enrich_movie(&mut unknown).await.unwrap());
        assert!(unknown.external_ids.tmdb.is_none());
    }

    #[tokio::test]
    async fn test_disabled_tmdb() {
        let service = MetadataService::new(
            Arc::new(RwLock::new(Config::default())),
            reqwest::Client::new(),
        );
        assert!(!service.is_enabled().await);
        assert!(matches!(
            service.search("Heat", MediaType::Movie, None).await,
            Err(MetadataError::Disabled)
        ));
    }
}
