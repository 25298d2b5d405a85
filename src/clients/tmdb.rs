//! TMDB v3 API client used for metadata enrichment and recommendations.

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ClientError, read_json};
use crate::config::TmdbConfig;
use crate::models::{MediaItem, Movie, Series};

const SERVICE: &str = "tmdb";
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

pub struct TmdbClient {
    http: Client,
    api_key: String,
    language: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MovieDto {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f32>,
    runtime: Option<u32>,
    imdb_id: Option<String>,
    genres: Vec<Genre>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TvDto {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    status: Option<String>,
    number_of_seasons: Option<u32>,
    number_of_episodes: Option<u32>,
    genres: Vec<Genre>,
    external_ids: Option<TvExternalIds>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TvExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Genre {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FindResponse {
    movie_results: Vec<MovieDto>,
    tv_results: Vec<TvDto>,
}

/// Movies and shows found for an external id.
#[derive(Debug, Default)]
pub struct FindResults {
    pub movies: Vec<MediaItem<Movie>>,
    pub series: Vec<MediaItem<Series>>,
}

fn year_of(date: Option<&String>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn poster(path: Option<&String>) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{IMAGE_BASE_URL}{p}"))
}

fn movie_item(dto: MovieDto) -> MediaItem<Movie> {
    let mut item = MediaItem::new(
        dto.title.clone().unwrap_or_default(),
        Movie {
            runtime_minutes: dto.runtime.filter(|r| *r > 0),
            community_rating: dto.vote_average,
            official_rating: None,
        },
    );
    item.original_title = dto.original_title.filter(|t| Some(t) != dto.title.as_ref());
    item.year = year_of(dto.release_date.as_ref());
    item.overview = dto.overview.filter(|o| !o.is_empty());
    item.genres = dto.genres.into_iter().map(|g| g.name).collect();
    item.external_ids.tmdb = Some(dto.id.to_string());
    item.external_ids.imdb = dto.imdb_id.filter(|i| !i.is_empty());
    item.image_url = poster(dto.poster_path.as_ref());
    item
}

fn tv_item(dto: TvDto) -> MediaItem<Series> {
    let mut item = MediaItem::new(
        dto.name.clone().unwrap_or_default(),
        Series {
            status: dto.status,
            season_count: dto.number_of_seasons,
            episode_count: dto.number_of_episodes,
        },
    );
    item.original_title = dto.original_name.filter(|t| Some(t) != dto.name.as_ref());
    item.year = year_of(dto.first_air_date.as_ref());
    item.overview = dto.overview.filter(|o| !o.is_empty());
    item.genres = dto.genres.into_iter().map(|g| g.name).collect();
    item.external_ids.tmdb = Some(dto.id.to_string());
    if let Some(ids) = dto.external_ids {
        item.external_ids.imdb = ids.imdb_id.filter(|i| !i.is_empty());
        item.external_ids.tvdb = ids.tvdb_id.map(|id| id.to_string());
    }
    item.image_url = poster(dto.poster_path.as_ref());
    item
}

impl TmdbClient {
    #[must_use]
    pub fn new(http: Client, config: &TmdbConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// v4 read access tokens are JWTs and go into the Authorization header.
    fn uses_bearer(&self) -> bool {
        self.api_key.starts_with("eyJ")
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut params: Vec<(&str, String)> = vec![("language", self.language.clone())];
        params.extend(extra.iter().cloned());

        let mut request = self.http.get(format!("{}{path}", self.base_url));
        if self.uses_bearer() {
            request = request.bearer_auth(&self.api_key);
        } else {
            params.push(("api_key", self.api_key.clone()));
        }

        read_json(SERVICE, request.query(&params).send().await?).await
    }

    pub async fn search_movie(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<MediaItem<Movie>>, ClientError> {
        let mut params = vec![("query", query.to_string())];
        if let Some(y) = year {
            params.push(("year", y.to_string()));
        }
        let page: Paged<MovieDto> = self.get("/search/movie", &params).await?;
        Ok(page.results.into_iter().map(movie_item).collect())
    }

    pub async fn search_tv(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<MediaItem<Series>>, ClientError> {
        let mut params = vec![("query", query.to_string())];
        if let Some(y) = year {
            params.push(("first_air_date_year", y.to_string()));
        }
        let page: Paged<TvDto> = self.get("/search/tv", &params).await?;
        Ok(page.results.into_iter().map(tv_item).collect())
    }

    pub async fn movie(&self, id: &str) -> Result<MediaItem<Movie>, ClientError> {
        let dto: MovieDto = self.get(&format!("/movie/{id}"), &[]).await?;
        Ok(movie_item(dto))
    }

    pub async fn tv(&self, id: &str) -> Result<MediaItem<Series>, ClientError> {
        let dto: TvDto = self
            .get(
                &format!("/tv/{id}"),
                &[("append_to_response", "external_ids".to_string())],
            )
            .await?;
        Ok(tv_item(dto))
    }

    pub async fn movie_recommendations(
        &self,
        id: &str,
    ) -> Result<Vec<MediaItem<Movie>>, ClientError> {
        let page: Paged<MovieDto> = self
            .get(&format!("/movie/{id}/recommendations"), &[])
            .await?;
        Ok(page.results.into_iter().map(movie_item).collect())
    }

    pub async fn tv_recommendations(
        &self,
        id: &str,
    ) -> Result<Vec<MediaItem<Series>>, ClientError> {
        let page: Paged<TvDto> = self.get(&format!("/tv/{id}/recommendations"), &[]).await?;
        Ok(page.results.into_iter().map(tv_item).collect())
    }

    pub async fn find_by_imdb(&self, imdb_id: &str) -> Result<FindResults, ClientError> {
        let found: FindResponse = self
            .get(
                &format!("/find/{imdb_id}"),
                &[("external_source", "imdb_id".to_string())],
            )
            .await?;

        Ok(FindResults {
            movies: found.movie_results.into_iter().map(movie_item).collect(),
            series: found.tv_results.into_iter().map(tv_item).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_conversion() {
        let json = r#"{
            "id": 603,
            "title": "The Matrix",
            "original_title": "The Matrix",
            "release_date": "1999-03-30",
            "overview": "Set in the 22nd century...",
            "poster_path": "/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg",
            "vote_average": 8.2,
            "runtime": 136,
            "imdb_id": "tt0133093",
            "genres": [{"id": 28, "name": "Action"}]
        }"#;
        let item = movie_item(serde_json::from_str(json).unwrap());

        assert_eq!(item.title, "The Matrix");
        assert_eq!(item.original_title, None);
        assert_eq!(item.year, Some(1999));
        assert_eq!(item.external_ids.tmdb.as_deref(), Some("603"));
        assert_eq!(item.external_ids.imdb.as_deref(), Some("tt0133093"));
        assert_eq!(item.genres, vec!["Action".to_string()]);
        assert_eq!(item.data.runtime_minutes, Some(136));
        assert_eq!(
            item.image_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg")
        );
    }

    #[test]
    fn test_search_page_and_tv_conversion() {
        let json = r#"{"page": 1, "results": [{
            "id": 1396,
            "name": "Breaking Bad",
            "original_name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "genre_ids": [18],
            "poster_path": null
        }], "total_results": 1}"#;
        let page: Paged<TvDto> = serde_json::from_str(json).unwrap();
        let item = tv_item(page.results.into_iter().next().unwrap());

        assert_eq!(item.title, "Breaking Bad");
        assert_eq!(item.year, Some(2008));
        assert_eq!(item.image_url, None);
        assert!(item.genres.is_empty());
    }

    #[test]
    fn test_bearer_detection() {
        let mut config = TmdbConfig::default();
        config.api_key = "eyJhbGciOiJIUzI1NiJ9.payload.sig".into();
        assert!(TmdbClient::new(Client::new(), &config).uses_bearer());
        config.api_key = "0123456789abcdef".into();
        assert!(!TmdbClient::new(Client::new(), &config).uses_bearer());
    }

    #[test]
    fn test_year_of() {
        assert_eq!(year_of(Some(&"2021-10-22".to_string())), Some(2021));
        assert_eq!(year_of(Some(&String::new())), None);
        assert_eq!(year_of(None), None);
    }
}
