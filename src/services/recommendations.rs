//! Recommendations from Claude, with TMDB "more like this" as the fallback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::clients::ClientError;
use crate::clients::claude::ClaudeClient;
use crate::clients::tmdb::TmdbClient;
use crate::config::Config;
use crate::db::{JobRun, NewRecommendation, Recommendation, Store, StoredMediaItem};
use crate::domain::JobType;
use crate::domain::events::NotificationEvent;
use crate::matching::{MatchOptions, Matchable, find_best_match, normalize_title};
use crate::models::{AnyMediaItem, ExternalIds, MediaType, Movie, Series, into_any};
use crate::services::jobs::{JobTracker, RunGuard};

const LIBRARY_TYPES: [MediaType; 2] = [MediaType::Movie, MediaType::Series];

/// Library rows scanned for items carrying a TMDB id.
const SEED_SCAN_LIMIT: u64 = 5000;

const SYSTEM_PROMPT: &str = "You recommend movies and TV series. \
Reply with a JSON array only, no prose. Each element is an object with the keys \
\"title\", \"year\", \"media_type\" (\"movie\" or \"series\") and \"reason\".";

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("No recommendation provider is enabled")]
    NoProvider,

    #[error("A recommendation refresh is already running")]
    AlreadyRunning,

    #[error("Could not read recommendations from the reply: {0}")]
    Parse(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for RecommendationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// One suggestion as Claude returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Suggestion {
    pub title: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default = "default_media_type", deserialize_with = "lenient_media_type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(skip)]
    external_ids: ExternalIds,
}

const fn default_media_type() -> MediaType {
    MediaType::Movie
}

fn lenient_year<'de, D: serde::Deserializer<'de>>(de: D) -> Result<Option<i32>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(serde_json::Value::String(s)) => s.trim().get(..4).and_then(|y| y.parse().ok()),
        _ => None,
    })
}

fn lenient_media_type<'de, D: serde::Deserializer<'de>>(de: D) -> Result<MediaType, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw
        .and_then(|s| s.parse().ok())
        .unwrap_or(MediaType::Movie))
}

impl Matchable for Suggestion {
    fn media_type(&self) -> MediaType {
        self.media_type
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn external_ids(&self) -> &ExternalIds {
        &self.external_ids
    }
}

/// Extracts the first JSON array of suggestions from free text.
pub fn parse_suggestions(text: &str) -> Result<Vec<Suggestion>, RecommendationError> {
    for (start, _) in text.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<Suggestion>>();
        if let Some(Ok(items)) = stream.next() {
            return Ok(items);
        }
    }
    Err(RecommendationError::Parse(
        "no JSON array of suggestions found".to_string(),
    ))
}

fn build_prompt(sample: &[StoredMediaItem], count: usize) -> String {
    let mut prompt = String::from("My library includes:\n");
    for item in sample {
        prompt.push_str("- ");
        prompt.push_str(&item.title);
        if let Some(year) = item.year {
            prompt.push_str(&format!(" ({year})"));
        }
        prompt.push_str(&format!(" [{}]", item.media_type));
        if !item.genres.is_empty() {
            prompt.push_str(&format!(" {}", item.genres.join(", ")));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nRecommend {count} movies or series I do not already have."
    ));
    prompt
}

/// Candidates ordered by how many seeds recommended them; ties keep the
/// order they were first seen in.
pub fn rank_candidates(per_seed: Vec<Vec<AnyMediaItem>>) -> Vec<(AnyMediaItem, usize)> {
    let mut ranked: Vec<(AnyMediaItem, usize)> = Vec::new();
    let mut index: HashMap<(MediaType, String), usize> = HashMap::new();

    for results in per_seed {
        let mut seen_for_seed = HashSet::new();
        for item in results {
            let key = (
                item.media_type(),
                item.external_ids()
                    .tmdb
                    .clone()
                    .unwrap_or_else(|| normalize_title(item.title())),
            );
            if !seen_for_seed.insert(key.clone()) {
                continue;
            }
            match index.get(&key) {
                Some(&pos) => ranked[pos].1 += 1,
                None => {
                    index.insert(key, ranked.len());
                    ranked.push((item, 1));
                }
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub count: usize,
    pub source: String,
}

pub struct RecommendationService {
    store: Store,
    config: Arc<RwLock<Config>>,
    http: reqwest::Client,
    event_bus: broadcast::Sender<NotificationEvent>,
    running: Arc<AtomicBool>,
}

impl RecommendationService {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<RwLock<Config>>,
        http: reqwest::Client,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            store,
            config,
            http,
            event_bus,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn acquire(&self) -> Result<RunGuard, RecommendationError> {
        RunGuard::try_acquire(&self.running).ok_or(RecommendationError::AlreadyRunning)
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<Recommendation>, RecommendationError> {
        Ok(self.store.list_recommendations(limit).await?)
    }

    async fn has_provider(&self) -> bool {
        let config = self.config.read().await;
        (config.claude.enabled && !config.claude.api_key.is_empty())
            || (config.tmdb.enabled && !config.tmdb.api_key.is_empty())
    }

    /// Rebuilds the stored recommendation set.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RecommendationError> {
        if !self.has_provider().await {
            return Err(RecommendationError::NoProvider);
        }
        let _guard = self.acquire()?;
        let (tracker, _) = JobTracker::start(
            self.store.clone(),
            self.event_bus.clone(),
            JobType::Recommendations,
        )
        .await?;
        self.execute(&tracker).await
    }

    pub async fn trigger(self: &Arc<Self>) -> Result<JobRun, RecommendationError> {
        if !self.has_provider().await {
            return Err(RecommendationError::NoProvider);
        }
        let guard = self.acquire()?;
        let (tracker, run) = JobTracker::start(
            self.store.clone(),
            self.event_bus.clone(),
            JobType::Recommendations,
        )
        .await?;

        let service = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = service.execute(&tracker).await {
                warn!(error = %e, "Background recommendation refresh failed");
            }
        });
        Ok(run)
    }

    async fn execute(&self, tracker: &JobTracker) -> Result<RefreshOutcome, RecommendationError> {
        let result = self.generate().await;
        match result {
            Ok((items, source)) => {
                let count = self.store.replace_recommendations(&items).await?;
                info!(count, source, "Recommendations refreshed");
                let _ = self.event_bus.send(NotificationEvent::RecommendationsUpdated {
                    count,
                    source: source.to_string(),
                });
                let message = format!("{count} recommendations from {source}");
                if let Err(e) = tracker.complete(message).await {
                    warn!(error = %e, "Failed to record recommendation refresh");
                }
                Ok(RefreshOutcome {
                    count,
                    source: source.to_string(),
                })
            }
            Err(e) => {
                if let Err(db) = tracker.fail(&e).await {
                    warn!(error = %db, "Failed to record recommendation failure");
                }
                Err(e)
            }
        }
    }

    async fn generate(
        &self,
    ) -> Result<(Vec<NewRecommendation>, &'static str), RecommendationError> {
        let config = self.config.read().await.clone();
        let opts = MatchOptions::from(&config.sync);
        let library = self.library().await?;

        if config.claude.enabled && !config.claude.api_key.is_empty() {
            let sample = self
                .store
                .recent_items(
                    &LIBRARY_TYPES,
                    u64::try_from(config.recommendations.library_sample).unwrap_or(u64::MAX),
                )
                .await?;
            let claude = ClaudeClient::new(self.http.clone(), &config.claude);
            let reply = claude
                .complete(SYSTEM_PROMPT, &build_prompt(&sample, config.recommendations.count))
                .await?;
            let suggestions = parse_suggestions(&reply)?;
            return Ok((
                from_suggestions(suggestions, &library, &opts, config.recommendations.count),
                "claude",
            ));
        }

        if config.tmdb.enabled && !config.tmdb.api_key.is_empty() {
            let tmdb = TmdbClient::new(self.http.clone(), &config.tmdb);
            let seeds = self
                .store
                .recent_items(&LIBRARY_TYPES, SEED_SCAN_LIMIT)
                .await?
                .into_iter()
                .filter(|item| item.external_ids.tmdb.is_some())
                .take(config.recommendations.seed_count)
                .collect::<Vec<_>>();

            let mut per_seed = Vec::with_capacity(seeds.len());
            for seed in &seeds {
                let Some(tmdb_id) = seed.external_ids.tmdb.as_deref() else {
                    continue;
                };
                let result = if seed.media_type == MediaType::Series.as_str() {
                    tmdb.tv_recommendations(tmdb_id).await.map(into_any)
                } else {
                    tmdb.movie_recommendations(tmdb_id).await.map(into_any)
                };
                match result {
                    Ok(items) => per_seed.push(items),
                    Err(e) => warn!(title = %seed.title, error = %e, "TMDB recommendations failed"),
                }
            }

            let count = config.recommendations.count;
            return Ok((
                from_ranked(rank_candidates(per_seed), &library, &opts, count),
                "tmdb",
            ));
        }

        Err(RecommendationError::NoProvider)
    }

    async fn library(&self) -> Result<Vec<AnyMediaItem>, RecommendationError> {
        let mut library = into_any(self.store.items_of_type::<Movie>().await?);
        library.extend(into_any(self.store.items_of_type::<Series>().await?));
        Ok(library)
    }
}

fn from_suggestions(
    suggestions: Vec<Suggestion>,
    library: &[AnyMediaItem],
    opts: &MatchOptions,
    count: usize,
) -> Vec<NewRecommendation> {
    let mut seen = HashSet::new();
    suggestions
        .into_iter()
        .filter(|s| LIBRARY_TYPES.contains(&s.media_type) && !s.title.trim().is_empty())
        .filter(|s| find_best_match(s, library, opts).is_none())
        .filter(|s| seen.insert((s.media_type, normalize_title(&s.title))))
        .take(count)
        .map(|s| NewRecommendation {
            title: s.title,
            year: s.year,
            media_type: s.media_type,
            reason: s.reason,
            source: "claude".to_string(),
            tmdb_id: None,
            image_url: None,
        })
        .collect()
}

fn from_ranked(
    ranked: Vec<(AnyMediaItem, usize)>,
    library: &[AnyMediaItem],
    opts: &MatchOptions,
    count: usize,
) -> Vec<NewRecommendation> {
    ranked
        .into_iter()
        .filter(|(item, _)| find_best_match(item, library, opts).is_none())
        .take(count)
        .map(|(item, seeds)| {
            let image_url = match &item {
                AnyMediaItem::Movie(m) => m.image_url.clone(),
                AnyMediaItem::Series(s) => s.image_url.clone(),
                _ => None,
            };
            NewRecommendation {
                title: item.title().to_string(),
                year: item.year(),
                media_type: item.media_type(),
                reason: Some(format!(
                    "Recommended for {seeds} title{} in your library",
                    if seeds == 1 { "" } else { "s" }
                )),
                source: "tmdb".to_string(),
                tmdb_id: item.external_ids().tmdb.clone(),
                image_url,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaItem;

    fn tmdb_movie(id: &str, title: &str) -> AnyMediaItem {
        let mut item = MediaItem::new(title, Movie::default());
        item.external_ids.tmdb = Some(id.into());
        item.into()
    }

    #[test]
    fn test_parse_suggestions_from_chatty_reply() {
        let reply = r#"Sure! Here are some picks [not json] then:
[
  {"title": "Heat", "year": 1995, "media_type": "movie", "reason": "Crime epic"},
  {"title": "The Wire", "year": "2002", "media_type": "tv"}
]
Enjoy!"#;
        let parsed = parse_suggestions(reply).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].title, "Heat");
        assert_eq!(parsed[0].year, Some(1995));
        assert_eq!(parsed[1].media_type, MediaType::Series);
        assert_eq!(parsed[1].year, Some(2002));
        assert_eq!(parsed[1].reason, None);

        assert!(matches!(
            parse_suggestions("no list here"),
            Err(RecommendationError::Parse(_))
        ));
    }

    #[test]
    fn test_from_suggestions_drops_library_titles_and_duplicates() {
        let mut owned = MediaItem::new("Heat", Movie::default());
        owned.year = Some(1995);
        let library: Vec<AnyMediaItem> = vec![owned.into()];

        let suggestions = parse_suggestions(
            r#"[{"title": "Heat", "year": 1995},
                {"title": "Collateral", "year": 2004},
                {"title": "collateral", "year": 2004},
                {"title": "Abbey Road", "media_type": "album"}]"#,
        )
        .unwrap();

        let recs = from_suggestions(suggestions, &library, &MatchOptions::default(), 10);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Collateral");
        assert_eq!(recs[0].source, "claude");
    }

    #[test]
    fn test_rank_candidates_by_seed_count() {
        let per_seed = vec![
            vec![tmdb_movie("1", "Ronin"), tmdb_movie("2", "Thief")],
            vec![tmdb_movie("2", "Thief"), tmdb_movie("3", "Collateral")],
            vec![tmdb_movie("3", "Collateral"), tmdb_movie("3", "Collateral")],
        ];
        let ranked = rank_candidates(per_seed);
        let order: Vec<(&str, usize)> = ranked.iter().map(|(i, n)| (i.title(), *n)).collect();
        assert_eq!(order, vec![("Thief", 2), ("Collateral", 2), ("Ronin", 1)]);
    }

    #[test]
    fn test_from_ranked_reason() {
        let ranked = vec![(tmdb_movie("2", "Thief"), 2), (tmdb_movie("1", "Ronin"), 1)];
        let recs = from_ranked(ranked, &[], &MatchOptions::default(), 1);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].tmdb_id.as_deref(), Some("2"));
        assert_eq!(
            recs[0].reason.as_deref(),
            Some("Recommended for 2 titles in your library")
        );
    }

    #[test]
    fn test_build_prompt_lists_library() {
        let item = StoredMediaItem {
            id: 1,
            media_type: "movie".into(),
            title: "Heat".into(),
            original_title: None,
            year: Some(1995),
            overview: None,
            genres: vec!["Crime".into()],
            external_ids: ExternalIds::default(),
            image_url: None,
            sources: Vec::new(),
            data: serde_json::Value::Null,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let prompt = build_prompt(&[item], 5);
        assert!(prompt.contains("- Heat (1995) [movie] Crime"));
        assert!(prompt.contains("Recommend 5"));
    }

    #[tokio::test]
    async fn test_refresh_without_provider() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let (tx, _) = broadcast::channel(4);
        let service = RecommendationService::new(
            store,
            Arc::new(RwLock::new(Config::default())),
            reqwest::Client::new(),
            tx,
        );
        assert!(matches!(
            service.refresh().await,
            Err(RecommendationError::NoProvider)
        ));
    }
}
