//! Matching of media items reported by different servers.
//!
//! Two items are considered the same when they share a source link, share an
//! external id, or have the same (or a sufficiently similar) normalized title
//! with compatible years and match keys.

mod normalize;

pub use normalize::{
    levenshtein, normalize_title, normalized_similarity, similarity, years_compatible,
};

use crate::config::SyncConfig;
use crate::models::{
    AnyMediaItem, ClientItemRef, ExternalIds, ListEntry, MATCH_KEY_SEPARATOR, MediaData,
    MediaItem, MediaType,
};

/// How two items were matched. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Fuzzy,
    Exact,
    ExternalId,
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub fuzzy_threshold: f64,
    pub year_tolerance: i32,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            year_tolerance: 1,
        }
    }
}

impl From<&SyncConfig> for MatchOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            fuzzy_threshold: config.fuzzy_threshold,
            year_tolerance: config.year_tolerance,
        }
    }
}

/// Anything that can take part in matching.
pub trait Matchable {
    fn media_type(&self) -> MediaType;
    fn title(&self) -> &str;
    fn year(&self) -> Option<i32>;
    fn external_ids(&self) -> &ExternalIds;
    fn sources(&self) -> &[ClientItemRef] {
        &[]
    }
    fn match_key(&self) -> Option<String> {
        None
    }
}

impl<T: MediaData> Matchable for MediaItem<T> {
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
    fn sources(&self) -> &[ClientItemRef] {
        &self.sources
    }
    fn match_key(&self) -> Option<String> {
        self.data.match_key()
    }
}

impl Matchable for AnyMediaItem {
    fn media_type(&self) -> MediaType {
        Self::media_type(self)
    }
    fn title(&self) -> &str {
        Self::title(self)
    }
    fn year(&self) -> Option<i32> {
        Self::year(self)
    }
    fn external_ids(&self) -> &ExternalIds {
        Self::external_ids(self)
    }
    fn sources(&self) -> &[ClientItemRef] {
        Self::sources(self)
    }
    fn match_key(&self) -> Option<String> {
        Self::match_key(self)
    }
}

impl Matchable for ListEntry {
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
    fn match_key(&self) -> Option<String> {
        self.artist.clone()
    }
}

/// Compares match keys part by part. A part missing on either side is ignored.
fn keys_compatible(a: Option<String>, b: Option<String>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return true;
    };
    a.split(MATCH_KEY_SEPARATOR)
        .zip(b.split(MATCH_KEY_SEPARATOR))
        .all(|(x, y)| {
            let (x, y) = (normalize_title(x), normalize_title(y));
            x.is_empty() || y.is_empty() || x == y
        })
}

/// True when both sides are linked to the same client under different item ids,
/// i.e. the server itself reports them as two items.
fn sources_conflict(a: &[ClientItemRef], b: &[ClientItemRef]) -> bool {
    a.iter().any(|x| {
        b.iter()
            .any(|y| x.client_id == y.client_id && x.item_id != y.item_id)
    })
}

/// Strongest way `candidate` matches `item`, if any.
pub fn match_score<C, I>(candidate: &C, item: &I, opts: &MatchOptions) -> Option<MatchKind>
where
    C: Matchable + ?Sized,
    I: Matchable + ?Sized,
{
    score(candidate, item, opts).map(|(kind, _)| kind)
}

fn score<C, I>(candidate: &C, item: &I, opts: &MatchOptions) -> Option<(MatchKind, f64)>
where
    C: Matchable + ?Sized,
    I: Matchable + ?Sized,
{
    if candidate.media_type() != item.media_type() {
        return None;
    }

    if item
        .sources()
        .iter()
        .any(|s| candidate.sources().contains(s))
    {
        return Some((MatchKind::Source, 1.0));
    }

    if sources_conflict(candidate.sources(), item.sources()) {
        return None;
    }

    if candidate.external_ids().shares_any(item.external_ids()) {
        return Some((MatchKind::ExternalId, 1.0));
    }

    if !years_compatible(candidate.year(), item.year(), opts.year_tolerance)
        || !keys_compatible(candidate.match_key(), item.match_key())
    {
        return None;
    }

    let a = normalize_title(candidate.title());
    let b = normalize_title(item.title());
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a == b {
        return Some((MatchKind::Exact, 1.0));
    }

    let sim = normalized_similarity(&a, &b);
    (sim >= opts.fuzzy_threshold).then_some((MatchKind::Fuzzy, sim))
}

/// Index and kind of the candidate matching `item` best.
///
/// Stronger [`MatchKind`]s win; equal kinds are decided by title similarity,
/// then by position.
pub fn find_best_match<I, C>(
    item: &I,
    candidates: &[C],
    opts: &MatchOptions,
) -> Option<(usize, MatchKind)>
where
    I: Matchable + ?Sized,
    C: Matchable,
{
    let mut best: Option<(usize, MatchKind, f64)> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        let Some((kind, sim)) = score(candidate, item, opts) else {
            continue;
        };

        let better = match best {
            None => true,
            Some((_, best_kind, best_sim)) => {
                kind > best_kind || (kind == best_kind && sim > best_sim)
            }
        };
        if better {
            best = Some((idx, kind, sim));
        }
    }

    best.map(|(idx, kind, _)| (idx, kind))
}
