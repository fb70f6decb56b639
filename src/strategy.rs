//! The fallback cascade.
//!
//! Each strategy knows which search query to issue and what extra acceptance
//! floor it applies. Ranking is the same for all of them. The engine tries them in
//! `Strategy::ALL` order and stops at the first acceptance.

use tracing::debug;

use crate::config::{MatcherConfig, StrategyToggles};
use crate::error::SearchError;
use crate::models::{NormalizedQuery, ScoredCandidate, Strategy, StrategyAttempt};
use crate::scoring::{judge, rank, Verdict};
use crate::source::SearchCache;

/// Ranked result of one strategy.
#[derive(Debug)]
pub struct Attempt {
    pub record: StrategyAttempt,
    pub ranked: Vec<ScoredCandidate>,
}

impl Attempt {
    pub fn verdict(&self, strategy: &dyn MatchStrategy, config: &MatcherConfig) -> Verdict<'_> {
        judge(
            &self.ranked,
            config.threshold,
            config.ambiguity_margin,
            strategy.min_title_score(config),
        )
    }
}

pub trait MatchStrategy {
    fn kind(&self) -> Strategy;

    fn search_query(&self, query: &NormalizedQuery) -> String;

    /// Extra floor on the top candidate's title score.
    fn min_title_score(&self, _config: &MatcherConfig) -> Option<f64> {
        None
    }

    /// Search (through the per-decision cache) and rank what comes back.
    /// An empty result is a valid attempt with no candidates.
    fn attempt(
        &self,
        query: &NormalizedQuery,
        cache: &mut SearchCache<'_>,
        config: &MatcherConfig,
    ) -> Result<Attempt, SearchError> {
        let search_query = self.search_query(query);
        let candidates = cache.search(&search_query)?;
        let ranked = rank(query, &candidates, &config.weights);

        debug!(
            strategy = %self.kind(),
            query = %search_query,
            candidates = candidates.len(),
            best = ranked.first().map(|s| s.combined_score),
            "strategy attempted"
        );

        Ok(Attempt {
            record: StrategyAttempt {
                strategy: self.kind(),
                search_query,
                candidate_count: candidates.len(),
                best_score: ranked.first().map(|s| s.combined_score),
            },
            ranked,
        })
    }
}

/// "artist title", or just the title when the artist is unknown.
fn full_query(query: &NormalizedQuery) -> String {
    if query.artist_norm.is_empty() {
        query.title_norm.clone()
    } else {
        format!("{} {}", query.artist_norm, query.title_norm)
    }
}

/// Full query; accepts only a near-identical title.
pub struct ExactStrategy;

impl MatchStrategy for ExactStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Exact
    }

    fn search_query(&self, query: &NormalizedQuery) -> String {
        full_query(query)
    }

    fn min_title_score(&self, config: &MatcherConfig) -> Option<f64> {
        Some(config.exact_title_min)
    }
}

/// Full query; accepts the top candidate on combined score alone.
pub struct FuzzyStrategy;

impl MatchStrategy for FuzzyStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Fuzzy
    }

    fn search_query(&self, query: &NormalizedQuery) -> String {
        full_query(query)
    }
}

/// Re-query with the normalized title only.
pub struct TitleOnlyStrategy;

impl MatchStrategy for TitleOnlyStrategy {
    fn kind(&self) -> Strategy {
        Strategy::TitleOnly
    }

    fn search_query(&self, query: &NormalizedQuery) -> String {
        query.title_norm.clone()
    }
}

/// Last resort: re-query with qualifiers and version tags removed from the
/// search string. Candidates are still ranked against the full title, so a
/// remix query never settles for the original.
pub struct CleanedTitleStrategy;

impl MatchStrategy for CleanedTitleStrategy {
    fn kind(&self) -> Strategy {
        Strategy::CleanedTitle
    }

    fn search_query(&self, query: &NormalizedQuery) -> String {
        query.title_cleaned.clone()
    }
}

pub fn strategy_for(kind: Strategy) -> Box<dyn MatchStrategy> {
    match kind {
        Strategy::Exact => Box::new(ExactStrategy),
        Strategy::Fuzzy => Box::new(FuzzyStrategy),
        Strategy::TitleOnly => Box::new(TitleOnlyStrategy),
        Strategy::CleanedTitle => Box::new(CleanedTitleStrategy),
    }
}

/// Enabled strategies in cascade order.
pub fn cascade(toggles: &StrategyToggles) -> Vec<Box<dyn MatchStrategy>> {
    toggles.enabled().into_iter().map(strategy_for).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackQuery;

    fn nq(title: &str, artist: &str) -> NormalizedQuery {
        NormalizedQuery::from_query(&TrackQuery::new(title, artist))
    }

    #[test]
    fn test_search_queries() {
        let q = nq("Levels (Skrillex Remix)", "Avicii");
        assert_eq!(ExactStrategy.search_query(&q), "avicii levels skrillex remix");
        assert_eq!(FuzzyStrategy.search_query(&q), "avicii levels skrillex remix");
        assert_eq!(TitleOnlyStrategy.search_query(&q), "levels skrillex remix");
        assert_eq!(CleanedTitleStrategy.search_query(&q), "levels");

        let no_artist = nq("Intro", "");
        assert_eq!(ExactStrategy.search_query(&no_artist), "intro");
    }

    #[test]
    fn test_cascade_respects_toggles_and_order() {
        let mut toggles = StrategyToggles::default();
        toggles.set(Strategy::Fuzzy, false);
        let kinds: Vec<Strategy> = cascade(&toggles).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![Strategy::Exact, Strategy::TitleOnly, Strategy::CleanedTitle]);
    }

    #[test]
    fn test_only_exact_has_title_floor() {
        let config = MatcherConfig::default();
        assert_eq!(ExactStrategy.min_title_score(&config), Some(0.95));
        assert_eq!(FuzzyStrategy.min_title_score(&config), None);
    }
}
