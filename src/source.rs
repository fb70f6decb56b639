//! The search collaborator seam.
//!
//! The matcher never searches on its own; it asks a `CandidateSource` for
//! candidates and only decides over what comes back.

use rustc_hash::FxHashMap;

use crate::error::SearchError;
use crate::models::Candidate;
use crate::normalize::{normalize, normalize_artist};

/// Anything that can answer a free-text track search.
///
/// Implementations return candidates in their own relevance order, at most
/// `limit` of them. A search with no hits is `Ok(vec![])`, never an error.
pub trait CandidateSource {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError>;
}

impl<T: CandidateSource + ?Sized> CandidateSource for &mut T {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        (**self).search(query, limit)
    }
}

impl<T: CandidateSource + ?Sized> CandidateSource for Box<T> {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        (**self).search(query, limit)
    }
}

// ============================================================================
// Per-decision search cache
// ============================================================================

/// Memoizes searches by query string for the duration of one decision, so
/// strategies that issue the same query (Exact and Fuzzy) cost one request.
pub struct SearchCache<'a> {
    source: &'a mut dyn CandidateSource,
    limit: usize,
    results: FxHashMap<String, Vec<Candidate>>,
    requests: usize,
}

impl<'a> SearchCache<'a> {
    pub fn new(source: &'a mut dyn CandidateSource, limit: usize) -> Self {
        Self {
            source,
            limit,
            results: FxHashMap::default(),
            requests: 0,
        }
    }

    /// Search, or return the cached result of an identical earlier query.
    /// Failures are not cached.
    pub fn search(&mut self, query: &str) -> Result<Vec<Candidate>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        if let Some(hit) = self.results.get(query) {
            return Ok(hit.clone());
        }
        self.requests += 1;
        let mut found = self.source.search(query, self.limit)?;
        found.truncate(self.limit);
        self.results.insert(query.to_string(), found.clone());
        Ok(found)
    }

    /// Number of requests actually sent to the collaborator.
    pub fn requests(&self) -> usize {
        self.requests
    }
}

// ============================================================================
// In-memory catalog
// ============================================================================

/// A catalog held in memory (e.g. loaded from a JSON export).
///
/// A candidate is a hit when every query token appears among the tokens of
/// its normalized title and artists. Hits come back by popularity, then
/// catalog order.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    entries: Vec<(Candidate, Vec<String>)>,
}

fn search_tokens(candidate: &Candidate) -> Vec<String> {
    let mut text = normalize(&candidate.title).text;
    for artist in &candidate.artists {
        text.push(' ');
        text.push_str(&normalize_artist(artist));
    }
    text.split_whitespace().map(str::to_string).collect()
}

impl MemoryCatalog {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        let entries = candidates
            .into_iter()
            .map(|c| {
                let tokens = search_tokens(&c);
                (c, tokens)
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CandidateSource for MemoryCatalog {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        let wanted: Vec<String> = normalize(query).text.split_whitespace().map(str::to_string).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<&Candidate> = self
            .entries
            .iter()
            .filter(|(_, tokens)| wanted.iter().all(|w| tokens.contains(w)))
            .map(|(c, _)| c)
            .collect();
        hits.sort_by(|a, b| b.popularity.cmp(&a.popularity));
        Ok(hits.into_iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str, artists: &[&str], popularity: i32) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: String::new(),
            popularity,
        }
    }

    struct CountingSource {
        calls: Vec<String>,
    }

    impl CandidateSource for CountingSource {
        fn search(&mut self, query: &str, _limit: usize) -> Result<Vec<Candidate>, SearchError> {
            self.calls.push(query.to_string());
            if query == "boom" {
                return Err(SearchError::Unavailable("rate limited".into()));
            }
            Ok((0..20).map(|i| candidate(&i.to_string(), query, &["x"], 0)).collect())
        }
    }

    #[test]
    fn test_search_cache_reuses_results_and_caps() {
        let mut source = CountingSource { calls: vec![] };
        {
            let mut cache = SearchCache::new(&mut source, 5);
            assert_eq!(cache.search("m83 midnight city").unwrap().len(), 5);
            assert_eq!(cache.search("m83 midnight city").unwrap().len(), 5);
            assert!(cache.search("   ").unwrap().is_empty());
            assert_eq!(cache.requests(), 1);
        }
        assert_eq!(source.calls, vec!["m83 midnight city".to_string()]);
    }

    #[test]
    fn test_search_cache_does_not_cache_failures() {
        let mut source = CountingSource { calls: vec![] };
        {
            let mut cache = SearchCache::new(&mut source, 5);
            assert!(cache.search("boom").is_err());
            assert!(cache.search("boom").is_err());
        }
        assert_eq!(source.calls.len(), 2);
    }

    #[test]
    fn test_memory_catalog_search() {
        let mut catalog = MemoryCatalog::new(vec![
            candidate("1", "Midnight City", &["M83"], 70),
            candidate("2", "Midnight City (Eric Prydz Remix)", &["M83", "Eric Prydz"], 40),
            candidate("3", "Outro", &["M83"], 60),
        ]);
        assert_eq!(catalog.len(), 3);

        let hits = catalog.search("m83 midnight city", 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);

        assert_eq!(catalog.search("M83", 1).unwrap().len(), 1);
        assert!(catalog.search("nothing here", 10).unwrap().is_empty());
        assert!(catalog.search("", 10).unwrap().is_empty());
    }
}
