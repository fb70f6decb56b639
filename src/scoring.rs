//! Scoring functions for track matching.
//!
//! This module contains:
//! - String similarity (normalized Levenshtein)
//! - Artist similarity against multi-artist credits
//! - Combined title/artist scoring with the artist-mismatch penalty
//! - Candidate ranking and the accept / ambiguous / reject verdict

use rustc_hash::FxHashSet;

use crate::config::Weights;
use crate::models::{Candidate, NormalizedQuery, ScoredCandidate};
use crate::normalize::{normalize, normalize_artist};

// ============================================================================
// Thresholds
// ============================================================================

/// Two tokens pair up in the token overlap when at least this similar.
pub const TOKEN_PAIR_MIN: f64 = 0.80;

/// Slack for float comparisons against the ambiguity margin.
const MARGIN_EPSILON: f64 = 1e-9;

/// Connector words ignored when comparing whole artist credits.
const CREDIT_CONNECTORS: [&str; 7] = ["and", "with", "x", "vs", "feat", "ft", "featuring"];

// ============================================================================
// String Similarity
// ============================================================================

/// Normalized edit-distance closeness in [0, 1].
/// Identical strings (including two empty strings) score 1.0; empty vs
/// non-empty scores 0.0. Symmetric.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b).clamp(0.0, 1.0)
}

fn token_set(s: &str) -> Vec<&str> {
    let set: FxHashSet<&str> = s.split_whitespace().collect();
    let mut tokens: Vec<&str> = set.into_iter().collect();
    tokens.sort_unstable();
    tokens
}

/// Fuzzy Jaccard over word tokens: tokens pair greedily by similarity
/// (only pairs >= TOKEN_PAIR_MIN), score = paired similarity / token union.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (i, ta) in tokens_a.iter().enumerate() {
        for (j, tb) in tokens_b.iter().enumerate() {
            let sim = similarity(ta, tb);
            if sim >= TOKEN_PAIR_MIN {
                pairs.push((sim, i, j));
            }
        }
    }
    pairs.sort_by(|x, y| y.0.total_cmp(&x.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));

    let mut used_a = vec![false; tokens_a.len()];
    let mut used_b = vec![false; tokens_b.len()];
    let mut paired = 0usize;
    let mut paired_sim = 0.0;
    for (sim, i, j) in pairs {
        if used_a[i] || used_b[j] {
            continue;
        }
        used_a[i] = true;
        used_b[j] = true;
        paired += 1;
        paired_sim += sim;
    }

    let union = tokens_a.len() + tokens_b.len() - paired;
    paired_sim / union as f64
}

// ============================================================================
// Artist Similarity
// ============================================================================

/// Similarity between two normalized artist names.
///
/// Takes the lower of character-level and token-level similarity: names that
/// differ in one whole word ("artist a" / "artist b") are different artists
/// even though their edit distance is small.
pub fn artist_similarity(a: &str, b: &str) -> f64 {
    similarity(a, b).min(token_overlap(a, b))
}

/// Order-insensitive form of a credit: sorted tokens without connector words.
fn credit_key(s: &str) -> String {
    let mut tokens: Vec<&str> = s
        .split_whitespace()
        .filter(|t| !CREDIT_CONNECTORS.contains(t))
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Score a normalized query artist against every credited candidate artist.
///
/// Returns the best per-artist similarity, or the similarity to the whole
/// credit compared order-insensitively when that is higher ("bas fkj"
/// against ["FKJ", "Bas"]). An empty query artist or credit scores 0.
pub fn score_artist(query_artist_norm: &str, candidate_artists: &[String]) -> f64 {
    if query_artist_norm.is_empty() || candidate_artists.is_empty() {
        return 0.0;
    }

    let normalized: Vec<String> = candidate_artists
        .iter()
        .map(|a| normalize_artist(a))
        .filter(|a| !a.is_empty())
        .collect();
    if normalized.is_empty() {
        return 0.0;
    }

    let mut best: f64 = 0.0;
    for artist_norm in &normalized {
        if artist_norm == query_artist_norm {
            return 1.0;
        }
        best = best.max(artist_similarity(query_artist_norm, artist_norm));
    }

    let query_key = credit_key(query_artist_norm);
    let credit = credit_key(&normalized.join(" "));
    if !query_key.is_empty() && !credit.is_empty() {
        best = best.max(artist_similarity(&query_key, &credit));
    }

    best
}

// ============================================================================
// Combined Scoring
// ============================================================================

/// Weighted title/artist score in [0, 1].
///
/// With `artist_score >= cutoff` the normal weighting applies
/// (0.60 title / 0.40 artist by default). Below the cutoff the weights swap,
/// so title similarity alone never carries a match with an implausible artist.
/// Returns (combined, penalized).
pub fn combined_score(title_score: f64, artist_score: f64, weights: &Weights) -> (f64, bool) {
    let penalized = artist_score < weights.artist_penalty_cutoff;
    let combined = if penalized {
        weights.artist * title_score + weights.title * artist_score
    } else {
        weights.title * title_score + weights.artist * artist_score
    };
    (combined.clamp(0.0, 1.0), penalized)
}

/// Score one candidate. Titles are always compared in their
/// qualifier-preserving form, so a remix never scores as its original.
pub fn score_candidate(query: &NormalizedQuery, candidate: &Candidate, weights: &Weights) -> ScoredCandidate {
    let title_score = similarity(&query.title_norm, &normalize(&candidate.title).text);
    let artist_score = score_artist(&query.artist_norm, &candidate.artists);
    let (combined, penalized) = combined_score(title_score, artist_score, weights);

    ScoredCandidate {
        candidate: candidate.clone(),
        title_score,
        artist_score,
        combined_score: combined,
        penalized,
    }
}

// ============================================================================
// Ranking
// ============================================================================

/// Rank candidates by combined score (descending), then popularity
/// (descending), then original order.
pub fn rank(query: &NormalizedQuery, candidates: &[Candidate], weights: &Weights) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|c| score_candidate(query, c, weights))
        .collect();

    // Stable sort keeps input order for full ties
    scored.sort_by(|a, b| {
        b.combined_score
            .total_cmp(&a.combined_score)
            .then_with(|| b.candidate.popularity.cmp(&a.candidate.popularity))
    });
    scored
}

// ============================================================================
// Verdict
// ============================================================================

/// Outcome of applying the threshold and ambiguity margin to a ranking.
#[derive(Debug, PartialEq)]
pub enum Verdict<'a> {
    Accept(&'a ScoredCandidate),
    /// Top candidate passes and others above the threshold sit within the
    /// margin; includes the top.
    Ambiguous(Vec<&'a ScoredCandidate>),
    Reject,
}

/// Judge a ranked list. `min_title_score` adds a title floor for the top
/// candidate (used by the Exact fast path).
pub fn judge(ranked: &[ScoredCandidate], threshold: f64, margin: f64, min_title_score: Option<f64>) -> Verdict<'_> {
    let Some(top) = ranked.first() else {
        return Verdict::Reject;
    };
    if top.combined_score < threshold {
        return Verdict::Reject;
    }
    if let Some(min_title) = min_title_score {
        if top.title_score < min_title {
            return Verdict::Reject;
        }
    }

    let contenders: Vec<&ScoredCandidate> = ranked
        .iter()
        .take_while(|s| {
            s.combined_score >= threshold && top.combined_score - s.combined_score <= margin + MARGIN_EPSILON
        })
        .collect();

    if contenders.len() > 1 {
        Verdict::Ambiguous(contenders)
    } else {
        Verdict::Accept(top)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackQuery;

    fn candidate(id: &str, title: &str, artists: &[&str], popularity: i32) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: String::new(),
            popularity,
        }
    }

    fn query(title: &str, artist: &str) -> NormalizedQuery {
        NormalizedQuery::from_query(&TrackQuery::new(title, artist))
    }

    #[test]
    fn test_similarity_properties() {
        for s in ["a", "midnight city", "m83", "song cabu and ta ku remix"] {
            assert_eq!(similarity(s, s), 1.0);
        }
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("", "x"), 0.0);
        assert_eq!(similarity("x", ""), 0.0);
        assert_eq!(similarity("kitten", "sitting"), similarity("sitting", "kitten"));
        let s = similarity("kitten", "sitting");
        assert!(s > 0.0 && s < 1.0);
    }

    #[test]
    fn test_token_overlap() {
        assert_eq!(token_overlap("daft punk", "punk daft"), 1.0);
        assert!((token_overlap("artist a", "artist b") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(token_overlap("", ""), 1.0);
        assert_eq!(token_overlap("queen", ""), 0.0);
        // Typos still pair
        assert!(token_overlap("beyonce", "beyonc") > 0.8);
    }

    #[test]
    fn test_artist_similarity_one_word_apart_is_low() {
        let s = artist_similarity("artist a", "artist b");
        assert!(s < 0.6, "expected penalty range, got {s}");
        assert_eq!(artist_similarity("m83", "m83"), 1.0);
    }

    #[test]
    fn test_score_artist_multi_credit() {
        let credit = vec!["Main Artist".to_string(), "Featured Artist".to_string()];
        assert_eq!(score_artist("featured artist", &credit), 1.0);

        // Different order of a two-artist credit
        let credit = vec!["FKJ".to_string(), "Bas".to_string()];
        let local = normalize_artist("Bas / FKJ");
        assert_eq!(score_artist(&local, &credit), 1.0);

        // Connector words are ignored in whole-credit comparison
        let credit = vec!["Daft Punk".to_string(), "Pharrell Williams".to_string()];
        assert!(score_artist(&normalize_artist("Daft Punk & Pharrell"), &credit) >= 0.6);
    }

    #[test]
    fn test_score_artist_empty() {
        assert_eq!(score_artist("", &["M83".to_string()]), 0.0);
        assert_eq!(score_artist("m83", &[]), 0.0);
    }

    #[test]
    fn test_combined_score_weighting() {
        let w = Weights::default();
        let (normal, penalized) = combined_score(1.0, 1.0, &w);
        assert!(!penalized);
        assert!((normal - 1.0).abs() < 1e-9);

        let (c, penalized) = combined_score(0.5, 0.6, &w);
        assert!(!penalized);
        assert!((c - (0.6 * 0.5 + 0.4 * 0.6)).abs() < 1e-9);

        let (c, penalized) = combined_score(1.0, 0.3, &w);
        assert!(penalized);
        assert!((c - (0.4 * 1.0 + 0.6 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_flips_ordering() {
        // Perfect title with a wrong artist (0.3) vs. adequate title (0.7) with a
        // plausible artist (0.65). Normal weighting: 0.72 vs 0.68. Penalized: 0.58 vs 0.68.
        let w = Weights::default();
        let (wrong_artist, penalized) = combined_score(1.0, 0.3, &w);
        assert!(penalized);
        let (right_artist, penalized_right) = combined_score(0.70, 0.65, &w);
        assert!(!penalized_right);

        let unpenalized_wrong = w.title * 1.0 + w.artist * 0.3;
        assert!(unpenalized_wrong > right_artist, "counterexample must rank wrong artist first without penalty");
        assert!(right_artist > wrong_artist, "penalty must flip the ordering");
    }

    #[test]
    fn test_rank_prefers_right_artist() {
        let q = query("Song Title", "Daft Punk");
        let candidates = vec![
            candidate("wrong", "Song Title", &["Metallica"], 90),
            candidate("right", "Song Titles", &["Daft Punk"], 10),
        ];
        let ranked = rank(&q, &candidates, &Weights::default());
        assert_eq!(ranked[0].candidate.id, "right");
        assert!(ranked[1].penalized);
        assert!(!ranked[0].penalized);
    }

    #[test]
    fn test_rank_ties_by_popularity_then_input_order() {
        let q = query("Midnight City", "M83");
        let candidates = vec![
            candidate("a", "Midnight City", &["M83"], 50),
            candidate("b", "Midnight City", &["M83"], 80),
            candidate("c", "Midnight City", &["M83"], 80),
        ];
        let ranked = rank(&q, &candidates, &Weights::default());
        let ids: Vec<&str> = ranked.iter().map(|s| s.candidate.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn test_rank_scores_stay_in_unit_range() {
        let q = query("A", "");
        let candidates = vec![
            candidate("1", "", &[], 0),
            candidate("2", "A very long different title", &["Someone"], 100),
        ];
        for s in rank(&q, &candidates, &Weights::default()) {
            assert!((0.0..=1.0).contains(&s.combined_score));
            assert_eq!(s.artist_score, 0.0);
        }
    }

    #[test]
    fn test_rank_keeps_remix_apart_from_original() {
        let q = query("Levels (Skrillex Remix)", "Avicii");
        let candidates = vec![
            candidate("orig", "Levels", &["Avicii"], 90),
            candidate("remix", "Levels - Skrillex Remix", &["Avicii"], 20),
        ];
        let ranked = rank(&q, &candidates, &Weights::default());
        assert_eq!(ranked[0].candidate.id, "remix");
        assert!(ranked[1].title_score < 0.5);
        assert!(ranked[1].combined_score < 0.83);
    }

    #[test]
    fn test_judge() {
        let q = query("Midnight City", "M83");
        let w = Weights::default();

        let ranked = rank(&q, &[candidate("1", "Midnight City", &["M83"], 0)], &w);
        assert!(matches!(judge(&ranked, 0.83, 0.02, Some(0.95)), Verdict::Accept(s) if s.candidate.id == "1"));

        let ranked = rank(
            &q,
            &[
                candidate("1", "Midnight City", &["M83"], 0),
                candidate("2", "Midnight City", &["M83"], 0),
            ],
            &w,
        );
        match judge(&ranked, 0.83, 0.02, None) {
            Verdict::Ambiguous(c) => assert_eq!(c.len(), 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }

        assert_eq!(judge(&[], 0.83, 0.02, None), Verdict::Reject);
        let ranked = rank(&q, &[candidate("1", "Midnight Cities Tonight", &["M83"], 0)], &w);
        assert_eq!(judge(&ranked, 0.99, 0.02, None), Verdict::Reject);
    }

    fn scored(id: &str, combined_score: f64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: candidate(id, "Song", &["Artist"], 0),
            title_score: 1.0,
            artist_score: 1.0,
            combined_score,
            penalized: false,
        }
    }

    #[test]
    fn test_judge_ignores_runner_up_below_threshold() {
        // Within the margin of the top, but under the threshold
        let ranked = vec![scored("top", 0.84), scored("close", 0.825)];
        assert!(matches!(judge(&ranked, 0.83, 0.02, None), Verdict::Accept(s) if s.candidate.id == "top"));

        let ranked = vec![scored("top", 0.86), scored("close", 0.845), scored("low", 0.829)];
        match judge(&ranked, 0.83, 0.02, None) {
            Verdict::Ambiguous(c) => {
                let ids: Vec<&str> = c.iter().map(|s| s.candidate.id.as_str()).collect();
                assert_eq!(ids, ["top", "close"]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }
}
