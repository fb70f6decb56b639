//! Side-by-side comparison of a local track list with a remote playlist.
//!
//! No searching happens here: every local track is ranked directly against
//! the remote tracks nobody has claimed yet, using the same scorer and
//! acceptance rule as the decision engine.

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::config::MatcherConfig;
use crate::models::{Candidate, NormalizedQuery, TrackQuery};
use crate::scoring::{judge, rank, Verdict};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchedPair {
    pub local: TrackQuery,
    pub remote: Candidate,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AmbiguousTrack {
    pub local: TrackQuery,
    pub contenders: Vec<Candidate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub matched: Vec<MatchedPair>,
    /// Local tracks with no acceptable remote counterpart.
    pub local_only: Vec<TrackQuery>,
    /// Local tracks with several equally good remote counterparts. None of
    /// the contenders is claimed, so a later local track may still take one.
    pub ambiguous: Vec<AmbiguousTrack>,
    /// Remote tracks neither claimed nor offered as an ambiguous contender.
    pub remote_only: Vec<Candidate>,
    pub total_local: usize,
    pub total_remote: usize,
    /// matched / (local + remote_only) * 100
    pub match_percentage: f64,
}

impl ComparisonResult {
    pub fn is_in_sync(&self) -> bool {
        self.local_only.is_empty() && self.ambiguous.is_empty() && self.remote_only.is_empty()
    }
}

/// Compare two track lists. Each remote track is claimed by at most one
/// local track; local tracks are processed in order.
pub fn compare_playlists(local: &[TrackQuery], remote: &[Candidate], config: &MatcherConfig) -> ComparisonResult {
    let mut claimed: FxHashSet<&str> = FxHashSet::default();
    let mut contested: FxHashSet<&str> = FxHashSet::default();
    let mut result = ComparisonResult {
        total_local: local.len(),
        total_remote: remote.len(),
        ..Default::default()
    };

    for track in local {
        if track.title.trim().is_empty() {
            result.local_only.push(track.clone());
            continue;
        }

        let available: Vec<Candidate> = remote
            .iter()
            .filter(|c| !claimed.contains(c.id.as_str()))
            .cloned()
            .collect();
        let query = NormalizedQuery::from_query(track);
        let ranked = rank(&query, &available, &config.weights);

        match judge(&ranked, config.threshold, config.ambiguity_margin, None) {
            Verdict::Accept(top) => {
                if let Some(original) = remote.iter().find(|c| c.id == top.candidate.id) {
                    claimed.insert(original.id.as_str());
                }
                result.matched.push(MatchedPair {
                    local: track.clone(),
                    remote: top.candidate.clone(),
                    score: top.combined_score,
                });
            }
            Verdict::Ambiguous(contenders) => {
                for s in &contenders {
                    if let Some(original) = remote.iter().find(|c| c.id == s.candidate.id) {
                        contested.insert(original.id.as_str());
                    }
                }
                result.ambiguous.push(AmbiguousTrack {
                    local: track.clone(),
                    contenders: contenders.iter().map(|s| s.candidate.clone()).collect(),
                });
            }
            Verdict::Reject => result.local_only.push(track.clone()),
        }
    }

    result.remote_only = remote
        .iter()
        .filter(|c| !claimed.contains(c.id.as_str()) && !contested.contains(c.id.as_str()))
        .cloned()
        .collect();

    let total_unique = local.len() + result.remote_only.len();
    result.match_percentage = if total_unique > 0 {
        result.matched.len() as f64 / total_unique as f64 * 100.0
    } else {
        0.0
    };

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: &str, title: &str, artists: &[&str]) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: String::new(),
            popularity: 0,
        }
    }

    #[test]
    fn test_identical_playlists_fully_match() {
        let local = vec![
            TrackQuery::new("Midnight City", "M83"),
            TrackQuery::new("Bohemian Rhapsody", "Queen"),
        ];
        let remote = vec![
            remote("1", "Bohemian Rhapsody (Remastered 2011)", &["Queen"]),
            remote("2", "Midnight City", &["M83"]),
        ];
        let result = compare_playlists(&local, &remote, &MatcherConfig::default());

        let pairs: Vec<(&str, &str)> = result
            .matched
            .iter()
            .map(|p| (p.local.title.as_str(), p.remote.id.as_str()))
            .collect();
        assert_eq!(pairs, [("Midnight City", "2"), ("Bohemian Rhapsody", "1")]);
        assert!(result.is_in_sync());
        assert_eq!(result.match_percentage, 100.0);
    }

    #[test]
    fn test_differences_and_percentage() {
        let local = vec![
            TrackQuery::new("Midnight City", "M83"),
            TrackQuery::new("Only Here", "Local Band"),
        ];
        let remote = vec![
            remote("1", "Midnight City", &["M83"]),
            remote("2", "Only There", &["Remote Band"]),
        ];
        let result = compare_playlists(&local, &remote, &MatcherConfig::default());

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.local_only, vec![TrackQuery::new("Only Here", "Local Band")]);
        let remote_ids: Vec<&str> = result.remote_only.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(remote_ids, ["2"]);
        assert_eq!(result.total_local, 2);
        assert_eq!(result.total_remote, 2);
        // 1 / (2 + 1)
        assert!((result.match_percentage - 100.0 / 3.0).abs() < 1e-9);
        assert!(!result.is_in_sync());
    }

    #[test]
    fn test_remote_track_claimed_once() {
        let local = vec![TrackQuery::new("Wait", "M83"), TrackQuery::new("Wait", "M83")];
        let remote = vec![remote("w", "Wait", &["M83"])];
        let result = compare_playlists(&local, &remote, &MatcherConfig::default());

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.local_only.len(), 1);
        assert!(result.remote_only.is_empty());
        assert!((result.match_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_remote_tracks_are_ambiguous() {
        let local = vec![TrackQuery::new("Wait", "M83")];
        let remote = vec![remote("a", "Wait", &["M83"]), remote("b", "Wait", &["M83"])];
        let result = compare_playlists(&local, &remote, &MatcherConfig::default());

        assert!(result.matched.is_empty());
        assert_eq!(result.ambiguous.len(), 1);
        assert_eq!(result.ambiguous[0].contenders.len(), 2);
        assert!(result.remote_only.is_empty());
        assert!(!result.is_in_sync());
        // 0 / (1 + 0)
        assert_eq!(result.match_percentage, 0.0);
    }

    #[test]
    fn test_repeated_ambiguous_tracks_keep_contenders_out_of_remote_only() {
        let local = vec![TrackQuery::new("Wait", "M83"), TrackQuery::new("Wait", "M83")];
        let remote = vec![
            remote("a", "Wait", &["M83"]),
            remote("b", "Wait", &["M83"]),
            remote("x", "Outro", &["M83"]),
        ];
        let result = compare_playlists(&local, &remote, &MatcherConfig::default());

        // Both tracks see the same two contenders; neither claims one
        assert_eq!(result.ambiguous.len(), 2);
        let remote_ids: Vec<&str> = result.remote_only.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(remote_ids, ["x"]);
    }

    #[test]
    fn test_empty_inputs() {
        let result = compare_playlists(&[], &[], &MatcherConfig::default());
        assert_eq!(result.match_percentage, 0.0);
        assert!(result.is_in_sync());
    }
}
