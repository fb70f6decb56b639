//! Core data models for track matching.
//!
//! Inputs (`TrackQuery`, `Candidate`) are read-only to the matcher; every
//! other type here is produced by it.

use serde::{Deserialize, Serialize};

use crate::error::MatchError;

// ============================================================================
// Inputs
// ============================================================================

/// One entry of the local track list, as produced by the playlist parser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackQuery {
    pub title: String,
    /// Empty when unknown; an empty artist forces the penalty weighting.
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub duration_sec: Option<u32>,
}

impl TrackQuery {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            duration_sec: None,
        }
    }

    pub fn with_duration(mut self, duration_sec: u32) -> Self {
        self.duration_sec = Some(duration_sec);
        self
    }

    /// Display form used by the CLI and logs: "Artist - Title" or just "Title".
    pub fn label(&self) -> String {
        if self.artist.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

/// Remote catalog item returned by the search collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>, // Credited order
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub popularity: i32, // 0-100
}

impl Candidate {
    pub fn artist_credit(&self) -> String {
        self.artists.join(", ")
    }
}

// ============================================================================
// Derived / Scored
// ============================================================================

/// Comparison-ready form of a `TrackQuery`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Normalized title with any preserved qualifier re-appended.
    pub title_norm: String,
    pub artist_norm: String,
    pub preserved_qualifier: Option<String>,
    /// Aggressively stripped title (qualifiers removed) for the last-resort strategy.
    pub title_cleaned: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub title_score: f64,
    pub artist_score: f64,
    pub combined_score: f64,
    /// True when the artist-mismatch weighting was applied.
    pub penalized: bool,
}

// ============================================================================
// Decisions
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched,
    Unmatched,
    /// Two or more candidates are indistinguishable; never auto-resolved.
    Ambiguous,
}

/// Fallback cascade step, in the order the engine attempts them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Exact,
    Fuzzy,
    TitleOnly,
    CleanedTitle,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Exact,
        Strategy::Fuzzy,
        Strategy::TitleOnly,
        Strategy::CleanedTitle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::Fuzzy => "fuzzy",
            Strategy::TitleOnly => "title_only",
            Strategy::CleanedTitle => "cleaned_title",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What one strategy saw, kept for presentation and failure analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub search_query: String,
    pub candidate_count: usize,
    pub best_score: Option<f64>,
}

/// Terminal per-track result.
///
/// ## Invariants
///
/// - `chosen` is `Some` if and only if `outcome == Matched`
/// - `Matched` implies `score >= threshold`
/// - `contenders` is non-empty only for `Ambiguous`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchDecision {
    pub query: TrackQuery,
    pub outcome: MatchOutcome,
    pub chosen: Option<Candidate>,
    pub score: Option<f64>,
    pub strategy_used: Strategy,
    pub contenders: Vec<Candidate>,
    pub attempts: Vec<StrategyAttempt>,
    /// Per-track failure (invalid query, transient search failure).
    pub failure: Option<MatchError>,
}

impl MatchDecision {
    pub fn is_matched(&self) -> bool {
        self.outcome == MatchOutcome::Matched
    }

    pub fn needs_follow_up(&self) -> bool {
        matches!(self.outcome, MatchOutcome::Unmatched | MatchOutcome::Ambiguous)
    }
}
