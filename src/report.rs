//! Aggregate result of a batch run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{MatchDecision, MatchOutcome};

/// One decision per input track, in input order, plus outcome counts.
///
/// `failed_count` overlaps `unmatched_count`: a failed track (invalid query,
/// search unavailable) is always reported as Unmatched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MatchReport {
    pub decisions: Vec<MatchDecision>,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub ambiguous_count: usize,
    pub failed_count: usize,
}

impl MatchReport {
    pub fn from_decisions(decisions: Vec<MatchDecision>) -> Self {
        let mut report = Self::default();
        for decision in &decisions {
            match decision.outcome {
                MatchOutcome::Matched => report.matched_count += 1,
                MatchOutcome::Unmatched => report.unmatched_count += 1,
                MatchOutcome::Ambiguous => report.ambiguous_count += 1,
            }
            if decision.failure.is_some() {
                report.failed_count += 1;
            }
        }
        report.decisions = decisions;
        report
    }

    pub fn total(&self) -> usize {
        self.decisions.len()
    }

    /// Matched share of all tracks, 0.0 for an empty report.
    pub fn match_rate(&self) -> f64 {
        if self.decisions.is_empty() {
            return 0.0;
        }
        self.matched_count as f64 / self.decisions.len() as f64
    }

    /// Chosen candidate ids in input order, ready to persist as a playlist.
    pub fn matched_ids(&self) -> Vec<&str> {
        self.decisions
            .iter()
            .filter_map(|d| d.chosen.as_ref())
            .map(|c| c.id.as_str())
            .collect()
    }

    /// Unmatched and ambiguous tracks that need a human look.
    pub fn follow_up(&self) -> impl Iterator<Item = &MatchDecision> {
        self.decisions.iter().filter(|d| d.needs_follow_up())
    }

    /// Tracks that failed for a transient reason and can be retried as-is.
    pub fn retryable(&self) -> impl Iterator<Item = &MatchDecision> {
        self.decisions
            .iter()
            .filter(|d| d.failure.as_ref().is_some_and(|f| f.is_retryable()))
    }

    /// Compact counts for logs, without the per-track decisions.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "total": self.total(),
            "matched": self.matched_count,
            "unmatched": self.unmatched_count,
            "ambiguous": self.ambiguous_count,
            "failed": self.failed_count,
            "match_rate": (self.match_rate() * 1000.0).round() / 1000.0,
        })
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize match report")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(())
    }
}
