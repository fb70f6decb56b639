//! Matcher configuration.
//!
//! Everything the decision engine tunes on is plain data passed in through
//! `MatcherConfig`; nothing is read from globals.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::MatchError;
use crate::models::Strategy;

/// Default acceptance threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.83;

/// Below this, false positives become common.
pub const LOW_THRESHOLD_WARNING: f64 = 0.75;

/// Above this, legitimate remix/edit variants start to be missed.
pub const HIGH_THRESHOLD_WARNING: f64 = 0.90;

/// Title/artist weighting. When `artist_score < artist_penalty_cutoff` the two
/// weights swap, so a wrong artist drags the combined score down.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub title: f64,
    pub artist: f64,
    pub artist_penalty_cutoff: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            title: 0.60,
            artist: 0.40,
            artist_penalty_cutoff: 0.60,
        }
    }
}

/// Per-strategy enable flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyToggles {
    pub exact: bool,
    pub fuzzy: bool,
    pub title_only: bool,
    pub cleaned_title: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self {
            exact: true,
            fuzzy: true,
            title_only: true,
            cleaned_title: true,
        }
    }
}

impl StrategyToggles {
    pub fn is_enabled(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::Exact => self.exact,
            Strategy::Fuzzy => self.fuzzy,
            Strategy::TitleOnly => self.title_only,
            Strategy::CleanedTitle => self.cleaned_title,
        }
    }

    pub fn set(&mut self, strategy: Strategy, enabled: bool) {
        match strategy {
            Strategy::Exact => self.exact = enabled,
            Strategy::Fuzzy => self.fuzzy = enabled,
            Strategy::TitleOnly => self.title_only = enabled,
            Strategy::CleanedTitle => self.cleaned_title = enabled,
        }
    }

    /// Enabled strategies in cascade order.
    pub fn enabled(&self) -> Vec<Strategy> {
        Strategy::ALL
            .into_iter()
            .filter(|s| self.is_enabled(*s))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub threshold: f64,
    /// Candidates requested per search query.
    pub result_cap: usize,
    pub strategies: StrategyToggles,
    pub weights: Weights,
    /// Top two within this distance → Ambiguous.
    pub ambiguity_margin: f64,
    /// Minimum title score for the Exact fast path.
    pub exact_title_min: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            result_cap: 10,
            strategies: StrategyToggles::default(),
            weights: Weights::default(),
            ambiguity_margin: 0.02,
            exact_title_min: 0.95,
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), MatchError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MatchError::InvalidConfig(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

impl MatcherConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Load a config from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: MatcherConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Reject values the engine cannot work with. Thresholds outside the
    /// recommended band are accepted but logged.
    pub fn validate(&self) -> Result<(), MatchError> {
        check_unit("threshold", self.threshold)?;
        check_unit("ambiguity_margin", self.ambiguity_margin)?;
        check_unit("exact_title_min", self.exact_title_min)?;
        check_unit("weights.title", self.weights.title)?;
        check_unit("weights.artist", self.weights.artist)?;
        check_unit("weights.artist_penalty_cutoff", self.weights.artist_penalty_cutoff)?;

        if (self.weights.title + self.weights.artist - 1.0).abs() > 1e-9 {
            return Err(MatchError::InvalidConfig(format!(
                "weights.title + weights.artist must equal 1, got {}",
                self.weights.title + self.weights.artist
            )));
        }
        if self.result_cap == 0 {
            return Err(MatchError::InvalidConfig("result_cap must be at least 1".into()));
        }
        if self.strategies.enabled().is_empty() {
            return Err(MatchError::InvalidConfig("at least one strategy must be enabled".into()));
        }

        if self.threshold < LOW_THRESHOLD_WARNING {
            warn!(threshold = self.threshold, "threshold below {} admits many false positives", LOW_THRESHOLD_WARNING);
        } else if self.threshold > HIGH_THRESHOLD_WARNING {
            warn!(threshold = self.threshold, "threshold above {} misses remix/edit variants", HIGH_THRESHOLD_WARNING);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatcherConfig::default();
        assert_eq!(config.threshold, 0.83);
        assert_eq!(config.strategies.enabled(), Strategy::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = MatcherConfig::default().with_threshold(1.5);
        assert!(matches!(config.validate(), Err(MatchError::InvalidConfig(_))));

        let mut config = MatcherConfig::default();
        config.weights.title = 0.7;
        assert!(config.validate().is_err());

        let mut config = MatcherConfig::default();
        config.result_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_a_strategy() {
        let mut config = MatcherConfig::default();
        for s in Strategy::ALL {
            config.strategies.set(s, false);
        }
        assert!(config.validate().is_err());
        config.strategies.set(Strategy::TitleOnly, true);
        assert_eq!(config.strategies.enabled(), vec![Strategy::TitleOnly]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MatcherConfig =
            serde_json::from_str(r#"{"threshold": 0.88, "strategies": {"cleaned_title": false}}"#).unwrap();
        assert_eq!(config.threshold, 0.88);
        assert_eq!(config.result_cap, 10);
        assert!(config.strategies.exact);
        assert!(!config.strategies.cleaned_title);
        assert_eq!(config.weights, Weights::default());
    }
}
