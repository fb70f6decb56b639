//! Match decision engine.
//!
//! Runs the strategy cascade for one track (`decide`) or a whole track list
//! (`run`). Tracks are processed strictly one at a time: fallback strategies
//! issue extra searches and the collaborator owns rate limiting.

use std::ops::ControlFlow;

use tracing::{error, info, warn};

use crate::config::MatcherConfig;
use crate::error::{MatchError, SearchError};
use crate::models::{
    Candidate, MatchDecision, MatchOutcome, NormalizedQuery, Strategy, StrategyAttempt, TrackQuery,
};
use crate::report::MatchReport;
use crate::scoring::Verdict;
use crate::source::{CandidateSource, SearchCache};
use crate::strategy::cascade;

/// How a batch run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    /// The decision callback asked to stop.
    Cancelled,
    /// The collaborator failed in a way that prevents any further search.
    Aborted(MatchError),
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Decisions for every track processed before the run ended.
    pub report: MatchReport,
    pub status: RunStatus,
}

#[derive(Debug, Clone)]
pub struct MatchEngine {
    config: MatcherConfig,
}

impl MatchEngine {
    pub fn new(config: MatcherConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Decide one track.
    ///
    /// Per-track problems (empty title, transient search failure) come back
    /// as an `Unmatched` decision with `failure` set. `Err` is reserved for
    /// fatal collaborator failures.
    pub fn decide<S: CandidateSource>(&self, query: &TrackQuery, source: &mut S) -> Result<MatchDecision, MatchError> {
        let strategies = cascade(&self.config.strategies);
        let first = strategies.first().map(|s| s.kind()).unwrap_or(Strategy::Exact);

        if query.title.trim().is_empty() {
            info!(track = %query.label(), "skipping track with empty title");
            return Ok(unmatched(query, first, Vec::new(), None, Some(MatchError::InvalidQuery)));
        }

        let normalized = NormalizedQuery::from_query(query);
        let mut cache = SearchCache::new(source, self.config.result_cap);
        let mut attempts: Vec<StrategyAttempt> = Vec::with_capacity(strategies.len());
        let mut best_score: Option<f64> = None;
        let mut last = first;

        for strategy in &strategies {
            last = strategy.kind();
            let attempt = match strategy.attempt(&normalized, &mut cache, &self.config) {
                Ok(attempt) => attempt,
                Err(SearchError::Fatal(msg)) => {
                    error!(track = %query.label(), strategy = %last, error = %msg, "search collaborator failed");
                    return Err(MatchError::CollaboratorFailed(msg));
                }
                Err(SearchError::Unavailable(msg)) => {
                    warn!(track = %query.label(), strategy = %last, error = %msg, "search unavailable, track left unmatched");
                    return Ok(unmatched(
                        query,
                        last,
                        attempts,
                        best_score,
                        Some(MatchError::SearchUnavailable(msg)),
                    ));
                }
            };

            if let Some(score) = attempt.record.best_score {
                best_score = Some(best_score.map_or(score, |b: f64| b.max(score)));
            }

            let decision = match attempt.verdict(strategy.as_ref(), &self.config) {
                Verdict::Accept(top) => Some(MatchDecision {
                    query: query.clone(),
                    outcome: MatchOutcome::Matched,
                    chosen: Some(top.candidate.clone()),
                    score: Some(top.combined_score),
                    strategy_used: last,
                    contenders: Vec::new(),
                    attempts: Vec::new(),
                    failure: None,
                }),
                Verdict::Ambiguous(contenders) => Some(MatchDecision {
                    query: query.clone(),
                    outcome: MatchOutcome::Ambiguous,
                    chosen: None,
                    score: Some(contenders[0].combined_score),
                    strategy_used: last,
                    contenders: contenders.iter().map(|s| s.candidate.clone()).collect::<Vec<Candidate>>(),
                    attempts: Vec::new(),
                    failure: None,
                }),
                Verdict::Reject => None,
            };

            attempts.push(attempt.record);

            if let Some(mut decision) = decision {
                decision.attempts = attempts;
                info!(
                    track = %query.label(),
                    outcome = ?decision.outcome,
                    strategy = %last,
                    score = decision.score,
                    requests = cache.requests(),
                    "track decided"
                );
                return Ok(decision);
            }
        }

        info!(track = %query.label(), strategy = %last, best = best_score, "no strategy reached threshold");
        Ok(unmatched(query, last, attempts, best_score, None))
    }

    /// Decide every track in order, streaming each decision to `on_decision`.
    ///
    /// Returning `ControlFlow::Break` from the callback stops the run after
    /// the current track. A fatal collaborator failure also stops it; the
    /// decisions made so far are kept in the report either way.
    pub fn run<S, F>(&self, queries: &[TrackQuery], source: &mut S, mut on_decision: F) -> RunOutcome
    where
        S: CandidateSource,
        F: FnMut(usize, &MatchDecision) -> ControlFlow<()>,
    {
        let mut decisions = Vec::with_capacity(queries.len());

        for (index, query) in queries.iter().enumerate() {
            let decision = match self.decide(query, source) {
                Ok(decision) => decision,
                Err(err) => {
                    return RunOutcome {
                        report: MatchReport::from_decisions(decisions),
                        status: RunStatus::Aborted(err),
                    };
                }
            };

            let flow = on_decision(index, &decision);
            decisions.push(decision);
            if flow.is_break() {
                return RunOutcome {
                    report: MatchReport::from_decisions(decisions),
                    status: RunStatus::Cancelled,
                };
            }
        }

        RunOutcome {
            report: MatchReport::from_decisions(decisions),
            status: RunStatus::Completed,
        }
    }
}

fn unmatched(
    query: &TrackQuery,
    strategy_used: Strategy,
    attempts: Vec<StrategyAttempt>,
    score: Option<f64>,
    failure: Option<MatchError>,
) -> MatchDecision {
    MatchDecision {
        query: query.clone(),
        outcome: MatchOutcome::Unmatched,
        chosen: None,
        score,
        strategy_used,
        contenders: Vec::new(),
        attempts,
        failure,
    }
}
