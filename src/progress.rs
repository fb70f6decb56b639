//! Progress bars and tail-friendly progress lines for batch runs.
//!
//! In log-only mode bars are hidden and `log_progress` prints periodic
//! one-line updates to stderr instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::models::{MatchDecision, MatchOutcome};

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// "4.2s" below a minute, "3.5m" above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Bar for a run over `len` tracks. Hidden in log-only mode.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else if let Ok(style) = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_prefix(msg.to_string());
    pb
}

/// Spinner for work of unknown length (index rebuilds). Hidden in log-only mode.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner} [{elapsed_precise}]") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Print "[phase] current/total (pct%) detail" every `interval` items and at
/// the end. Only in log-only mode.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64, detail: &str) {
    if !is_log_only() || total == 0 {
        return;
    }
    if current % interval.max(1) == 0 || current == total {
        let pct = 100.0 * current as f64 / total as f64;
        eprintln!("[{}] {}/{} ({:.1}%) {}", phase, current, total, pct, detail);
    }
}

/// Running outcome counts shown next to the bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunTally {
    pub matched: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
    pub failed: usize,
}

impl RunTally {
    pub fn record(&mut self, decision: &MatchDecision) {
        match decision.outcome {
            MatchOutcome::Matched => self.matched += 1,
            MatchOutcome::Unmatched => self.unmatched += 1,
            MatchOutcome::Ambiguous => self.ambiguous += 1,
        }
        if decision.failure.is_some() {
            self.failed += 1;
        }
    }

    pub fn message(&self) -> String {
        let mut msg = format!(
            "matched {} | unmatched {} | ambiguous {}",
            self.matched, self.unmatched, self.ambiguous
        );
        if self.failed > 0 {
            msg.push_str(&format!(" | failed {}", self.failed));
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchError;
    use crate::models::{Strategy, TrackQuery};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(210)), "3.5m");
    }

    #[test]
    fn test_tally_message() {
        let mut tally = RunTally::default();
        let mut decision = MatchDecision {
            query: TrackQuery::new("", "x"),
            outcome: MatchOutcome::Unmatched,
            chosen: None,
            score: None,
            strategy_used: Strategy::Exact,
            contenders: Vec::new(),
            attempts: Vec::new(),
            failure: None,
        };
        tally.record(&decision);
        assert_eq!(tally.message(), "matched 0 | unmatched 1 | ambiguous 0");

        decision.failure = Some(MatchError::InvalidQuery);
        tally.record(&decision);
        assert_eq!(tally.unmatched, 2);
        assert!(tally.message().ends_with("| failed 1"));
    }
}
