use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tracklist_match::catalog::{load_candidates, SqliteCatalog};
use tracklist_match::compare::compare_playlists;
use tracklist_match::engine::RunStatus;
use tracklist_match::models::{MatchDecision, MatchOutcome, NormalizedQuery};
use tracklist_match::playlist;
use tracklist_match::progress::{
    create_progress_bar, format_duration, log_progress, set_log_only, RunTally,
};
use tracklist_match::safety::validate_output_path;
use tracklist_match::source::{MemoryCatalog, SearchCache};
use tracklist_match::strategy::cascade;
use tracklist_match::{CandidateSource, MatchEngine, MatcherConfig, Strategy};

#[derive(Parser)]
#[command(name = "tracklist-match")]
#[command(about = "Match a local playlist against a track catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tracks parsed from a playlist
    List { playlist: PathBuf },

    /// Match every playlist track against a catalog
    Match {
        playlist: PathBuf,

        #[command(flatten)]
        matcher: MatcherArgs,

        /// Catalog database (.sqlite3) or JSON array of tracks
        #[arg(long)]
        catalog: PathBuf,

        /// Write the full report as JSON (name must contain "report")
        #[arg(long)]
        report: Option<PathBuf>,

        /// Stop after this many tracks
        #[arg(long)]
        limit: Option<usize>,

        /// Hide progress bars, print periodic progress lines instead
        #[arg(long)]
        log_only: bool,
    },

    /// Show every strategy attempt and the top ranked candidates per track
    Explain {
        playlist: PathBuf,

        #[command(flatten)]
        matcher: MatcherArgs,

        #[arg(long)]
        catalog: PathBuf,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Compare a playlist with a remote playlist exported as a JSON array of tracks
    Compare {
        playlist: PathBuf,

        remote: PathBuf,

        #[command(flatten)]
        matcher: MatcherArgs,
    },

    /// Import a JSON array of tracks into a catalog database
    ImportCatalog { tracks: PathBuf, output: PathBuf },
}

#[derive(Args)]
struct MatcherArgs {
    /// JSON matcher config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    threshold: Option<f64>,

    /// Candidates requested per search
    #[arg(long)]
    result_cap: Option<usize>,

    /// Skip a fallback strategy (repeatable)
    #[arg(long, value_enum)]
    disable: Vec<Strategy>,
}

impl MatcherArgs {
    fn load(&self) -> Result<MatcherConfig> {
        let mut config = match &self.config {
            Some(path) => MatcherConfig::from_json_file(path)?,
            None => MatcherConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(cap) = self.result_cap {
            config.result_cap = cap;
        }
        for strategy in &self.disable {
            config.strategies.set(*strategy, false);
        }
        Ok(config)
    }

    fn engine(&self) -> Result<MatchEngine> {
        let engine = MatchEngine::new(self.load()?)?;
        Ok(engine)
    }
}

fn open_source(path: &Path) -> Result<Box<dyn CandidateSource>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let catalog = MemoryCatalog::new(load_candidates(path)?);
        info!(tracks = catalog.len(), "loaded in-memory catalog");
        Ok(Box::new(catalog))
    } else {
        if !path.exists() {
            bail!("Catalog not found: {}", path.display());
        }
        let catalog = SqliteCatalog::open(path)?;
        info!(tracks = catalog.len()?, "opened catalog database");
        Ok(Box::new(catalog))
    }
}

fn outcome_label(decision: &MatchDecision) -> &'static str {
    match (decision.outcome, &decision.failure) {
        (MatchOutcome::Matched, _) => "matched",
        (MatchOutcome::Ambiguous, _) => "ambiguous",
        (MatchOutcome::Unmatched, Some(_)) => "failed",
        (MatchOutcome::Unmatched, None) => "unmatched",
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{:.3}", s))
}

fn cmd_list(path: &Path) -> Result<()> {
    let playlist = playlist::parse_file(path)?;
    println!("{} ({} tracks)", playlist.name, playlist.len());
    println!("{:-<80}", "");
    for (i, entry) in playlist.entries.iter().enumerate() {
        let duration = entry
            .track
            .duration_sec
            .map(|d| format!("{}:{:02}", d / 60, d % 60))
            .unwrap_or_default();
        println!("{:>4}. {:<64} {:>6}", i + 1, entry.track.label(), duration);
    }
    Ok(())
}

fn cmd_match(
    playlist_path: &Path,
    matcher: &MatcherArgs,
    catalog_path: &Path,
    report_path: Option<&Path>,
    limit: Option<usize>,
) -> Result<()> {
    if let Some(report) = report_path {
        let mut sources = vec![playlist_path, catalog_path];
        if let Some(config) = &matcher.config {
            sources.push(config.as_path());
        }
        validate_output_path(report, "report", "json", &sources)?;
    }

    let engine = matcher.engine()?;
    let playlist = playlist::parse_file(playlist_path)?;
    let mut source = open_source(catalog_path)?;
    let tracks = playlist.tracks();

    let start = Instant::now();
    let total = limit.map_or(tracks.len(), |l| l.min(tracks.len()));
    let pb = create_progress_bar(total as u64, "Matching");
    let mut tally = RunTally::default();

    let outcome = engine.run(&tracks, &mut source, |index, decision| {
        tally.record(decision);
        let done = index as u64 + 1;
        pb.inc(1);
        pb.set_message(tally.message());
        log_progress("match", done, total as u64, 25, &tally.message());
        if limit.is_some_and(|l| index + 1 >= l) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    pb.finish_and_clear();

    let report = &outcome.report;
    println!("\n{:=<60}", "");
    println!("Playlist: {}", playlist.name);
    println!("  Tracks:    {}", report.total());
    println!("  Matched:   {}", report.matched_count);
    println!("  Unmatched: {}", report.unmatched_count);
    println!("  Ambiguous: {}", report.ambiguous_count);
    println!("  Failed:    {}", report.failed_count);
    println!("  Match rate: {:.1}%", report.match_rate() * 100.0);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    let follow_up: Vec<&MatchDecision> = report.follow_up().collect();
    if !follow_up.is_empty() {
        println!("\nNeeds follow-up:");
        for decision in follow_up {
            println!(
                "  [{}] {} (best {}, via {})",
                outcome_label(decision),
                decision.query.label(),
                format_score(decision.score),
                decision.strategy_used
            );
            for candidate in &decision.contenders {
                println!("      ? {} - {} [{}]", candidate.artist_credit(), candidate.title, candidate.id);
            }
            if let Some(failure) = &decision.failure {
                println!("      ! {}", failure);
            }
        }
    }

    eprintln!("{}", report.summary_json());

    if let Some(path) = report_path {
        report.write_to_file(path)?;
        println!("\nReport written to {}", path.display());
    }

    match outcome.status {
        RunStatus::Completed | RunStatus::Cancelled => Ok(()),
        RunStatus::Aborted(err) => Err(anyhow!(err).context("Matching stopped early")),
    }
}

fn cmd_explain(playlist_path: &Path, matcher: &MatcherArgs, catalog_path: &Path, limit: usize) -> Result<()> {
    let engine = matcher.engine()?;
    let config = engine.config().clone();
    let playlist = playlist::parse_file(playlist_path)?;
    let mut source = open_source(catalog_path)?;

    for query in playlist.tracks().iter().take(limit) {
        let decision = engine.decide(query, &mut source)?;
        println!("\n{}", query.label());
        println!(
            "  => {} (score {}, via {})",
            outcome_label(&decision),
            format_score(decision.score),
            decision.strategy_used
        );
        if let Some(chosen) = &decision.chosen {
            println!("     {} - {} [{}]", chosen.artist_credit(), chosen.title, chosen.id);
        }
        if decision.failure.is_some() {
            continue;
        }

        // Re-run each strategy on its own to show what it ranked
        let normalized = NormalizedQuery::from_query(query);
        let mut cache = SearchCache::new(&mut source, config.result_cap);
        for strategy in cascade(&config.strategies) {
            let attempt = strategy.attempt(&normalized, &mut cache, &config)?;
            println!(
                "  {:<14} \"{}\" -> {} candidates",
                strategy.kind().name(),
                attempt.record.search_query,
                attempt.record.candidate_count
            );
            for scored in attempt.ranked.iter().take(3) {
                println!(
                    "      {:.3} (title {:.3}, artist {:.3}{}) {} - {}",
                    scored.combined_score,
                    scored.title_score,
                    scored.artist_score,
                    if scored.penalized { ", penalized" } else { "" },
                    scored.candidate.artist_credit(),
                    scored.candidate.title
                );
            }
        }
    }
    Ok(())
}

fn cmd_compare(playlist_path: &Path, remote_path: &Path, matcher: &MatcherArgs) -> Result<()> {
    let engine = matcher.engine()?;
    let playlist = playlist::parse_file(playlist_path)?;
    let remote = load_candidates(remote_path)?;
    let result = compare_playlists(&playlist.tracks(), &remote, engine.config());

    println!("\n{:=<60}", "");
    println!("Local:  {} tracks", result.total_local);
    println!("Remote: {} tracks", result.total_remote);
    println!("Matched: {} ({:.1}%)", result.matched.len(), result.match_percentage);
    println!("{:=<60}", "");

    if result.is_in_sync() {
        println!("Playlists are in sync");
        return Ok(());
    }
    if !result.local_only.is_empty() {
        println!("\nOnly in {}:", playlist.name);
        for track in &result.local_only {
            println!("  - {}", track.label());
        }
    }
    if !result.ambiguous.is_empty() {
        println!("\nAmbiguous:");
        for item in &result.ambiguous {
            println!("  ? {}", item.local.label());
            for c in &item.contenders {
                println!("      {} - {} [{}]", c.artist_credit(), c.title, c.id);
            }
        }
    }
    if !result.remote_only.is_empty() {
        println!("\nOnly in remote:");
        for c in &result.remote_only {
            println!("  + {} - {}", c.artist_credit(), c.title);
        }
    }
    Ok(())
}

fn cmd_import_catalog(tracks: &Path, output: &Path) -> Result<()> {
    validate_output_path(output, "catalog", "sqlite3", &[tracks])?;

    let start = Instant::now();
    let mut catalog = SqliteCatalog::open(output)
        .with_context(|| format!("Failed to create catalog {}", output.display()))?;
    let imported = catalog.import_json(tracks)?;

    println!("\n{:=<60}", "");
    println!("Import complete!");
    println!("  Imported: {}", imported);
    println!("  Catalog size: {}", catalog.len()?);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");
    Ok(())
}

/// Filter from `RUST_LOG` directives, or `warn` when unset or unparsable.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn main() -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(rust_log.as_deref()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::List { playlist } => cmd_list(playlist),
        Command::Match {
            playlist,
            matcher,
            catalog,
            report,
            limit,
            log_only,
        } => {
            set_log_only(*log_only);
            cmd_match(playlist, matcher, catalog, report.as_deref(), *limit)
        }
        Command::Explain {
            playlist,
            matcher,
            catalog,
            limit,
        } => cmd_explain(playlist, matcher, catalog, *limit),
        Command::Compare {
            playlist,
            remote,
            matcher,
        } => cmd_compare(playlist, remote, matcher),
        Command::ImportCatalog { tracks, output } => cmd_import_catalog(tracks, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_honors_rust_log() {
        assert_eq!(log_filter(Some("info")).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            log_filter(Some("tracklist_match=debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn test_log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
    }
}
