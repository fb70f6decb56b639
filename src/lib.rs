//! Track matching library - reconciles a local track list with a remote catalog.

pub mod catalog;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod normalize;
pub mod playlist;
pub mod progress;
pub mod report;
pub mod safety;
pub mod scoring;
pub mod source;
pub mod strategy;

pub use config::MatcherConfig;
pub use engine::MatchEngine;
pub use error::{MatchError, SearchError};
pub use models::{Candidate, MatchDecision, MatchOutcome, Strategy, TrackQuery};
pub use report::MatchReport;
pub use source::CandidateSource;
