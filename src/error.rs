//! Error types for matching and for the search collaborator.

use serde::Serialize;
use thiserror::Error;

/// Failure reported by a [`CandidateSource`](crate::source::CandidateSource).
///
/// A zero-result search is not an error; sources return `Ok(vec![])` for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Transient failure (network, rate limit, malformed query). Retryable.
    #[error("search unavailable: {0}")]
    Unavailable(String),
    /// The collaborator cannot serve any further search (e.g. revoked credentials).
    #[error("search collaborator failed: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum MatchError {
    /// Title empty after trimming; decision logic is not run for this track.
    #[error("invalid query: title is empty")]
    InvalidQuery,
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),
    /// Fatal collaborator failure; stops the run.
    #[error("search collaborator failed: {0}")]
    CollaboratorFailed(String),
    #[error("invalid matcher config: {0}")]
    InvalidConfig(String),
}

impl MatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::SearchUnavailable(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, MatchError::CollaboratorFailed(_))
    }
}

impl From<SearchError> for MatchError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Unavailable(msg) => MatchError::SearchUnavailable(msg),
            SearchError::Fatal(msg) => MatchError::CollaboratorFailed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_conversion() {
        let unavailable: MatchError = SearchError::Unavailable("429".into()).into();
        assert!(unavailable.is_retryable());
        assert!(!unavailable.is_fatal());

        let fatal: MatchError = SearchError::Fatal("token revoked".into()).into();
        assert!(fatal.is_fatal());
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_invalid_query_is_neither_retryable_nor_fatal() {
        assert!(!MatchError::InvalidQuery.is_retryable());
        assert!(!MatchError::InvalidQuery.is_fatal());
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let json = serde_json::to_string(&MatchError::SearchUnavailable("timeout".into())).unwrap();
        assert_eq!(json, r#"{"kind":"search_unavailable","message":"timeout"}"#);
    }
}
