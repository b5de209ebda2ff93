//! Error taxonomy for the comparison path.
//!
//! Collaborators report failures with `anyhow`; the comparison path
//! classifies them into [`CompareError`] so the HTTP layer can pick a status
//! code and the single-flight cache can hand one outcome to every waiter
//! (hence `Clone`).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompareError {
    /// Missing category, empty or zero-weight criteria, malformed criterion.
    /// A client error; never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The catalog collaborator failed to supply candidates.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The cache store failed. Recovered locally; only constructed for logging.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The request was cancelled or timed out before the result was ready.
    #[error("computation cancelled: {0}")]
    ComputationCancelled(String),

    /// An invariant that upstream validation should have guaranteed was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompareError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CompareError::InvalidRequest(message.into())
    }

    /// Machine-readable code used in the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CompareError::InvalidRequest(_) => "bad_request",
            CompareError::CatalogUnavailable(_) => "catalog_unavailable",
            CompareError::CacheUnavailable(_) => "cache_unavailable",
            CompareError::ComputationCancelled(_) => "timeout",
            CompareError::Internal(_) => "internal",
        }
    }
}

pub type CompareResult<T> = Result<T, CompareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_message() {
        let err = CompareError::invalid("criteria must not be empty");
        assert_eq!(err.to_string(), "invalid request: criteria must not be empty");
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn test_cancelled_maps_to_timeout_code() {
        let err = CompareError::ComputationCancelled("deadline elapsed".into());
        assert_eq!(err.code(), "timeout");
    }
}
