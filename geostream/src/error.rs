//! Error types shared across the streaming subsystem.
//!
//! Fetch and parse failures are captured inside a load operation and surfaced
//! once through its terminal callback. Usage errors flag programmer mistakes
//! and are returned to the caller instead of panicking.

use thiserror::Error;

use crate::scope::ScopeKey;

/// Error categories treated as expected outcomes of a fetch.
///
/// Matched case-insensitively against error messages.
pub const BENIGN_ERROR_PATTERNS: &[&str] = &["timeout", "timed out", "no data", "not found"];

/// Whether an error message belongs to a benign category.
pub fn is_benign_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    BENIGN_ERROR_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Errors returned by a [`crate::fetch::FetchService`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete in time.
    #[error("Request timeout")]
    Timeout,

    /// The resource does not exist.
    #[error("Resource not found")]
    NotFound,

    /// The resource exists but returned an empty body.
    #[error("No data returned")]
    NoData,

    /// Non-success HTTP status.
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Whether this error is an expected outcome rather than a fault.
    pub fn is_benign(&self) -> bool {
        match self {
            Self::Timeout | Self::NotFound | Self::NoData => true,
            Self::Http { status } => *status == 404 || *status == 204,
            Self::Network(msg) => is_benign_message(msg),
        }
    }
}

/// A payload that could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed payload: {0}")]
pub struct ParseError(pub String);

impl ParseError {
    /// Create a parse error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure of a single load attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The fetch collaborator failed.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The payload could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The attempt was superseded or torn down while in flight.
    #[error("Load interrupted")]
    Interrupted,

    /// Any other failure reported by a collaborator.
    #[error("{0}")]
    Other(String),
}

impl LoadError {
    /// Whether this error should be logged at debug level only.
    pub fn is_benign(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_benign(),
            Self::Interrupted => true,
            Self::Parse(e) => is_benign_message(&e.0),
            Self::Other(msg) => is_benign_message(msg),
        }
    }
}

/// Invalid use of the streaming API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsageError {
    /// `execute` was called on an operation that already started.
    #[error("Load operation already executed")]
    AlreadyExecuted,

    /// A scope with the same key is already registered.
    #[error("Duplicate scope registration: {0}")]
    DuplicateScope(ScopeKey),

    /// The scope handle is stale or was never issued by this loader.
    #[error("Unknown or disposed scope")]
    UnknownScope,

    /// The loader has been disposed.
    #[error("Loader is disposed")]
    LoaderDisposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_messages_case_insensitive() {
        assert!(is_benign_message("Request TIMEOUT after 10s"));
        assert!(is_benign_message("No Data"));
        assert!(is_benign_message("tile not found"));
        assert!(!is_benign_message("connection refused"));
    }

    #[test]
    fn test_fetch_error_benign_classification() {
        assert!(FetchError::Timeout.is_benign());
        assert!(FetchError::NotFound.is_benign());
        assert!(FetchError::NoData.is_benign());
        assert!(FetchError::Http { status: 404 }.is_benign());
        assert!(!FetchError::Http { status: 500 }.is_benign());
        assert!(!FetchError::Network("connection reset".into()).is_benign());
    }

    #[test]
    fn test_load_error_benign_classification() {
        assert!(LoadError::from(FetchError::Timeout).is_benign());
        assert!(LoadError::Interrupted.is_benign());
        assert!(!LoadError::from(ParseError::new("unexpected EOF")).is_benign());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            FetchError::Http { status: 503 }.to_string(),
            "HTTP error: status 503"
        );
        assert_eq!(
            LoadError::from(ParseError::new("bad json")).to_string(),
            "Malformed payload: bad json"
        );
        assert_eq!(UsageError::AlreadyExecuted.to_string(), "Load operation already executed");
    }
}
