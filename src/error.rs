//! Error taxonomy for the symdex core.
//!
//! Initialization and single-item ingestion fail loud; search and statistics
//! fail soft (the engine catches [`Error::Backend`] internally and degrades
//! to empty results). The two policies are deliberate and must not be
//! unified — see `text_search` / `get_statistics` for the soft paths.

use thiserror::Error;

/// Every field problem found while validating one ingestion payload.
///
/// The validation pass collects all offending fields instead of stopping at
/// the first, so a caller can fix a payload in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationIssues {
    /// Required fields that were absent or empty.
    pub missing: Vec<String>,
    /// Fields that were present but malformed, with a reason each.
    pub invalid: Vec<String>,
}

impl ValidationIssues {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl std::fmt::Display for ValidationIssues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing fields: {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid fields: {}", self.invalid.join("; ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Top-level error type for the symdex core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The backing store could not be opened or created at `initialize()`.
    /// Always propagated to the caller, never swallowed.
    #[error("failed to open index store: {0}")]
    Connection(String),

    /// A data-access call was made before a successful `initialize()`.
    #[error("index not initialized (call initialize() first)")]
    NotInitialized,

    /// An ingestion payload failed validation. Propagated by `add_entity`,
    /// converted to a silent skip inside `add_entities_batch`.
    #[error("invalid entity payload: {0}")]
    Validation(ValidationIssues),

    /// A storage or search backend fault after successful initialization.
    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),

    /// The embedding provider failed to produce vectors.
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for symdex operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_issues_display() {
        let issues = ValidationIssues {
            missing: vec!["id".into(), "name".into()],
            invalid: vec!["embedding: expected 384 components, got 3".into()],
        };
        let text = issues.to_string();
        assert!(text.contains("missing fields: id, name"));
        assert!(text.contains("embedding: expected 384 components"));
    }

    #[test]
    fn test_error_display() {
        let err = Error::NotInitialized;
        assert!(err.to_string().contains("not initialized"));

        let err = Error::Connection("unable to open database file".into());
        assert!(err.to_string().contains("unable to open database file"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
