/// Error types for coral searches.
///
/// Errors fall into four groups, and only two of them ever reach the caller:
///
/// 1. **Validation** (`EmptyQuery`, `TooFewTerms`, `UnterminatedQuote`, `InvalidPattern`)
///    are raised while the request is built, before any traversal happens.
/// 2. **Fatal** (`RootNotFound`, `RootInaccessible`) aborts the pipeline before
///    traversal starts.
/// 3. **Environment** problems (extractor missing, unreadable subtree) are logged and
///    recorded as warnings on the search outcome; the search keeps going.
/// 4. **Per-file** problems (unreadable or vanished file, cache write failure) are
///    skipped inside their phase and never propagate.
///
/// `Cancelled` covers both a dismissed query prompt and a pipeline stopped through
/// its cancellation token, so callers handle the two the same way.
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::query::SearchMode;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search query is empty")]
    EmptyQuery,
    #[error("{mode} search needs at least 2 terms, got {found}")]
    TooFewTerms { mode: SearchMode, found: usize },
    #[error("Unterminated quote in query: {0}")]
    UnterminatedQuote(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Search root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Search root is not readable: {}: {reason}", path.display())]
    RootInaccessible { path: PathBuf, reason: String },
    #[error("Search cancelled")]
    Cancelled,
    #[error("Cache error: {0}")]
    CacheError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to open {}: {reason}", path.display())]
    OpenFailed { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl SearchError {
    pub fn too_few_terms(mode: SearchMode, found: usize) -> Self {
        Self::TooFewTerms { mode, found }
    }

    pub fn unterminated_quote(input: impl Into<String>) -> Self {
        Self::UnterminatedQuote(input.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn root_not_found(path: impl Into<PathBuf>) -> Self {
        Self::RootNotFound(path.into())
    }

    pub fn root_inaccessible(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RootInaccessible {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::CacheError(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn open_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised by request validation, before any traversal.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyQuery
                | Self::TooFewTerms { .. }
                | Self::UnterminatedQuote(_)
                | Self::InvalidPattern(_)
        )
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SearchError::too_few_terms(SearchMode::Or, 1);
        assert!(matches!(err, SearchError::TooFewTerms { found: 1, .. }));

        let err = SearchError::invalid_pattern("a\\1");
        assert!(matches!(err, SearchError::InvalidPattern(_)));

        let err = SearchError::root_not_found("/nope");
        assert!(matches!(err, SearchError::RootNotFound(_)));

        let err = SearchError::root_inaccessible("/locked", "Permission denied");
        assert!(matches!(err, SearchError::RootInaccessible { .. }));
        assert!(!err.is_validation());

        let err = SearchError::cache_error("disk full");
        assert!(matches!(err, SearchError::CacheError(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = SearchError::too_few_terms(SearchMode::And, 1);
        assert_eq!(err.to_string(), "AND search needs at least 2 terms, got 1");

        let err = SearchError::config_error("Missing required field");
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field"
        );

        let err = SearchError::root_not_found("missing");
        assert_eq!(err.to_string(), "Search root not found: missing");

        let err = SearchError::root_inaccessible("locked", "Permission denied");
        assert_eq!(
            err.to_string(),
            "Search root is not readable: locked: Permission denied"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(SearchError::EmptyQuery.is_validation());
        assert!(SearchError::unterminated_quote("\"abc").is_validation());
        assert!(!SearchError::Cancelled.is_validation());
        assert!(!SearchError::root_not_found("x").is_validation());
    }
}
