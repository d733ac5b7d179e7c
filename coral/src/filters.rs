//! Include/exclude rules applied by the traversal.
//!
//! Exclude globs are matched against an entry's full path the way `find -path` does
//! (`*` also matches `/`), so `*/node_modules` prunes every `node_modules` directory.
//! Include globs are matched against the file name only, ignoring case.
use glob::{MatchOptions, Pattern};
use std::path::Path;

use crate::errors::{SearchError, SearchResult};

/// Extension of files whose text has to be extracted before matching
pub const DOCUMENT_EXTENSION: &str = "pdf";

const INCLUDE_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// How a file takes part in the content phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Bytes are matched directly
    Plain,
    /// Text comes from the extraction cache
    Document,
}

/// Compiled include/exclude globs
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl SearchFilters {
    /// Compiles the glob lists; a malformed glob is a validation error.
    pub fn new(include: &[String], exclude: &[String]) -> SearchResult<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether the entry (and, for a directory, its whole subtree) is skipped
    pub fn should_prune(&self, path: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        let normalized = path.to_string_lossy().replace('\\', "/");
        self.exclude.iter().any(|p| p.matches(&normalized))
    }

    /// Decides whether a file is searched by content, and how.
    ///
    /// With no include globs every file qualifies. Otherwise the file name has to
    /// match one of them; documents follow the same rule, so they are searched only
    /// when a glob such as `*.pdf` is listed.
    pub fn classify(&self, path: &Path) -> Option<FileKind> {
        let kind = if is_document(path) {
            FileKind::Document
        } else {
            FileKind::Plain
        };

        if self.include.is_empty() {
            return Some(kind);
        }

        let name = path.file_name()?.to_string_lossy();
        self.include
            .iter()
            .any(|p| p.matches_with(&name, INCLUDE_OPTIONS))
            .then_some(kind)
    }
}

fn compile(patterns: &[String]) -> SearchResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| SearchError::invalid_pattern(format!("glob '{}': {}", p, e)))
        })
        .collect()
}

/// Checks if a file needs text extraction, by extension and ignoring case
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
}
