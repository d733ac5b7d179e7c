//! Search requests and query validation.
//!
//! A [`SearchRequest`] is the immutable description of one search. It can only be
//! obtained through [`SearchRequestBuilder::build`], which performs every check that
//! must happen before traversal: the query is non-empty, multi-term modes have at
//! least two terms, quoting is balanced and the root exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{unify_path, SearchError, SearchResult};

/// Minimum number of terms for [`SearchMode::Or`] and [`SearchMode::And`]
pub const MIN_MULTI_TERMS: usize = 2;

/// How the query is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Fixed string, no metacharacters
    #[default]
    Literal,
    /// POSIX basic regular expression
    BasicRegex,
    /// POSIX extended regular expression
    ExtendedRegex,
    /// Any of several literal terms
    Or,
    /// Every one of several literal terms
    And,
}

impl SearchMode {
    /// Or/And take a list of terms instead of a single query string
    pub fn is_multi_term(self) -> bool {
        matches!(self, SearchMode::Or | SearchMode::And)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Literal => write!(f, "Literal"),
            SearchMode::BasicRegex => write!(f, "Basic Regex"),
            SearchMode::ExtendedRegex => write!(f, "Extended Regex"),
            SearchMode::Or => write!(f, "OR"),
            SearchMode::And => write!(f, "AND"),
        }
    }
}

/// A validated query: one string for the single-pattern modes, an ordered term list
/// for Or/And.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Query {
    Single(String),
    Terms(Vec<String>),
}

impl Query {
    /// Parses raw prompt or command-line input for the given mode.
    ///
    /// Single-pattern modes take the trimmed input verbatim. Or/And split it with
    /// [`tokenize`] and require at least [`MIN_MULTI_TERMS`] tokens.
    pub fn parse(mode: SearchMode, raw: &str) -> SearchResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        if mode.is_multi_term() {
            Self::from_terms(mode, tokenize(trimmed)?)
        } else {
            Ok(Query::Single(trimmed.to_string()))
        }
    }

    /// Builds a query from terms that were already split by the caller
    /// (for example, repeated command-line arguments).
    pub fn from_terms(mode: SearchMode, terms: Vec<String>) -> SearchResult<Self> {
        let terms: Vec<String> = terms.into_iter().filter(|t| !t.is_empty()).collect();
        if terms.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        if mode.is_multi_term() {
            if terms.len() < MIN_MULTI_TERMS {
                return Err(SearchError::too_few_terms(mode, terms.len()));
            }
            Ok(Query::Terms(terms))
        } else {
            Ok(Query::Single(terms.join(" ")))
        }
    }

    /// Terms in the order given; a single query is one term
    pub fn terms(&self) -> &[String] {
        match self {
            Query::Single(q) => std::slice::from_ref(q),
            Query::Terms(terms) => terms,
        }
    }

    /// The query as typed, used for reports and for name matching
    pub fn raw(&self) -> String {
        match self {
            Query::Single(q) => q.clone(),
            Query::Terms(terms) => terms
                .iter()
                .map(|t| {
                    if t.contains(char::is_whitespace) {
                        format!("\"{}\"", t)
                    } else {
                        t.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Splits input into terms using shell-style quoting.
///
/// Whitespace separates terms. Double-quoted text is one term, with `\"` and `\\`
/// escapes inside it. Single-quoted text is one term taken literally. Outside quotes a
/// backslash escapes the next character. Quoted and unquoted text that touch are
/// joined, and empty terms are dropped.
pub fn tokenize(input: &str) -> SearchResult<Vec<String>> {
    #[derive(PartialEq)]
    enum State {
        Plain,
        Double,
        Single,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = State::Plain;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Plain => match c {
                '"' => state = State::Double,
                '\'' => state = State::Single,
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Plain,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => return Err(SearchError::unterminated_quote(input)),
                },
                c => current.push(c),
            },
            State::Single => match c {
                '\'' => state = State::Plain,
                c => current.push(c),
            },
        }
    }

    if state != State::Plain {
        return Err(SearchError::unterminated_quote(input));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Everything one search needs. Read-only once built.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    root: PathBuf,
    mode: SearchMode,
    query: Query,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl SearchRequest {
    pub fn builder(root: impl Into<PathBuf>) -> SearchRequestBuilder {
        SearchRequestBuilder {
            root: root.into(),
            mode: SearchMode::default(),
            query: None,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Absolute directory the search starts from
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }
}

/// Builder for [`SearchRequest`]
#[derive(Debug)]
pub struct SearchRequestBuilder {
    root: PathBuf,
    mode: SearchMode,
    query: Option<Query>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl SearchRequestBuilder {
    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets an already validated query
    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the query against the mode and resolves the root.
    ///
    /// A root that is a file is replaced by its parent directory. A root directory
    /// that can't be listed is fatal, like a missing one.
    pub fn build(self) -> SearchResult<SearchRequest> {
        let query = self.query.ok_or(SearchError::EmptyQuery)?;
        let query = match query {
            Query::Single(raw) => Query::parse(self.mode, &raw)?,
            Query::Terms(terms) => Query::from_terms(self.mode, terms)?,
        };

        if !self.root.exists() {
            return Err(SearchError::root_not_found(self.root));
        }
        let mut root = unify_path(&self.root);
        if !root.is_dir() {
            root = root
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| SearchError::root_not_found(&self.root))?;
        }
        if let Err(e) = std::fs::read_dir(&root) {
            return Err(SearchError::root_inaccessible(root, e.to_string()));
        }

        Ok(SearchRequest {
            root,
            mode: self.mode,
            query,
            include: self.include,
            exclude: self.exclude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tokenize_plain_words() {
        assert_eq!(tokenize("foo bar  baz").unwrap(), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_tokenize_quoted_terms() {
        assert_eq!(
            tokenize(r#"alpha "beta gamma" delta"#).unwrap(),
            vec!["alpha", "beta gamma", "delta"]
        );
        assert_eq!(
            tokenize(r#""say \"hi\"" 'it''s'"#).unwrap(),
            vec![r#"say "hi""#, "its"]
        );
        assert_eq!(tokenize(r#"pre"fix suf"fix"#).unwrap(), vec!["prefix suffix"]);
    }

    #[test]
    fn test_tokenize_drops_empty_terms() {
        assert_eq!(tokenize(r#"a "" b"#).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        let err = tokenize(r#"foo "bar"#).unwrap_err();
        assert!(matches!(err, SearchError::UnterminatedQuote(_)));
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn test_parse_single_modes_keep_input() {
        let q = Query::parse(SearchMode::ExtendedRegex, "  foo|bar  ").unwrap();
        assert_eq!(q, Query::Single("foo|bar".to_string()));
    }

    #[test]
    fn test_parse_multi_term_needs_two_terms() {
        let q = Query::parse(SearchMode::Or, "foo bar").unwrap();
        assert_eq!(q.terms(), ["foo", "bar"]);

        let err = Query::parse(SearchMode::Or, "foo").unwrap_err();
        assert!(matches!(err, SearchError::TooFewTerms { found: 1, .. }));

        let err = Query::parse(SearchMode::And, r#""foo bar""#).unwrap_err();
        assert!(matches!(err, SearchError::TooFewTerms { found: 1, .. }));
    }

    #[test]
    fn test_parse_empty_query() {
        assert!(matches!(
            Query::parse(SearchMode::Literal, "   "),
            Err(SearchError::EmptyQuery)
        ));
    }

    #[test]
    fn test_raw_requotes_terms() {
        let q = Query::from_terms(
            SearchMode::And,
            vec!["alpha".to_string(), "beta gamma".to_string()],
        )
        .unwrap();
        assert_eq!(q.raw(), r#"alpha "beta gamma""#);
    }

    #[test]
    fn test_builder_substitutes_parent_for_file_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();

        let request = SearchRequest::builder(&file)
            .query(Query::Single("x".to_string()))
            .build()
            .unwrap();
        assert_eq!(request.root(), unify_path(dir.path()));
    }

    #[test]
    fn test_builder_rejects_missing_root() {
        let dir = tempdir().unwrap();
        let err = SearchRequest::builder(dir.path().join("missing"))
            .query(Query::Single("x".to_string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SearchError::RootNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_builder_rejects_unreadable_root() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path().join("locked");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.txt"), "x").unwrap();
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits don't apply to a privileged user
        let listable = std::fs::read_dir(&root).is_ok();
        let result = SearchRequest::builder(&root)
            .query(Query::Single("x".to_string()))
            .build();
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o755)).unwrap();

        if listable {
            assert!(result.is_ok());
        } else {
            assert!(matches!(
                result.unwrap_err(),
                SearchError::RootInaccessible { .. }
            ));
        }
    }

    #[test]
    fn test_builder_revalidates_query_for_mode() {
        let dir = tempdir().unwrap();
        let err = SearchRequest::builder(dir.path())
            .mode(SearchMode::And)
            .query(Query::Single("only".to_string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SearchError::TooFewTerms { .. }));

        let request = SearchRequest::builder(dir.path())
            .mode(SearchMode::Or)
            .query(Query::Single("a b".to_string()))
            .build()
            .unwrap();
        assert_eq!(request.query().terms(), ["a", "b"]);
    }
}
