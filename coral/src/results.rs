//! Search hits and their de-duplicated, ordered collection.
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::progress::{Phase, ProgressSnapshot};

/// Which phase produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOrigin {
    Content,
    Name,
}

/// A single hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Absolute path of the matching file or directory
    pub path: PathBuf,
    pub origin: MatchOrigin,
}

impl Match {
    pub fn content(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: MatchOrigin::Content,
        }
    }

    pub fn name(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: MatchOrigin::Name,
        }
    }
}

/// Collects hits from all phases, keeping the first occurrence of each path
#[derive(Debug, Default)]
pub struct ResultAggregator {
    seen: HashSet<PathBuf>,
    entries: Vec<Match>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hit. Returns `false` if its path was already present, in which case
    /// the earlier origin is kept.
    pub fn add(&mut self, hit: Match) -> bool {
        if !self.seen.insert(hit.path.clone()) {
            return false;
        }
        self.entries.push(hit);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> ResultSet {
        ResultSet {
            matches: self.entries,
        }
    }
}

/// Final ordered list of distinct hits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    matches: Vec<Match>,
}

impl ResultSet {
    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.matches.iter().map(|m| m.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn by_origin(&self, origin: MatchOrigin) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(move |m| m.origin == origin)
    }

    /// Newline-delimited absolute paths, one per hit, with a trailing newline
    pub fn to_list_string(&self) -> String {
        let mut out = String::new();
        for path in self.paths() {
            out.push_str(&path.to_string_lossy());
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Everything a completed search produced
#[derive(Debug, Clone, Default)]
pub struct SearchOutput {
    pub results: ResultSet,
    /// Environment problems that degraded the search without stopping it
    pub warnings: Vec<String>,
    /// Final counters of every phase that ran, in order
    pub phases: Vec<(Phase, ProgressSnapshot)>,
    /// Documents were not searched because no extractor was available
    pub documents_skipped: bool,
    /// The name phase does not apply to multi-term modes
    pub name_phase_skipped: bool,
    /// Entries the traversal could not read
    pub unreadable_entries: usize,
    pub elapsed: Duration,
}

impl SearchOutput {
    pub fn phase(&self, phase: Phase) -> Option<ProgressSnapshot> {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, snapshot)| *snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_origin_wins() {
        let mut agg = ResultAggregator::new();
        assert!(agg.add(Match::content("/data/report.txt")));
        assert!(!agg.add(Match::name("/data/report.txt")));
        assert!(agg.add(Match::name("/data/reports")));
        assert!(agg.contains(Path::new("/data/report.txt")));
        assert_eq!(agg.len(), 2);

        let set = agg.finish();
        let origins: Vec<_> = set.iter().map(|m| m.origin).collect();
        assert_eq!(origins, vec![MatchOrigin::Content, MatchOrigin::Name]);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut agg = ResultAggregator::new();
        for p in ["/r/z.txt", "/r/a.txt", "/r/m.pdf"] {
            agg.add(Match::content(p));
        }
        let set = agg.finish();
        assert_eq!(set.to_list_string(), "/r/z.txt\n/r/a.txt\n/r/m.pdf\n");
        assert_eq!(set.by_origin(MatchOrigin::Name).count(), 0);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut agg = ResultAggregator::new();
        agg.add(Match::name("/r/notes"));
        let json = serde_json::to_string(&agg.finish()).unwrap();
        assert_eq!(json, r#"[{"path":"/r/notes","origin":"name"}]"#);
    }

    #[test]
    fn test_empty_set() {
        let set = ResultAggregator::new().finish();
        assert!(set.is_empty());
        assert_eq!(set.to_list_string(), "");
    }
}
