use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::cancel::CancellationToken;
use crate::errors::SearchResult;
use crate::filters::{FileKind, SearchFilters};

/// Everything one pass over the tree produced
#[derive(Debug, Default, Clone)]
pub struct Traversal {
    /// Files whose text comes from extraction, in traversal order
    pub documents: Vec<PathBuf>,
    /// Files matched on their raw bytes, in traversal order
    pub plain: Vec<PathBuf>,
    /// Every non-pruned file and directory below the root, for the name phase
    pub entries: Vec<PathBuf>,
    /// Entries that could not be read (permissions, symlink loops, races)
    pub unreadable: usize,
}

/// Walks `root` once, depth first.
///
/// Excluded directories are pruned before they are opened. Siblings are visited in
/// file-name order so the same tree always yields the same sequence. Errors on
/// single entries are counted and skipped.
///
/// The root itself is never pruned, even when an exclude glob matches its path.
pub fn walk(
    root: &Path,
    filters: &SearchFilters,
    follow_links: bool,
    cancel: &CancellationToken,
) -> SearchResult<Traversal> {
    let prune = filters.clone();
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .follow_links(follow_links)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| entry.depth() == 0 || !prune.should_prune(entry.path()));

    let mut traversal = Traversal::default();

    for result in builder.build() {
        cancel.check()?;

        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Skipping unreadable entry: {}", err);
                traversal.unreadable += 1;
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            traversal.entries.push(entry.into_path());
        } else if file_type.is_file() {
            let kind = filters.classify(entry.path());
            let path = entry.into_path();
            match kind {
                Some(FileKind::Plain) => traversal.plain.push(path.clone()),
                Some(FileKind::Document) => traversal.documents.push(path.clone()),
                None => trace!("Not included: {}", path.display()),
            }
            traversal.entries.push(path);
        }
    }

    debug!(
        "Traversal of {} found {} plain files, {} documents, {} entries",
        root.display(),
        traversal.plain.len(),
        traversal.documents.len(),
        traversal.entries.len()
    );
    Ok(traversal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn filters(include: &[&str], exclude: &[&str]) -> SearchFilters {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        SearchFilters::new(&include, &exclude).unwrap()
    }

    fn names(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join("app/node_modules/pkg")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("notes.pdf"), "%PDF").unwrap();
        fs::write(root.join("sub/c.md"), "c").unwrap();
        fs::write(root.join("app/node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();
    }

    #[test]
    fn test_walk_splits_documents_and_plain_files() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let t = walk(dir.path(), &filters(&[], &[]), false, &CancellationToken::new()).unwrap();
        assert_eq!(
            names(dir.path(), &t.plain),
            vec![".hidden", "a.txt", "app/node_modules/pkg/index.js", "b.txt", "sub/c.md"]
        );
        assert_eq!(names(dir.path(), &t.documents), vec!["notes.pdf"]);
        assert_eq!(t.unreadable, 0);
    }

    #[test]
    fn test_walk_prunes_excluded_subtrees() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let t = walk(
            dir.path(),
            &filters(&[], &["*/node_modules"]),
            false,
            &CancellationToken::new(),
        )
        .unwrap();
        let entries = names(dir.path(), &t.entries);
        assert!(entries.contains(&"app".to_string()));
        assert!(!entries.iter().any(|e| e.contains("node_modules")));
        assert!(!names(dir.path(), &t.plain).iter().any(|e| e.contains("index.js")));
    }

    #[test]
    fn test_walk_applies_include_to_files_only() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let t = walk(dir.path(), &filters(&["*.md"], &[]), false, &CancellationToken::new())
            .unwrap();
        assert_eq!(names(dir.path(), &t.plain), vec!["sub/c.md"]);
        assert!(t.documents.is_empty());
        // The name phase still sees everything that was not pruned
        assert!(names(dir.path(), &t.entries).contains(&"a.txt".to_string()));

        let t = walk(
            dir.path(),
            &filters(&["*.md", "*.pdf"], &[]),
            false,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(names(dir.path(), &t.documents), vec!["notes.pdf"]);
    }

    #[test]
    fn test_walk_never_prunes_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("node_modules");
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/index.js"), "x").unwrap();

        let t = walk(
            &root,
            &filters(&[], &["*/node_modules"]),
            false,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(names(&root, &t.plain), vec!["pkg/index.js"]);
        assert_eq!(names(&root, &t.entries), vec!["pkg", "pkg/index.js"]);
    }

    #[test]
    fn test_walk_is_deterministic() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let f = filters(&[], &[]);
        let first = walk(dir.path(), &f, false, &CancellationToken::new()).unwrap();
        let second = walk(dir.path(), &f, false, &CancellationToken::new()).unwrap();
        assert_eq!(first.entries, second.entries);
    }

    #[test]
    fn test_walk_stops_when_cancelled() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());

        let token = CancellationToken::new();
        token.cancel();
        assert!(walk(dir.path(), &filters(&[], &[]), false, &token).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_survives_symlink_loop() {
        let dir = tempdir().unwrap();
        build_tree(dir.path());
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

        let t = walk(dir.path(), &filters(&[], &[]), true, &CancellationToken::new()).unwrap();
        assert!(t.unreadable >= 1);
        assert!(names(dir.path(), &t.plain).contains(&"a.txt".to_string()));
    }
}
