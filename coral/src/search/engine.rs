use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use super::cancel::CancellationToken;
use super::matcher::{name_contains, PatternMatcher};
use super::progress::{NoProgress, Phase, ProgressReporter, ProgressSink};
use super::walker::{walk, Traversal};
use crate::cache::PdfTextCache;
use crate::errors::{SearchError, SearchResult};
use crate::filters::SearchFilters;
use crate::query::SearchRequest;
use crate::results::{Match, ResultAggregator, SearchOutput};

/// Runs searches: one traversal, then the content phase, then the name phase.
///
/// The engine owns the document cache and the settings that outlive a single
/// request. Each phase is also callable on its own.
pub struct SearchEngine {
    cache: PdfTextCache,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    thread_count: NonZeroUsize,
    follow_links: bool,
}

impl SearchEngine {
    pub fn new(cache: PdfTextCache) -> Self {
        Self {
            cache,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
            thread_count: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
            follow_links: false,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_thread_count(mut self, thread_count: NonZeroUsize) -> Self {
        self.thread_count = thread_count;
        self
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn cache(&self) -> &PdfTextCache {
        &self.cache
    }

    /// Token that stops this engine's searches when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the whole pipeline for one request
    pub fn search(&self, request: &SearchRequest) -> SearchResult<SearchOutput> {
        let started = Instant::now();
        info!(
            "Starting {} search for '{}' in {}",
            request.mode(),
            request.query().raw(),
            request.root().display()
        );

        let matcher = PatternMatcher::new(request.mode(), request.query().terms())?;
        let filters = SearchFilters::new(request.include(), request.exclude())?;
        self.cancel.check()?;

        let traversal = self.walk_tree(request.root(), &filters)?;

        let mut output = SearchOutput {
            unreadable_entries: traversal.unreadable,
            ..SearchOutput::default()
        };
        if traversal.unreadable > 0 {
            warn!(
                "{} entries under {} could not be read",
                traversal.unreadable,
                request.root().display()
            );
            output.warnings.push(format!(
                "{} entries could not be read and were skipped",
                traversal.unreadable
            ));
        }

        let mut aggregator = ResultAggregator::new();
        self.content_phase(&matcher, &traversal, &mut aggregator, &mut output)?;
        self.name_phase(request, &traversal.entries, &mut aggregator, &mut output)?;

        output.results = aggregator.finish();
        output.elapsed = started.elapsed();
        info!(
            "Search complete. Found {} results in {:?}",
            output.results.len(),
            output.elapsed
        );
        Ok(output)
    }

    /// Walks the tree under `root` with the engine's link setting
    pub fn walk_tree(&self, root: &Path, filters: &SearchFilters) -> SearchResult<Traversal> {
        walk(root, filters, self.follow_links, &self.cancel)
    }

    /// Matches plain files, then documents, adding hits in traversal order.
    ///
    /// Documents are skipped with a warning when the extractor can't run.
    pub fn content_phase(
        &self,
        matcher: &PatternMatcher,
        traversal: &Traversal,
        aggregator: &mut ResultAggregator,
        output: &mut SearchOutput,
    ) -> SearchResult<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.thread_count.get())
            .build()
            .map_err(|e| SearchError::config_error(format!("thread pool: {}", e)))?;

        let reporter = ProgressReporter::new(self.progress.as_ref());

        reporter.begin(Phase::PlainFiles, traversal.plain.len());
        let hits = pool.install(|| {
            self.scan(&traversal.plain, &reporter, |path| {
                read_text(path).is_some_and(|text| matcher.is_match(&text))
            })
        })?;
        output.phases.push(reporter.finish());
        for path in hits {
            aggregator.add(Match::content(path));
        }

        if traversal.documents.is_empty() {
            return Ok(());
        }
        if !self.cache.extractor_available() {
            let name = self.cache.extractor().name();
            warn!(
                "{} not found, skipping {} PDF files",
                name,
                traversal.documents.len()
            );
            output
                .warnings
                .push(format!("{} is not installed. PDF files were not searched.", name));
            output.documents_skipped = true;
            return Ok(());
        }

        reporter.begin(Phase::Documents, traversal.documents.len());
        let hits = pool.install(|| {
            self.scan(&traversal.documents, &reporter, |path| {
                self.cache
                    .get_text(path)
                    .is_some_and(|text| matcher.is_match(&text))
            })
        })?;
        output.phases.push(reporter.finish());
        for path in hits {
            aggregator.add(Match::content(path));
        }
        Ok(())
    }

    /// Matches base names of every visited entry against the raw query.
    ///
    /// Multi-term modes have no name semantics; the phase is skipped for them.
    pub fn name_phase(
        &self,
        request: &SearchRequest,
        entries: &[PathBuf],
        aggregator: &mut ResultAggregator,
        output: &mut SearchOutput,
    ) -> SearchResult<()> {
        if request.mode().is_multi_term() {
            debug!("Name matching does not apply to {} searches", request.mode());
            output.name_phase_skipped = true;
            return Ok(());
        }

        let needle = request.query().raw().to_lowercase();
        let reporter = ProgressReporter::new(self.progress.as_ref());
        reporter.begin(Phase::Names, entries.len());

        for entry in entries {
            self.cancel.check()?;
            let matched = entry
                .file_name()
                .is_some_and(|name| name_contains(&name.to_string_lossy(), &needle));
            // Paths found by content are counted as scanned only
            let added = matched && aggregator.add(Match::name(entry.clone()));
            reporter.record(added);
        }

        output.phases.push(reporter.finish());
        Ok(())
    }

    /// Tests every path on the current pool, returning the hits in input order
    fn scan<F>(
        &self,
        paths: &[PathBuf],
        reporter: &ProgressReporter<'_>,
        test: F,
    ) -> SearchResult<Vec<PathBuf>>
    where
        F: Fn(&Path) -> bool + Sync,
    {
        let outcomes: Vec<bool> = paths
            .par_iter()
            .map(|path| {
                if self.cancel.is_cancelled() {
                    return false;
                }
                let matched = test(path);
                trace!("{} {}", if matched { "match" } else { "no match" }, path.display());
                reporter.record(matched);
                matched
            })
            .collect();
        self.cancel.check()?;

        Ok(paths
            .iter()
            .zip(outcomes)
            .filter_map(|(path, matched)| matched.then(|| path.clone()))
            .collect())
    }
}

/// Reads a plain file as text; bytes that aren't UTF-8 become U+FFFD and never match
fn read_text(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            None
        }
    }
}

/// Searches with the default cache location and no progress reporting
pub fn search(request: &SearchRequest) -> SearchResult<SearchOutput> {
    SearchEngine::new(PdfTextCache::with_defaults()).search(request)
}
