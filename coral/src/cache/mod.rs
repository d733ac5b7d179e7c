//! Persistent cache of extracted document text.
//!
//! Each entry is a plain UTF-8 file named after the SHA-1 of the document's absolute
//! path and modification time. Touching a document therefore produces a new key and
//! the stale entry is never read again. Entries are written to a temporary file and
//! renamed into place, so concurrent searches never observe a partial entry.
mod extractor;

pub use extractor::{PdfToText, TextExtractor, DEFAULT_EXTRACTOR};

use sha1::{Digest, Sha1};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::errors::{unify_path, SearchError, SearchResult};

/// Cache key derived from a document's identity and version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(path: &Path, mtime_secs: u64) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(mtime_secs.to_string().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Builds the key for a file on disk, or `None` if its mtime can't be read
    pub fn for_file(path: &Path) -> Option<Self> {
        let mtime = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let secs = mtime.duration_since(UNIX_EPOCH).ok()?.as_secs();
        Some(Self::new(path, secs))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Size of the cache directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// Text of previously extracted documents, stored under one directory
pub struct PdfTextCache {
    dir: PathBuf,
    extractor: Box<dyn TextExtractor>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl std::fmt::Debug for PdfTextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfTextCache")
            .field("dir", &self.dir)
            .field("extractor", &self.extractor.name())
            .finish()
    }
}

impl PdfTextCache {
    pub fn new(dir: impl Into<PathBuf>, extractor: Box<dyn TextExtractor>) -> Self {
        Self {
            dir: dir.into(),
            extractor,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Cache in the default location using `pdftotext` from `PATH`
    pub fn with_defaults() -> Self {
        Self::new(Self::default_dir(), Box::new(PdfToText::default()))
    }

    /// `<user cache dir>/coral/pdf-text`, or the same below the temp dir
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("coral")
            .join("pdf-text")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extractor(&self) -> &dyn TextExtractor {
        self.extractor.as_ref()
    }

    pub fn extractor_available(&self) -> bool {
        self.extractor.is_available()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the text of `path`, extracting it only when no entry exists for the
    /// document's current version.
    ///
    /// Extraction failures yield `None` and are not cached, so a later search retries.
    /// A failed write is logged and the extracted text is still returned.
    pub fn get_text(&self, path: &Path) -> Option<String> {
        let path = unify_path(path);
        let Some(key) = CacheKey::for_file(&path) else {
            debug!("No mtime for {}, extracting without cache", path.display());
            return self.extractor.extract(&path);
        };

        let entry = self.dir.join(key.as_str());
        if let Ok(text) = fs::read_to_string(&entry) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(text);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let text = self.extractor.extract(&path)?;
        if let Err(e) = self.store(&entry, &text) {
            warn!("Failed to cache text for {}: {}", path.display(), e);
        }
        Some(text)
    }

    fn store(&self, entry: &Path, text: &str) -> SearchResult<()> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(entry)
            .map_err(|e| SearchError::cache_error(e.to_string()))?;
        Ok(())
    }

    /// Counts entries and their total size. A missing directory is an empty cache.
    pub fn stats(&self) -> SearchResult<CacheStats> {
        let mut stats = CacheStats::default();
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(e.into()),
        };
        for entry in read_dir.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if meta.is_file() {
                stats.entries += 1;
                stats.bytes += meta.len();
            }
        }
        Ok(stats)
    }

    /// Deletes every entry and returns how many were removed
    pub fn clear(&self) -> SearchResult<usize> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!("Removed {} cache entries from {}", removed, self.dir.display());
        Ok(removed)
    }
}
