use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};

/// Cooperative cancellation flag shared between a caller and a running search.
///
/// The engine checks it between files in every phase. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns `Err(SearchError::Cancelled)` once the token has been cancelled
    pub fn check(&self) -> SearchResult<()> {
        if self.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
