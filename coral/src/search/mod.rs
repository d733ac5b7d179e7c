//! The search pipeline.
//!
//! A search makes one pass over the tree ([`walker`]), then runs two phases in order:
//!
//! 1. **Content**: every plain file is read and tested with the [`PatternMatcher`];
//!    documents are tested on their extracted text from the cache. Files are processed
//!    on a rayon pool, but hits are kept in traversal order.
//! 2. **Names**: the base name of every visited file and directory is tested for the
//!    raw query as a case-insensitive substring. Multi-term modes skip this phase.
//!
//! Both phases report to a [`ProgressSink`] and stop at the next file once their
//! [`CancellationToken`] is cancelled.
pub mod cancel;
pub mod engine;
pub mod matcher;
pub mod progress;
pub mod walker;

pub use cancel::CancellationToken;
pub use engine::{search, SearchEngine};
pub use matcher::PatternMatcher;
pub use progress::{
    ChannelProgress, NoProgress, Phase, ProgressEvent, ProgressReporter, ProgressSink,
    ProgressSnapshot,
};
pub use walker::{walk, Traversal};
