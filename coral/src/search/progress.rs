//! Per-phase progress counters.
//!
//! The engine drives a [`ProgressReporter`], which keeps a (scanned, matched) pair for
//! the current phase and forwards every change to a [`ProgressSink`]. Updates are
//! serialized, so a sink observes counters that never decrease within a phase even
//! when files finish on several threads. Counters start from zero at each phase.
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

/// Stages of a search that report progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Content matching over plain files
    PlainFiles,
    /// Content matching over extracted document text
    Documents,
    /// Base-name matching over every visited entry
    Names,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PlainFiles => write!(f, "Files"),
            Phase::Documents => write!(f, "PDF files"),
            Phase::Names => write!(f, "Names"),
        }
    }
}

/// Counters for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub scanned: usize,
    pub matched: usize,
}

/// Receives progress from a running search
pub trait ProgressSink: Send + Sync {
    /// A phase is about to process `total` items
    fn phase_started(&self, _phase: Phase, _total: usize) {}

    /// Counters changed; called once per processed item
    fn update(&self, phase: Phase, snapshot: ProgressSnapshot);

    /// A phase completed with the given final counters
    fn phase_finished(&self, _phase: Phase, _snapshot: ProgressSnapshot) {}
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _phase: Phase, _snapshot: ProgressSnapshot) {}
}

/// Progress notification sent through a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { phase: Phase, total: usize },
    Updated { phase: Phase, snapshot: ProgressSnapshot },
    Finished { phase: Phase, snapshot: ProgressSnapshot },
}

/// Forwards progress as [`ProgressEvent`]s. A dropped receiver is ignored.
#[derive(Debug)]
pub struct ChannelProgress {
    tx: Mutex<Sender<ProgressEvent>>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    fn send(&self, event: ProgressEvent) {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let _ = tx.send(event);
    }
}

impl ProgressSink for ChannelProgress {
    fn phase_started(&self, phase: Phase, total: usize) {
        self.send(ProgressEvent::Started { phase, total });
    }

    fn update(&self, phase: Phase, snapshot: ProgressSnapshot) {
        self.send(ProgressEvent::Updated { phase, snapshot });
    }

    fn phase_finished(&self, phase: Phase, snapshot: ProgressSnapshot) {
        self.send(ProgressEvent::Finished { phase, snapshot });
    }
}

#[derive(Debug)]
struct PhaseState {
    phase: Phase,
    snapshot: ProgressSnapshot,
}

/// Counts work for the current phase and reports it to a sink
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    state: Mutex<PhaseState>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            state: Mutex::new(PhaseState {
                phase: Phase::PlainFiles,
                snapshot: ProgressSnapshot::default(),
            }),
        }
    }

    /// Starts a phase, resetting the counters
    pub fn begin(&self, phase: Phase, total: usize) {
        let mut state = self.lock();
        state.phase = phase;
        state.snapshot = ProgressSnapshot::default();
        self.sink.phase_started(phase, total);
    }

    /// Records one processed item
    pub fn record(&self, matched: bool) {
        let mut state = self.lock();
        state.snapshot.scanned += 1;
        if matched {
            state.snapshot.matched += 1;
        }
        self.sink.update(state.phase, state.snapshot);
    }

    /// Ends the current phase and returns its final counters
    pub fn finish(&self) -> (Phase, ProgressSnapshot) {
        let state = self.lock();
        self.sink.phase_finished(state.phase, state.snapshot);
        (state.phase, state.snapshot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PhaseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::mpsc;

    #[test]
    fn test_counters_reset_between_phases() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelProgress::new(tx);
        let reporter = ProgressReporter::new(&sink);

        reporter.begin(Phase::PlainFiles, 2);
        reporter.record(true);
        reporter.record(false);
        assert_eq!(
            reporter.finish(),
            (Phase::PlainFiles, ProgressSnapshot { scanned: 2, matched: 1 })
        );

        reporter.begin(Phase::Names, 1);
        reporter.record(false);
        reporter.finish();
        drop(reporter);
        drop(sink);

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(
            events.first(),
            Some(&ProgressEvent::Started { phase: Phase::PlainFiles, total: 2 })
        );
        assert!(events.contains(&ProgressEvent::Updated {
            phase: Phase::Names,
            snapshot: ProgressSnapshot { scanned: 1, matched: 0 },
        }));
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Finished {
                phase: Phase::Names,
                snapshot: ProgressSnapshot { scanned: 1, matched: 0 },
            })
        );
    }

    #[test]
    fn test_updates_are_monotonic_under_parallel_recording() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelProgress::new(tx);
        let reporter = ProgressReporter::new(&sink);

        reporter.begin(Phase::PlainFiles, 500);
        (0..500).into_par_iter().for_each(|i| reporter.record(i % 3 == 0));
        reporter.finish();
        drop(reporter);
        drop(sink);

        let mut last = ProgressSnapshot::default();
        for event in rx.iter() {
            if let ProgressEvent::Updated { snapshot, .. } = event {
                assert!(snapshot.scanned > last.scanned);
                assert!(snapshot.matched >= last.matched);
                last = snapshot;
            }
        }
        assert_eq!(last, ProgressSnapshot { scanned: 500, matched: 167 });
    }
}
