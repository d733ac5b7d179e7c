use coral::search::{Phase, ProgressSink, ProgressSnapshot};
use indicatif::{ProgressBar, ProgressStyle};

/// Draws the running phase on stderr and prints a summary line when it ends
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{prefix:>9} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} | {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn phase_started(&self, phase: Phase, total: usize) {
        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_prefix(phase.to_string());
        self.bar.set_message("0 matches");
    }

    fn update(&self, _phase: Phase, snapshot: ProgressSnapshot) {
        self.bar.set_position(snapshot.scanned as u64);
        self.bar.set_message(format!("{} matches", snapshot.matched));
    }

    fn phase_finished(&self, phase: Phase, snapshot: ProgressSnapshot) {
        self.bar.println(format!(
            "{} searched: {} | Matches found: {}",
            phase, snapshot.scanned, snapshot.matched
        ));
    }
}
