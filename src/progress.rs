/**
 * Progress reporting, called by the processor after every file
 */

use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;

pub trait ProgressReporter {
    /// `current` is 1-based, `total` is the number of enumerated files
    fn advance(&self, current: usize, total: usize);

    fn finish(&self) {}
}

/// Terminal progress bar
pub struct BarReporter {
    pb: ProgressBar,
}

impl BarReporter {
    pub fn new(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1} files/s) ETA: {eta} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("Sorting files");
        Self { pb }
    }
}

impl ProgressReporter for BarReporter {
    fn advance(&self, current: usize, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(current as u64);
    }

    fn finish(&self) {
        self.pb.finish_with_message("Sorting complete");
    }
}

pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn advance(&self, _current: usize, _total: usize) {}
}

/// Keeps every call, for tests and callers that render progress themselves
#[derive(Default)]
pub struct RecordingReporter {
    calls: RefCell<Vec<(usize, usize)>>,
}

impl RecordingReporter {
    pub fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.borrow().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn advance(&self, current: usize, total: usize) {
        self.calls.borrow_mut().push((current, total));
    }
}
