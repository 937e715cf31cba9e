//! Progress reporting
//!
//! The pipeline reports the task total once, then one step per completed
//! task in completion order. Reporters are called from the dispatch loop
//! only, never from workers.

use indicatif::{ProgressBar, ProgressStyle};

/// Receives pipeline progress
pub trait ProgressReporter: Send + Sync {
    /// Number of tasks about to run
    fn start(&self, total: u64);

    /// `delta` more tasks finished
    fn advance(&self, delta: u64);

    /// The pipeline returned
    fn finish(&self);
}

/// Reporter that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn start(&self, _total: u64) {}

    fn advance(&self, _delta: u64) {}

    fn finish(&self) {}
}

/// Terminal progress bar
#[derive(Clone)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Bar labelled with `message`, typically the collection code
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(message.into());
        Self { bar }
    }
}

impl ProgressReporter for BarProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn advance(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
