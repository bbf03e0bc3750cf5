//! Observers of a running walk: progress reporting and warnings.
//!
//! Neither can influence the walk. A reporter sees the scheduler counters, a sink receives
//! human-readable diagnostics; both are free to drop what they are given.

use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Scheduler counters after one inner iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Steps taken inside the current thinning window.
    pub burned: usize,
    pub thinning: usize,
    /// Number of batches emitted so far.
    pub t: usize,
    pub total: usize,
    /// Set on the extra call made right after a batch was stored.
    pub new_batch: bool,
}

pub trait ProgressReporter {
    fn update(&mut self, update: ProgressUpdate);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&mut self, _update: ProgressUpdate) {}
}

/// Two terminal bars: steps in the current thinning window, and emitted batches.
#[derive(Debug)]
pub struct BarProgress {
    _multi: MultiProgress,
    window: ProgressBar,
    batches: ProgressBar,
}

impl BarProgress {
    pub fn new(thinning: usize, total: usize) -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::default_bar()
            .template("{prefix:>10} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        let window = multi.add(ProgressBar::new(thinning as u64));
        window.set_style(style.clone());
        window.set_prefix("thinning");

        let batches = multi.add(ProgressBar::new(total as u64));
        batches.set_style(style);
        batches.set_prefix("samples");

        Self {
            _multi: multi,
            window,
            batches,
        }
    }
}

impl ProgressReporter for BarProgress {
    fn update(&mut self, update: ProgressUpdate) {
        self.window.set_position(update.burned as u64);
        if update.new_batch {
            self.batches.set_position(update.t as u64);
            if update.t >= update.total {
                self.window.finish_and_clear();
                self.batches.finish_with_message("Done!");
            }
        }
    }
}

/// Receives diagnostics raised during a walk.
pub trait WarningSink {
    fn warn(&mut self, message: &str);
}

/// Forwards warnings to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWarnings;

impl WarningSink for LogWarnings {
    fn warn(&mut self, message: &str) {
        log::warn!("{message}");
    }
}

/// Keeps warnings in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectWarnings {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl WarningSink for CollectWarnings {
    fn warn(&mut self, message: &str) {
        // A poisoned buffer still accepts messages.
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push(message.to_string());
    }
}
