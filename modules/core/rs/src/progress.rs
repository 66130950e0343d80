use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sink for progress reports from long-running operations. Both callbacks
/// return whether the operation should keep running; `false` requests
/// cancellation.
#[allow(unused_variables)]
pub trait Progress {
    fn fraction(&mut self, value: f64) -> bool {
        true
    }

    fn message(&mut self, text: &str) -> bool {
        true
    }
}

/// A sink that ignores all reports and never cancels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Silent;

impl Progress for Silent {}

/// One-way cancellation latch shared between a caller and a running
/// operation. Once raised it stays raised for the rest of the run.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Multiplexes the progress of a sequence of sub-operations onto a single
/// sink. The monitor is created with the total number of work units; each
/// sub-operation runs inside a section sized in those units and reports its
/// own fraction in `[0, 1]`, which the monitor rescales to overall progress.
///
/// A sink returning `false` raises the cancellation token; the flag is
/// latched and observed by whatever operation the monitor is threaded
/// through.
pub struct Monitor<'a> {
    sink: &'a mut dyn Progress,
    token: CancellationToken,
    total: f64,
    completed: f64,
    section: f64,
}

impl<'a> Monitor<'a> {
    pub fn new(sink: &'a mut dyn Progress, token: CancellationToken, total_units: f64) -> Self {
        Self {
            sink,
            token,
            total: total_units.max(1.0),
            completed: 0.0,
            section: 0.0,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Start a sub-operation worth `units` of the total.
    pub fn begin_section(&mut self, units: f64) {
        debug_assert!(self.section == 0.0, "unfinished section");
        self.section = units.max(0.0);
    }

    /// Report the current sub-operation's own fraction. Returns `false` if
    /// cancellation was requested.
    pub fn report(&mut self, child_fraction: f64) -> bool {
        let child = child_fraction.clamp(0.0, 1.0);
        let overall = ((self.completed + child * self.section) / self.total).clamp(0.0, 1.0);
        if !self.sink.fraction(overall) {
            self.token.cancel();
        }
        !self.token.is_cancelled()
    }

    /// Forward a status line. Returns `false` if cancellation was requested.
    pub fn message(&mut self, text: &str) -> bool {
        if !self.sink.message(text) {
            self.token.cancel();
        }
        !self.token.is_cancelled()
    }

    /// Finish the current sub-operation and fold its units into the
    /// completed tally.
    pub fn end_section(&mut self) {
        self.completed += self.section;
        self.section = 0.0;
    }
}
