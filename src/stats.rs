//! Statistics collection. Enabled with `--features stats`.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::{
    cell::RefCell,
    fmt::{self, Debug, Formatter},
    ops::{Deref, DerefMut},
};

/// Running count and sum of a per run quantity.
#[doc(hidden)]
#[derive(Copy, Clone, Default, Debug)]
pub struct Size {
    count: u64,
    total: u64,
}

impl Size {
    fn record(&mut self, size: u64) {
        self.count += 1;
        self.total += size;
    }

    fn merge(&mut self, rhs: &Self) {
        self.count += rhs.count;
        self.total += rhs.total;
    }

    /// Number of recorded samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of all recorded samples.
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[doc(hidden)]
#[derive(Default, Debug)]
pub struct Event {
    count: u64,
}

impl Event {
    fn happened(&mut self) {
        self.count += 1
    }

    fn merge(&mut self, rhs: &Self) {
        self.count += rhs.count
    }

    /// Number of times the event happened.
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// A collection of probe statistics.
#[derive(Default, Debug)]
pub struct Stats {
    /// Thread local records allocated by `initialize`.
    pub initializations: Event,

    /// Reads or writes of a cell that had no record on the current thread.
    pub failed_accesses: Event,

    /// Number of accumulations per timed run.
    pub accumulations: Size,

    /// Reported duration in milliseconds per timed run. Negative durations are recorded as 0.
    pub duration_msec: Size,
}

impl Stats {
    fn merge(&mut self, rhs: &Self) {
        self.initializations.merge(&rhs.initializations);
        self.failed_accesses.merge(&rhs.failed_accesses);
        self.accumulations.merge(&rhs.accumulations);
        self.duration_msec.merge(&rhs.duration_msec);
    }

    /// Prints a summary of the stats object.
    pub fn print_summary(&self) {
        println!("{:#?}", self);

        let runs = self.duration_msec.count;
        println!(
            "{:>12}: {:>12} {:>9}: {:.4} {:>13}: {:.4}",
            "runs",
            runs,
            "msec avg",
            self.duration_msec.total() as f64 / runs as f64,
            "ns per access",
            self.duration_msec.total() as f64 * 1_000_000.0 / self.accumulations.total() as f64
        );
    }
}

/// Thread local statistics.
///
/// To reduce overhead of stats tracking, each thread has it's own `Stats` object which is flushed
/// to the global `Stats` object on thread exit or when manually requested.
#[derive(Default)]
pub struct ThreadStats(RefCell<Stats>);

impl Debug for ThreadStats {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.pad("ThreadStats { .. }")
    }
}

impl Drop for ThreadStats {
    fn drop(&mut self) {
        self.flush()
    }
}

impl ThreadStats {
    /// Returns the actual statistics object.
    pub fn get<'a>(&'a self) -> impl DerefMut<Target = Stats> + 'a {
        self.0.borrow_mut()
    }

    /// Flushes the thread stats to the global thread stats object.
    ///
    /// After flushing, `self` is reset.
    pub fn flush(&self) {
        let mut borrow = self.get();
        GLOBAL.lock().merge(&*borrow);
        *borrow = Default::default()
    }
}

thread_local! {
    static THREAD_STAT: ThreadStats = {
        // initialize global now, else we may get panics on drop because lazy_static uses
        // thread_locals to initialize it.
        lazy_static::initialize(&GLOBAL);
        ThreadStats::default()
    };
}

lazy_static! {
    static ref GLOBAL: Mutex<Stats> = Mutex::default();
}

#[inline]
fn with_thread_stats<F: FnOnce(&mut Stats)>(f: F) {
    if cfg!(feature = "stats") {
        // stats recorded while the thread is exiting are dropped
        let _ = THREAD_STAT.try_with(|stats| f(&mut *stats.get()));
    }
}

#[inline]
pub(crate) fn initialized() {
    with_thread_stats(|stats| stats.initializations.happened())
}

#[inline]
pub(crate) fn failed_access() {
    with_thread_stats(|stats| stats.failed_accesses.happened())
}

#[inline]
pub(crate) fn timed_run(accumulations: u64, duration_msec: i32) {
    with_thread_stats(|stats| {
        stats.accumulations.record(accumulations);
        stats.duration_msec.record(duration_msec.max(0) as u64);
    })
}

/// Returns the global stats object, or None if the feature is disabled.
pub fn stats() -> Option<impl Deref<Target = Stats>> {
    if cfg!(feature = "stats") {
        Some(GLOBAL.lock())
    } else {
        None
    }
}

/// Runs `f` over the current thread's stats that have not been flushed yet, or returns None if the
/// feature is disabled or the thread is exiting.
pub fn thread_stats<F: FnOnce(&Stats) -> O, O>(f: F) -> Option<O> {
    if cfg!(feature = "stats") {
        THREAD_STAT.try_with(|stats| f(&*stats.get())).ok()
    } else {
        None
    }
}

/// Flushes the current thread's stats into the global stats object.
pub fn thread_flush() {
    if cfg!(feature = "stats") {
        let _ = THREAD_STAT.try_with(ThreadStats::flush);
    }
}

/// Prints a summary of the global stats object.
///
/// It may be necessary to run `stats::thread_flush()` first.
pub fn print_stats() {
    match self::stats() {
        Some(stats) => stats.print_summary(),
        None => println!("`tls-probe/stats` feature is not enabled"),
    }
}
