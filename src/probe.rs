//! The timed accumulation probe.
//!
//! A run initializes a thread local cell on the current thread, adds every integer in
//! `1..ITERATION` into it, and reports the final value along with the elapsed wall clock time.

use crate::{
    clock::{Clock, SystemClock, Timestamp},
    stats,
    tls_cell::{Error, Record, EXTERNAL, LOCAL},
};
use core::{
    cell::Cell,
    convert::Infallible,
    fmt::{self, Display, Formatter},
};
use std::hint::black_box;

/// Exclusive upper bound of the accumulation loop. A run performs `ITERATION - 1` additions.
pub const ITERATION: i64 = 5_000_000;

/// The value every run reports: `1 + 2 + ... + (ITERATION - 1)`.
pub const EXPECTED_SUM: i64 = (ITERATION - 1) * ITERATION / 2;

/// The thread local access path measured by a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Direct accumulation into [`LOCAL`].
    C,

    /// Accumulation into [`EXTERNAL`], fetching the record through its accessor every iteration.
    RustC,

    /// Accumulation into a plain `thread_local!` `Cell`.
    Rust,
}

impl Variant {
    /// Every variant, in the order `compare` runs them.
    pub const ALL: [Variant; 3] = [Variant::C, Variant::RustC, Variant::Rust];

    /// The label printed in front of each report line.
    pub fn label(self) -> &'static str {
        match self {
            Variant::C => "C",
            Variant::RustC => "Rust_C",
            Variant::Rust => "RUST",
        }
    }
}

/// The outcome of a single timed run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub variant:       Variant,
    pub value:         i64,
    pub duration_msec: i32,
}

impl Display for Report {
    /// Two lines, without a trailing newline:
    ///
    /// ```text
    /// C: 12499997500000
    /// C: 12 msec
    /// ```
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = self.variant.label();
        write!(
            f,
            "{}: {}\n{}: {} msec",
            label, self.value, label, self.duration_msec
        )
    }
}

/// Runs the timed accumulation loop against a [`Clock`].
#[derive(Debug, Default)]
pub struct Probe<C = SystemClock> {
    clock: C,
}

impl Probe<SystemClock> {
    /// A probe timed by the host's wall clock.
    #[inline]
    pub fn new() -> Self {
        Probe { clock: SystemClock }
    }
}

impl<C: Clock> Probe<C> {
    #[inline]
    pub fn with_clock(clock: C) -> Self {
        Probe { clock }
    }

    /// Runs one variant.
    pub fn run_variant(&self, variant: Variant) -> Result<Report, Error> {
        match variant {
            Variant::C => self.run(),
            Variant::RustC => self.run_external(),
            Variant::Rust => Ok(self.run_std()),
        }
    }

    /// Initializes [`LOCAL`] on the current thread and times accumulating into it.
    ///
    /// # Examples
    ///
    /// ```
    /// use tls_probe::probe::{Probe, EXPECTED_SUM};
    ///
    /// let report = Probe::new().run().unwrap();
    /// assert_eq!(report.value, EXPECTED_SUM);
    /// ```
    pub fn run(&self) -> Result<Report, Error> {
        LOCAL.initialize();

        self.timed(Variant::C, || -> Result<i64, Error> {
            for i in 1..ITERATION {
                LOCAL.accumulate(i)?;
            }
            LOCAL.read()
        })
    }

    /// Initializes [`EXTERNAL`] on the current thread and times accumulating into it, going
    /// through [`EXTERNAL.record()`](EXTERNAL::record) for both the read and the write of every
    /// iteration.
    pub fn run_external(&self) -> Result<Report, Error> {
        EXTERNAL.initialize();

        self.timed(Variant::RustC, || -> Result<i64, Error> {
            for i in 1..ITERATION {
                // the record is owned by this thread and nothing else borrows it during the loop
                unsafe {
                    let i0 = (*EXTERNAL.record()?.as_ptr()).i;
                    (*EXTERNAL.record()?.as_ptr()).i = i0.wrapping_add(i);
                    let _ = black_box(i0);
                }
            }
            EXTERNAL.read()
        })
    }

    /// Times accumulating into a plain `thread_local!` `Cell`, reset to zero first.
    pub fn run_std(&self) -> Report {
        thread_local! {
            static STD_THREAD_LOCAL: Cell<Record> = Cell::new(Record::default());
        }

        STD_THREAD_LOCAL.with(|x| x.set(Record::default()));

        let timed = self.timed(Variant::Rust, || -> Result<i64, Infallible> {
            for i in 1..ITERATION {
                STD_THREAD_LOCAL.with(|x| {
                    let i0 = x.get().i;
                    x.set(Record {
                        i: i0.wrapping_add(i),
                    });
                    let _ = black_box(i0);
                });
            }
            Ok(STD_THREAD_LOCAL.with(|x| x.get().i))
        });

        match timed {
            Ok(report) => report,
            Err(never) => match never {},
        }
    }

    #[inline]
    fn timed<E, F: FnOnce() -> Result<i64, E>>(
        &self,
        variant: Variant,
        body: F,
    ) -> Result<Report, E> {
        log::trace!("starting `{}` run", variant.label());

        let start = self.clock.now();
        let value = body()?;
        let end = self.clock.now();

        let duration_msec = Timestamp::elapsed_msec(start, end);
        stats::timed_run((ITERATION - 1) as u64, duration_msec);
        log::debug!(
            "`{}` run finished: start {:?}, end {:?}, {} msec",
            variant.label(),
            start,
            end,
            duration_msec
        );

        Ok(Report {
            variant,
            value,
            duration_msec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Probe, Report, Variant, EXPECTED_SUM, ITERATION};
    use crate::clock::{Clock, Timestamp};
    use core::cell::Cell;
    use crossbeam_utils::thread;

    /// Hands out `start`, then `end`, then `end` forever.
    struct FixedClock {
        start: Timestamp,
        end:   Timestamp,
        calls: Cell<usize>,
    }

    impl FixedClock {
        fn new(start: Timestamp, end: Timestamp) -> Self {
            FixedClock {
                start,
                end,
                calls: Cell::new(0),
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            let calls = self.calls.get();
            self.calls.set(calls + 1);
            if calls == 0 {
                self.start
            } else {
                self.end
            }
        }
    }

    #[test]
    fn expected_sum() {
        assert_eq!(EXPECTED_SUM, 12_499_997_500_000);
        assert_eq!((1..ITERATION).sum::<i64>(), EXPECTED_SUM);
    }

    #[test]
    fn run_sum() {
        let report = Probe::new().run().unwrap();
        assert_eq!(report.variant, Variant::C);
        assert_eq!(report.value, 12_499_997_500_000);
        assert!(report.duration_msec >= 0);
    }

    #[test]
    fn run_twice_on_one_thread() {
        let probe = Probe::new();
        assert_eq!(probe.run().unwrap().value, EXPECTED_SUM);
        assert_eq!(probe.run().unwrap().value, EXPECTED_SUM);
    }

    #[test]
    fn mocked_duration() {
        let clock = FixedClock::new(Timestamp::new(10, 500_000), Timestamp::new(11, 800_000));
        let report = Probe::with_clock(&clock).run().unwrap();
        assert_eq!(report.duration_msec, 1300);
        assert_eq!(clock.calls.get(), 2);
    }

    #[test]
    fn mocked_duration_across_second_boundary() {
        let clock = FixedClock::new(Timestamp::new(10, 999_999), Timestamp::new(12, 0));
        let report = Probe::with_clock(clock).run().unwrap();
        assert_eq!(report.duration_msec, 1000);
    }

    #[test]
    fn variants_agree() {
        thread::scope(|s| {
            s.spawn(|_| {
                let clock = FixedClock::new(Timestamp::new(0, 0), Timestamp::new(0, 0));
                let probe = Probe::with_clock(&clock);
                for &variant in Variant::ALL.iter() {
                    clock.calls.set(0);
                    let report = probe.run_variant(variant).unwrap();
                    assert_eq!(report.variant, variant);
                    assert_eq!(report.value, EXPECTED_SUM);
                    assert_eq!(report.duration_msec, 0);
                }
            });
        })
        .unwrap();
    }

    #[test]
    fn isolated_threads() {
        const THREAD_COUNT: usize = 4;
        thread::scope(|s| {
            let handles: Vec<_> = (0..THREAD_COUNT)
                .map(|i| {
                    s.builder()
                        .name(format!("probe#{}", i))
                        .spawn(|_| Probe::new().run().unwrap().value)
                        .unwrap()
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), EXPECTED_SUM);
            }
        })
        .unwrap();
    }

    #[test]
    fn report_format() {
        let report = Report {
            variant:       Variant::C,
            value:         EXPECTED_SUM,
            duration_msec: 17,
        };
        assert_eq!(report.to_string(), "C: 12499997500000\nC: 17 msec");

        let report = Report {
            variant:       Variant::RustC,
            value:         -3,
            duration_msec: -1,
        };
        assert_eq!(report.to_string(), "Rust_C: -3\nRust_C: -1 msec");
    }
}
