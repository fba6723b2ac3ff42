//! Coarse wall clock readings.

use std::time::{SystemTime, UNIX_EPOCH};

/// A wall clock reading split into whole seconds and microseconds, like a `timeval`.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs:   i64,
    pub micros: i64,
}

impl Timestamp {
    #[inline]
    pub const fn new(secs: i64, micros: i64) -> Self {
        Timestamp { secs, micros }
    }

    /// Milliseconds between `start` and `end`.
    ///
    /// The seconds and microseconds are differenced separately, the microsecond term is divided
    /// in floating point, and the sum is truncated to an `i32`. This keeps results comparable
    /// with measurements taken the same way in other runtimes, but it is not always the true
    /// elapsed time rounded down.
    ///
    /// # Examples
    ///
    /// ```
    /// use tls_probe::clock::Timestamp;
    ///
    /// let start = Timestamp::new(10, 500_000);
    /// let end = Timestamp::new(11, 800_000);
    /// assert_eq!(Timestamp::elapsed_msec(start, end), 1300);
    /// ```
    #[inline]
    pub fn elapsed_msec(start: Timestamp, end: Timestamp) -> i32 {
        ((end.micros - start.micros) as f64 / 1000.0 + (end.secs - start.secs) as f64 * 1000.0)
            as i32
    }
}

/// A source of wall clock readings.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// The host's real time clock.
#[derive(Copy, Clone, Default, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Timestamp {
        // clocks set before 1970 read as negative seconds
        let (secs, micros) = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => (since.as_secs() as i64, i64::from(since.subsec_micros())),
            Err(before) => {
                let before = before.duration();
                (-(before.as_secs() as i64), -i64::from(before.subsec_micros()))
            }
        };
        Timestamp { secs, micros }
    }
}
