//! A thread local storage access micro-benchmark.
//!
//! `tls_probe` measures what it costs to read and write a thread local record in a tight loop. A
//! run allocates a private record for the current thread, adds every integer in
//! `1..`[`ITERATION`] into it, and reports the accumulated value with the elapsed wall clock time
//! in milliseconds. The numbers are meant to be compared with the same loop written in other
//! runtimes, so the timing is deliberately coarse: a single sample, no warm-up, and a millisecond
//! clock.
//!
//! # Examples
//!
//! Running the probe on the current thread:
//! ```
//! use tls_probe::probe::{Probe, EXPECTED_SUM};
//!
//! let report = Probe::new().run().unwrap();
//! assert_eq!(report.value, EXPECTED_SUM);
//! println!("{}", report);
//! ```
//!
//! Using a thread local cell directly:
//! ```
//! use tls_probe::tls_cell::{Error, LOCAL};
//!
//! assert_eq!(LOCAL.read(), Err(Error::Uninitialized { owner: "LOCAL" }));
//! LOCAL.initialize();
//! LOCAL.accumulate(1).unwrap();
//! assert_eq!(LOCAL.read(), Ok(1));
//! ```
//!
//! # Features
//!
//! * `nightly` - stores the cell pointers in `#[thread_local]` statics instead of
//!   `thread_local!`.
//! * `stats` - per thread counters of initializations, failed accesses and timed runs, flushed to
//!   a global [`stats::Stats`] on thread exit.
//!
//! [`ITERATION`]: probe/constant.ITERATION.html

#![cfg_attr(feature = "nightly", feature(thread_local))]
#![warn(macro_use_extern_crate)]
#![warn(missing_debug_implementations)]
#![warn(unused_lifetimes)]
#![cfg_attr(not(test), warn(unused_results))]
#![deny(rust_2018_compatibility)]
#![deny(rust_2018_idioms)]
#![deny(unused_must_use)]

#[macro_use]
mod internal;

pub mod clock;
pub mod probe;
pub mod stats;
pub mod tls_cell;

pub use probe::{Probe, Report, Variant};

/// Installs `env_logger` for the binaries, defaulting to `warn` when `RUST_LOG` is unset.
///
/// Logs go to stderr so stdout only carries the reports.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_micros()
        .try_init();
}
