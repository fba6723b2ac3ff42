//! Explicitly initialized thread local cells, [`LOCAL`] and [`EXTERNAL`].
//!
//! Every thread gets its own private [`Record`] per cell. A cell is empty until
//! [`initialize`](LOCAL::initialize) is called on the thread, and reading or accumulating into an
//! empty cell returns [`Error::Uninitialized`].
//!
//! # Examples
//!
//! ```
//! use tls_probe::tls_cell::LOCAL;
//!
//! assert!(LOCAL.read().is_err());
//!
//! LOCAL.initialize();
//! LOCAL.accumulate(40).unwrap();
//! LOCAL.accumulate(2).unwrap();
//! assert_eq!(LOCAL.read().unwrap(), 42);
//! ```

use crate::internal::tls_slot::CellRecord;
use thiserror::Error;

/// The per thread record stored in a cell.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Record {
    pub i: i64,
}

impl CellRecord for Record {
    #[inline]
    fn accumulate(&mut self, value: i64) {
        self.i = self.i.wrapping_add(value)
    }

    #[inline]
    fn value(&self) -> i64 {
        self.i
    }
}

/// Error type for accesses to a cell that has no record on the current thread.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The cell was read or written before `initialize` was called on this thread.
    #[error("thread local `{owner}` accessed before it was initialized")]
    Uninitialized { owner: &'static str },

    /// The cell was accessed after this thread started tearing down its thread locals.
    #[error("thread local `{owner}` accessed after it was destroyed")]
    Destroyed { owner: &'static str },
}

tls_cell! {
    /// The cell driven by the probe on the thread that runs it.
    pub static LOCAL: Record;

    /// A second cell, allocated independently of [`LOCAL`], for callers outside of the probe.
    pub static EXTERNAL: Record;
}
