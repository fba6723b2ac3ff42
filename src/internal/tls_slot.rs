//! Utilities for creating explicitly initialized thread locals.
//!
//! `tls_cell` combines everything in this module to create a `thread_local!` style variable that
//! starts out empty on every thread. Storage is only allocated by `initialize`, and any access
//! before that is reported as an error instead of touching a dangling record.
//!
//! Each cell is split in two. A plain pointer slot (`Cell<Option<NonNull<T>>>`) is what the hot
//! path reads, and a lazily created `Owner` holds the allocation and frees it on thread exit. The
//! owner clears the pointer slot before freeing, so a destroyed record is never observable.

use core::{cell::Cell, ptr::NonNull};

/// Types that can be stored in a `tls_cell`.
///
/// A `Self` lives at the address handed out by `initialize` until the owning thread exits, or the
/// cell is initialized again.
pub trait CellRecord: Default + 'static {
    /// Adds `value` into the record.
    fn accumulate(&mut self, value: i64);

    /// The current accumulated value.
    fn value(&self) -> i64;
}

/// Owns the record of a single thread local cell.
#[derive(Debug)]
pub struct Owner<T: CellRecord> {
    record:     Cell<Option<NonNull<T>>>,
    name:       &'static str,
    clear_slot: fn(),
}

impl<T: CellRecord> Owner<T> {
    #[inline(never)]
    #[cold]
    pub fn new(name: &'static str, clear_slot: fn()) -> Self {
        Owner {
            record: Cell::new(None),
            name,
            clear_slot,
        }
    }

    /// Stores `record` as the current allocation, freeing the previous one (if any).
    #[inline(never)]
    #[cold]
    pub fn replace(&self, record: NonNull<T>) {
        let old = self.record.replace(Some(record));
        if unlikely!(old.is_some()) {
            log::debug!("reinitializing thread local `{}`", self.name);
        }
        if let Some(old) = old {
            // the owner is the only holder of the allocation, and the pointer slot is overwritten
            // by the caller before it is read again
            unsafe { free(old) }
        }
    }
}

impl<T: CellRecord> Drop for Owner<T> {
    fn drop(&mut self) {
        // Must clear out the cached pointer before freeing; otherwise, other thread local
        // destructors running after this one could read a dangling record.
        (self.clear_slot)();

        if let Some(record) = self.record.take() {
            log::debug!("freeing thread local `{}`", self.name);
            unsafe { free(record) }
        }
    }
}

/// Allocates a default initialized `T`.
///
/// Allocation failure aborts the process through the global allocator's error handler.
#[inline(never)]
#[cold]
pub fn alloc<T: CellRecord>() -> NonNull<T> {
    let raw = Box::into_raw(Box::new(T::default()));
    unsafe { NonNull::new_unchecked(raw) }
}

/// Frees a record created by `alloc`.
#[inline]
pub unsafe fn free<T: CellRecord>(record: NonNull<T>) {
    drop(Box::from_raw(record.as_ptr()))
}

macro_rules! tls_cell {
    // empty (base case for the recursion)
    () => {};

    // process multiple declarations
    ($(#[$attr:meta])* $vis:vis static $name:ident: $t:ty; $($rest:tt)*) => (
        tls_cell!{
            $(#[$attr])* $vis static $name: $t
        }
        tls_cell!($($rest)*);
    );

    // handle a single declaration
    ($(#[$attr:meta])* $vis:vis static $name:ident: $t:ty) => (
        $(#[$attr])*
        #[allow(non_camel_case_types)]
        #[derive(Copy, Clone, Debug)]
        $vis struct $name;

        impl $name {
            /// The owner identifier of this cell, used in errors and logs.
            pub const NAME: &'static str = stringify!($name);

            /// Allocates storage for the calling thread's private record.
            ///
            /// Initializing an already initialized cell replaces the record with a fresh default
            /// one.
            #[inline(never)]
            #[cold]
            $vis fn initialize(self) {
                let record = $crate::internal::tls_slot::alloc::<$t>();
                let owned = Self::owner(|owner| owner.replace(record)).is_ok();
                if likely!(owned) {
                    Self::slot(|x| x.set(Some(record)));
                    log::debug!("initialized thread local `{}`", Self::NAME);
                    $crate::stats::initialized();
                } else {
                    log::warn!(
                        "thread local `{}` initialized while its thread is exiting",
                        Self::NAME
                    );
                    unsafe { $crate::internal::tls_slot::free(record) }
                }
            }

            /// Returns whether `initialize` has been called on the current thread.
            #[inline]
            $vis fn is_initialized(self) -> bool {
                Self::slot(|x| x.get().is_some())
            }

            /// Adds `value` into the current thread's record.
            ///
            /// # Errors
            ///
            /// Returns [`Error::Uninitialized`] if `initialize` has not been called on this
            /// thread.
            ///
            /// [`Error::Uninitialized`]: crate::tls_cell::Error::Uninitialized
            #[inline]
            $vis fn accumulate(self, value: i64) -> Result<(), $crate::tls_cell::Error> {
                Self::slot(|x| match x.get() {
                    // the record is only reachable from this thread, and no reference to it
                    // outlives this call
                    Some(mut record) => unsafe {
                        $crate::internal::tls_slot::CellRecord::accumulate(record.as_mut(), value);
                        Ok(())
                    },
                    None => Err(Self::missing()),
                })
            }

            /// Returns the current value of the current thread's record.
            ///
            /// # Errors
            ///
            /// Returns [`Error::Uninitialized`] if `initialize` has not been called on this
            /// thread.
            ///
            /// [`Error::Uninitialized`]: crate::tls_cell::Error::Uninitialized
            #[inline]
            $vis fn read(self) -> Result<i64, $crate::tls_cell::Error> {
                Self::slot(|x| match x.get() {
                    Some(record) => unsafe {
                        Ok($crate::internal::tls_slot::CellRecord::value(record.as_ref()))
                    },
                    None => Err(Self::missing()),
                })
            }

            /// Returns a raw pointer to the current thread's record.
            ///
            /// The pointer stays valid until the thread exits, or the cell is initialized again.
            /// It must not be sent to other threads.
            #[inline]
            $vis fn record(self) -> Result<core::ptr::NonNull<$t>, $crate::tls_cell::Error> {
                Self::slot(|x| x.get().ok_or_else(Self::missing))
            }

            #[inline(never)]
            #[cold]
            fn missing() -> $crate::tls_cell::Error {
                $crate::stats::failed_access();
                if Self::owner(|_| ()).is_ok() {
                    $crate::tls_cell::Error::Uninitialized { owner: Self::NAME }
                } else {
                    $crate::tls_cell::Error::Destroyed { owner: Self::NAME }
                }
            }

            #[inline]
            fn owner<F: FnOnce(&$crate::internal::tls_slot::Owner<$t>) -> O, O>(
                f: F,
            ) -> Result<O, std::thread::AccessError> {
                thread_local!{
                    static __OWNER: $crate::internal::tls_slot::Owner<$t> =
                        $crate::internal::tls_slot::Owner::new(
                            stringify!($name),
                            || $name::slot(|x| x.set(None)),
                        );
                }

                __OWNER.try_with(f)
            }

            // TLS access through POD is faster. Access through #[thread_local] POD is even faster.
            #[inline]
            fn slot<F: FnOnce(&core::cell::Cell<Option<core::ptr::NonNull<$t>>>) -> O, O>(
                f: F,
            ) -> O {
                cfg_if::cfg_if!{
                    if #[cfg(feature = "nightly")] {
                        #[thread_local]
                        static __SLOT: core::cell::Cell<Option<core::ptr::NonNull<$t>>> =
                            core::cell::Cell::new(None);

                        #[inline]
                        fn with<F: FnOnce(&core::cell::Cell<Option<core::ptr::NonNull<$t>>>) -> O, O>(f: F) -> O {
                            f(&__SLOT)
                        }
                    } else {
                        thread_local!{
                            static __SLOT: core::cell::Cell<Option<core::ptr::NonNull<$t>>> =
                                core::cell::Cell::new(None);
                        }

                        #[inline]
                        fn with<F: FnOnce(&core::cell::Cell<Option<core::ptr::NonNull<$t>>>) -> O, O>(f: F) -> O {
                            __SLOT.with(f)
                        }
                    }
                }

                with(f)
            }
        }
    );
}
