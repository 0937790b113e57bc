//! # Platform Synchronization
//!
//! One lock/condition-variable vocabulary for the whole engine.
//!
//! Windows and the Unix family expose incompatible native primitives with
//! different wait/notify call shapes. Every other component uses only the
//! types re-exported here:
//!
//! - [`Mutex`]: data-carrying exclusive lock
//! - [`LockGuard`]: scope-bound guard, released on drop
//! - [`UniqueLock`]: guard that can be released and re-acquired explicitly
//! - [`Condvar`]: predicate wait plus notify-one / notify-all
//!
//! ## Backends
//!
//! The backend is chosen at build time and the native types never leak into a
//! public signature:
//!
//! - **Windows**: slim reader/writer locks (`SRWLOCK`) and `CONDITION_VARIABLE`,
//!   the lightest exclusive lock the OS offers. Both are statically
//!   initializable, so constructing them does no work at all.
//! - **Everything else**: `std::sync::Mutex` and `std::sync::Condvar`.
//!
//! ## Failure semantics
//!
//! None of these operations return errors. The native calls cannot fail under
//! correct usage. On the portable backend a poisoned lock is recovered rather
//! than propagated: the records guarded in this engine are plain state flags
//! that stay consistent even if a holder panics.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use emmy_core::sync::{Condvar, Mutex};
//!
//! let pair = Arc::new((Mutex::new(false), Condvar::new()));
//! let notifier = Arc::clone(&pair);
//!
//! thread::spawn(move || {
//!     let (ready, cv) = &*notifier;
//!     *ready.lock() = true;
//!     cv.notify_all();
//! });
//!
//! let (ready, cv) = &*pair;
//! let mut lock = ready.unique();
//! cv.wait(&mut lock, |ready| *ready);
//! assert!(*lock);
//! ```

#[cfg(not(windows))]
mod portable;
#[cfg(windows)]
mod srw;

#[cfg(not(windows))]
use portable as imp;
#[cfg(windows)]
use srw as imp;

pub use imp::{Condvar, LockGuard, Mutex, UniqueLock};
