//! Windows backend built on slim reader/writer locks.
//!
//! `SRWLOCK` and `CONDITION_VARIABLE` are pointer-sized, statically
//! initialized to zero and never need destroying. An SRW lock must be
//! released by the thread that acquired it, so the guards are `!Send`.
//!
//! See: [Slim Reader/Writer Locks](https://learn.microsoft.com/en-us/windows/win32/sync/slim-reader-writer--srw--locks)

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use windows::Win32::System::Threading::{
    AcquireSRWLockExclusive, ReleaseSRWLockExclusive, SleepConditionVariableSRW, WakeAllConditionVariable,
    WakeConditionVariable, CONDITION_VARIABLE, INFINITE, SRWLOCK,
};

/// Exclusive lock protecting a value of type `T`.
pub struct Mutex<T>
{
    lock: UnsafeCell<SRWLOCK>,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by the SRW lock.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T>
{
    /// Create an unlocked mutex holding `value`.
    pub const fn new(value: T) -> Self
    {
        Self {
            lock: UnsafeCell::new(SRWLOCK {
                Ptr: std::ptr::null_mut(),
            }),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock for the rest of the enclosing scope.
    pub fn lock(&self) -> LockGuard<'_, T>
    {
        self.acquire();
        LockGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire the lock as a [`UniqueLock`] that can be released early.
    pub fn unique(&self) -> UniqueLock<'_, T>
    {
        self.acquire();
        UniqueLock {
            mutex: self,
            owns: true,
            _not_send: PhantomData,
        }
    }

    /// Consume the mutex and return the protected value.
    pub fn into_inner(self) -> T
    {
        self.data.into_inner()
    }

    fn acquire(&self)
    {
        // SAFETY: the SRWLOCK lives as long as `self` and is never moved while held.
        unsafe { AcquireSRWLockExclusive(self.lock.get()) }
    }

    fn release(&self)
    {
        // SAFETY: only called by a guard that currently owns the lock.
        unsafe { ReleaseSRWLockExclusive(self.lock.get()) }
    }
}

impl<T: Default> Default for Mutex<T>
{
    fn default() -> Self
    {
        Self::new(T::default())
    }
}

/// Scope-bound guard returned by [`Mutex::lock`].
pub struct LockGuard<'a, T>
{
    mutex: &'a Mutex<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T> Deref for LockGuard<'_, T>
{
    type Target = T;

    fn deref(&self) -> &T
    {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for LockGuard<'_, T>
{
    fn deref_mut(&mut self) -> &mut T
    {
        // SAFETY: the guard holds the lock exclusively.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for LockGuard<'_, T>
{
    fn drop(&mut self)
    {
        self.mutex.release();
    }
}

/// Releasable guard returned by [`Mutex::unique`].
///
/// Dereferencing while released is a programming error and panics.
pub struct UniqueLock<'a, T>
{
    mutex: &'a Mutex<T>,
    owns: bool,
    _not_send: PhantomData<*const ()>,
}

impl<T> UniqueLock<'_, T>
{
    /// Release the lock. No-op if already released.
    pub fn unlock(&mut self)
    {
        if self.owns {
            self.mutex.release();
            self.owns = false;
        }
    }

    /// Re-acquire the lock. No-op if already held.
    pub fn lock(&mut self)
    {
        if !self.owns {
            self.mutex.acquire();
            self.owns = true;
        }
    }

    /// Whether this handle currently holds the lock.
    pub fn owns_lock(&self) -> bool
    {
        self.owns
    }

    fn data(&mut self) -> &mut T
    {
        // SAFETY: callers hold the lock.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Deref for UniqueLock<'_, T>
{
    type Target = T;

    fn deref(&self) -> &T
    {
        assert!(self.owns, "UniqueLock dereferenced while unlocked");
        // SAFETY: the lock is held.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for UniqueLock<'_, T>
{
    fn deref_mut(&mut self) -> &mut T
    {
        assert!(self.owns, "UniqueLock dereferenced while unlocked");
        self.data()
    }
}

impl<T> Drop for UniqueLock<'_, T>
{
    fn drop(&mut self)
    {
        self.unlock();
    }
}

/// Condition variable paired with a [`UniqueLock`].
pub struct Condvar
{
    cv: UnsafeCell<CONDITION_VARIABLE>,
}

// SAFETY: CONDITION_VARIABLE is designed for concurrent use from any thread.
unsafe impl Send for Condvar {}
unsafe impl Sync for Condvar {}

impl Condvar
{
    /// Create a condition variable with no waiters.
    pub const fn new() -> Self
    {
        Self {
            cv: UnsafeCell::new(CONDITION_VARIABLE {
                Ptr: std::ptr::null_mut(),
            }),
        }
    }

    /// Block until `pred` returns `true`.
    ///
    /// The lock is released while sleeping and held again on return. The
    /// predicate is re-evaluated after every wake, spurious or not. A released
    /// `lock` is acquired first.
    pub fn wait<T, F>(&self, lock: &mut UniqueLock<'_, T>, mut pred: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        lock.lock();
        while !pred(lock.data()) {
            self.sleep(lock, INFINITE);
        }
    }

    /// Bounded [`Condvar::wait`]. Returns the final value of `pred`, so
    /// `false` means the timeout elapsed first.
    pub fn wait_timeout<T, F>(&self, lock: &mut UniqueLock<'_, T>, timeout: Duration, mut pred: F) -> bool
    where
        F: FnMut(&mut T) -> bool,
    {
        lock.lock();
        let deadline = Instant::now() + timeout;
        loop {
            if pred(lock.data()) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            // INFINITE is u32::MAX; clamp just below it.
            let millis = u32::try_from(remaining.as_millis()).unwrap_or(INFINITE - 1).max(1);
            self.sleep(lock, millis);
        }
    }

    /// Wake every waiter.
    pub fn notify_all(&self)
    {
        // SAFETY: the condition variable outlives the call.
        unsafe { WakeAllConditionVariable(self.cv.get()) }
    }

    /// Wake one waiter.
    pub fn notify_one(&self)
    {
        // SAFETY: the condition variable outlives the call.
        unsafe { WakeConditionVariable(self.cv.get()) }
    }

    fn sleep<T>(&self, lock: &UniqueLock<'_, T>, millis: u32)
    {
        // Timeouts surface as ERROR_TIMEOUT; the caller's loop re-checks the
        // predicate and deadline either way.
        // SAFETY: `lock` holds the SRW lock in exclusive mode (flags = 0).
        unsafe {
            let _ = SleepConditionVariableSRW(self.cv.get(), lock.mutex.lock.get(), millis, 0);
        }
    }
}

impl Default for Condvar
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl<T> fmt::Debug for Mutex<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Mutex").finish_non_exhaustive()
    }
}

impl fmt::Debug for Condvar
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}
