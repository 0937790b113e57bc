//! Portable backend built on `std::sync`.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{self, PoisonError};
use std::time::Duration;

/// Exclusive lock protecting a value of type `T`.
#[derive(Default)]
pub struct Mutex<T>
{
    inner: sync::Mutex<T>,
}

impl<T> Mutex<T>
{
    /// Create an unlocked mutex holding `value`.
    pub const fn new(value: T) -> Self
    {
        Self {
            inner: sync::Mutex::new(value),
        }
    }

    /// Acquire the lock for the rest of the enclosing scope.
    pub fn lock(&self) -> LockGuard<'_, T>
    {
        LockGuard {
            guard: self.acquire(),
        }
    }

    /// Acquire the lock as a [`UniqueLock`] that can be released early.
    pub fn unique(&self) -> UniqueLock<'_, T>
    {
        UniqueLock {
            mutex: self,
            guard: Some(self.acquire()),
        }
    }

    /// Consume the mutex and return the protected value.
    pub fn into_inner(self) -> T
    {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> sync::MutexGuard<'_, T>
    {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scope-bound guard returned by [`Mutex::lock`].
pub struct LockGuard<'a, T>
{
    guard: sync::MutexGuard<'a, T>,
}

impl<T> Deref for LockGuard<'_, T>
{
    type Target = T;

    fn deref(&self) -> &T
    {
        &self.guard
    }
}

impl<T> DerefMut for LockGuard<'_, T>
{
    fn deref_mut(&mut self) -> &mut T
    {
        &mut self.guard
    }
}

/// Releasable guard returned by [`Mutex::unique`].
///
/// Dereferencing while released is a programming error and panics.
pub struct UniqueLock<'a, T>
{
    mutex: &'a Mutex<T>,
    guard: Option<sync::MutexGuard<'a, T>>,
}

impl<'a, T> UniqueLock<'a, T>
{
    /// Release the lock. No-op if already released.
    pub fn unlock(&mut self)
    {
        self.guard = None;
    }

    /// Re-acquire the lock. No-op if already held.
    pub fn lock(&mut self)
    {
        if self.guard.is_none() {
            self.guard = Some(self.mutex.acquire());
        }
    }

    /// Whether this handle currently holds the lock.
    pub fn owns_lock(&self) -> bool
    {
        self.guard.is_some()
    }

    fn take_guard(&mut self) -> sync::MutexGuard<'a, T>
    {
        match self.guard.take() {
            Some(guard) => guard,
            None => self.mutex.acquire(),
        }
    }
}

impl<T> Deref for UniqueLock<'_, T>
{
    type Target = T;

    fn deref(&self) -> &T
    {
        self.guard.as_deref().expect("UniqueLock dereferenced while unlocked")
    }
}

impl<T> DerefMut for UniqueLock<'_, T>
{
    fn deref_mut(&mut self) -> &mut T
    {
        self.guard.as_deref_mut().expect("UniqueLock dereferenced while unlocked")
    }
}

/// Condition variable paired with a [`UniqueLock`].
#[derive(Default)]
pub struct Condvar
{
    inner: sync::Condvar,
}

impl Condvar
{
    /// Create a condition variable with no waiters.
    pub const fn new() -> Self
    {
        Self {
            inner: sync::Condvar::new(),
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
        let guard = lock.take_guard();
        let guard = self
            .inner
            .wait_while(guard, |value| !pred(value))
            .unwrap_or_else(PoisonError::into_inner);
        lock.guard = Some(guard);
    }

    /// Bounded [`Condvar::wait`]. Returns the final value of `pred`, so
    /// `false` means the timeout elapsed first.
    pub fn wait_timeout<T, F>(&self, lock: &mut UniqueLock<'_, T>, timeout: Duration, mut pred: F) -> bool
    where
        F: FnMut(&mut T) -> bool,
    {
        let guard = lock.take_guard();
        let (mut guard, _) = self
            .inner
            .wait_timeout_while(guard, timeout, |value| !pred(value))
            .unwrap_or_else(PoisonError::into_inner);
        let satisfied = pred(&mut guard);
        lock.guard = Some(guard);
        satisfied
    }

    /// Wake every waiter.
    pub fn notify_all(&self)
    {
        self.inner.notify_all();
    }

    /// Wake one waiter.
    pub fn notify_one(&self)
    {
        self.inner.notify_one();
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
