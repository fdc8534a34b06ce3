//! `TurnMutex`: a futex-backed mutex with poisoning.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{LockResult, PoisonError, TryLockError, TryLockResult};
use std::thread;

use crossbeam_utils::Backoff;

use super::{wait_on_u32, wake_one_u32};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// A mutual-exclusion lock whose waiters park on the lock word itself.
///
/// The API mirrors `std::sync::Mutex`: acquiring returns a [`LockResult`], and
/// a guard dropped while its thread is panicking poisons the mutex so that
/// every later acquisition reports the failure.
///
/// # States
/// - 0: unlocked
/// - 1: locked, no waiters
/// - 2: locked, waiters may be parked
pub struct TurnMutex<T: ?Sized> {
    state: AtomicU32,
    poisoned: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for TurnMutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for TurnMutex<T> {}

impl<T> TurnMutex<T> {
    /// Creates a new unlocked, unpoisoned mutex.
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
            poisoned: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Consumes the mutex and returns the protected value.
    ///
    /// # Errors
    ///
    /// Returns the value wrapped in a [`PoisonError`] if the mutex is poisoned.
    pub fn into_inner(self) -> LockResult<T> {
        let poisoned = self.poisoned.load(Ordering::Relaxed);
        let data = self.data.into_inner();
        if poisoned {
            Err(PoisonError::new(data))
        } else {
            Ok(data)
        }
    }
}

impl<T: ?Sized> TurnMutex<T> {
    /// Acquires the mutex, blocking the current thread until it is able to do so.
    ///
    /// # Errors
    ///
    /// If another holder panicked while holding the lock, the guard is still
    /// returned, wrapped in a [`PoisonError`].
    pub fn lock(&self) -> LockResult<TurnMutexGuard<'_, T>> {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_contended();
        }
        self.guard()
    }

    /// Attempts to acquire the mutex without blocking.
    ///
    /// # Errors
    ///
    /// [`TryLockError::WouldBlock`] if the lock is held, or
    /// [`TryLockError::Poisoned`] if it was acquired but is poisoned.
    pub fn try_lock(&self) -> TryLockResult<TurnMutexGuard<'_, T>> {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Ok(self.guard()?)
        } else {
            Err(TryLockError::WouldBlock)
        }
    }

    /// Whether a holder panicked while the lock was held.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Relaxed)
    }

    /// Clears the poisoned flag.
    pub fn clear_poison(&self) {
        self.poisoned.store(false, Ordering::Relaxed);
    }

    /// Returns a mutable reference to the protected value without locking.
    ///
    /// # Errors
    ///
    /// Returns the reference wrapped in a [`PoisonError`] if the mutex is poisoned.
    pub fn get_mut(&mut self) -> LockResult<&mut T> {
        let data = self.data.get_mut();
        if self.poisoned.load(Ordering::Relaxed) {
            Err(PoisonError::new(data))
        } else {
            Ok(data)
        }
    }

    fn guard(&self) -> LockResult<TurnMutexGuard<'_, T>> {
        let guard = TurnMutexGuard {
            lock: self,
            panicking: thread::panicking(),
            _not_send: PhantomData,
        };
        if self.is_poisoned() {
            Err(PoisonError::new(guard))
        } else {
            Ok(guard)
        }
    }

    #[cold]
    fn lock_contended(&self) {
        let backoff = Backoff::new();
        let mut state = self.state.load(Ordering::Relaxed);

        // Spin while the holder looks short-lived and nobody is parked yet.
        while state == LOCKED && !backoff.is_completed() {
            backoff.snooze();
            state = self.state.load(Ordering::Relaxed);
        }

        if state == UNLOCKED
            && self
                .state
                .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            return;
        }

        // From here on we may have parked company, so always leave the word
        // at CONTENDED; the unlock that follows will then issue a wake.
        while self.state.swap(CONTENDED, Ordering::Acquire) != UNLOCKED {
            wait_on_u32(&self.state, CONTENDED);
        }
    }

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// Must only be called by the thread that currently holds the lock.
    unsafe fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            wake_one_u32(&self.state);
        }
    }
}

impl<T: Default> Default for TurnMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for TurnMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnMutex")
            .field("locked", &(self.state.load(Ordering::Relaxed) != UNLOCKED))
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

/// An RAII guard for a [`TurnMutex`]; the lock is released on drop.
pub struct TurnMutexGuard<'a, T: ?Sized> {
    lock: &'a TurnMutex<T>,
    panicking: bool,
    // Poison tracking reads the panicking state of the owning thread.
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for TurnMutexGuard<'_, T> {}

impl<'a, T: ?Sized> TurnMutexGuard<'a, T> {
    /// The mutex this guard was taken from, so a condition variable can
    /// re-acquire it after parking.
    pub(crate) fn mutex(&self) -> &'a TurnMutex<T> {
        self.lock
    }
}

impl<T: ?Sized> Deref for TurnMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the guard means holding the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for TurnMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the guard means holding the lock exclusively.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for TurnMutexGuard<'_, T> {
    fn drop(&mut self) {
        if !self.panicking && thread::panicking() {
            self.lock.poisoned.store(true, Ordering::Relaxed);
        }
        // SAFETY: the guard is proof that this thread holds the lock.
        unsafe {
            self.lock.unlock();
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for TurnMutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
