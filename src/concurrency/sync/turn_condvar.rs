//! `TurnCondvar`: a condition variable paired with `TurnMutex`.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::LockResult;

use super::turn_mutex::TurnMutexGuard;
use super::{wait_on_u32, wake_all_u32, wake_one_u32};

/// A condition variable that lets threads sleep while releasing a [`TurnMutex`].
///
/// Notifications bump a sequence word that waiters park on. A waiter can wake
/// because of a notification meant for someone else, or because the
/// underlying park returned early, so [`wait`](Self::wait) gives no guarantee
/// about the protected state. Use [`wait_while`](Self::wait_while), or loop
/// over your own predicate.
///
/// [`TurnMutex`]: super::TurnMutex
#[derive(Debug, Default)]
pub struct TurnCondvar {
    seq: AtomicU32,
}

impl TurnCondvar {
    /// Creates a new condition variable.
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
        }
    }

    /// Releases the lock held by `guard`, parks, and re-acquires the lock.
    ///
    /// # Errors
    ///
    /// Returns the re-acquired guard wrapped in a `PoisonError` if the mutex
    /// was poisoned while this thread was parked.
    pub fn wait<'a, T: ?Sized>(
        &self,
        guard: TurnMutexGuard<'a, T>,
    ) -> LockResult<TurnMutexGuard<'a, T>> {
        let mutex = guard.mutex();
        // Read under the lock: a notifier that changes the protected state
        // must take the lock first, so it cannot slip in before this load.
        let seq = self.seq.load(Ordering::Relaxed);

        drop(guard);

        // A notify between the unlock and the park moves `seq` on, and the
        // park then returns straight away.
        wait_on_u32(&self.seq, seq);

        mutex.lock()
    }

    /// Blocks while `condition` returns `true`, re-checking it after every wake.
    ///
    /// # Errors
    ///
    /// Propagates a poisoned re-acquisition from [`wait`](Self::wait).
    pub fn wait_while<'a, T: ?Sized, F>(
        &self,
        mut guard: TurnMutexGuard<'a, T>,
        mut condition: F,
    ) -> LockResult<TurnMutexGuard<'a, T>>
    where
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut *guard) {
            guard = self.wait(guard)?;
        }
        Ok(guard)
    }

    /// Wakes up one blocked thread on this condition variable.
    pub fn notify_one(&self) {
        self.seq.fetch_add(1, Ordering::Relaxed);
        wake_one_u32(&self.seq);
    }

    /// Wakes up all blocked threads on this condition variable.
    pub fn notify_all(&self) {
        self.seq.fetch_add(1, Ordering::Relaxed);
        wake_all_u32(&self.seq);
    }
}
