//! SMP-supported spinlock.
//!
//! On a uniprocessor, mutual exclusion only requires that the lock holder is
//! not preempted while holding a lock. When threads run in parallel on
//! different cores, that is not sufficient: they can touch the shared resource
//! at the same time. Therefore, to acquire a lock on a multi-processor, a
//! thread 1) polls a variable that represents whether the lock is held, 2) sets
//! the variable when it takes the `lock`, and 3) unsets the variable when it
//! `unlock`s.
//!
//! Steps 1 and 2 must be executed ATOMICALLY, with a compare-and-swap on the
//! lock word (see [`compare_and_swap`]).
//!
//! Two flavors are provided:
//! - [`RawSpinLock`] is the bare lock word with `acquire`/`release`. It has
//!   no notion of an owner: any thread may release it.
//! - [`SpinLock`] couples a [`RawSpinLock`] with the data it protects, which
//!   is only reachable through a [`SpinLockGuard`].
//!
//! A spinlock never puts the waiting thread to sleep. Never hold one across a
//! point where the holder may park.
//!
//! [`compare_and_swap`]: crate::sync::atomic::compare_and_swap

use crate::sync::atomic::{AtomicBool, compare_and_swap};
use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};
use crossbeam_utils::{Backoff, CachePadded};

/// The lock could not be acquired at this time because the operation would
/// otherwise block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation would block")]
pub struct WouldBlock;

/// A bare busy-waiting lock word.
///
/// `RawSpinLock` is the primitive the rest of the workspace builds on. It does
/// not record who holds it; releasing a lock that the caller does not hold is a
/// caller bug that goes undetected.
///
/// # Examples
///
/// ```
/// use kesync::sync::RawSpinLock;
///
/// let lock = RawSpinLock::new();
/// lock.acquire();
/// assert!(!lock.try_acquire());
/// lock.release();
/// assert!(lock.try_acquire());
/// lock.release();
/// ```
#[derive(Default, Debug)]
pub struct RawSpinLock {
    held: CachePadded<AtomicBool>,
}

impl RawSpinLock {
    /// Creates a new spinlock in an unlocked state.
    #[inline]
    pub const fn new() -> Self {
        Self {
            held: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// Spins until the lock is acquired by the calling thread.
    pub fn acquire(&self) {
        let backoff = Backoff::new();
        while !compare_and_swap(&self.held, false, true) {
            // Wait on a plain load so waiters do not bounce the cache line.
            while self.held.load() {
                backoff.snooze();
            }
        }
    }

    /// Makes one attempt to acquire the lock.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        compare_and_swap(&self.held, false, true)
    }

    /// Marks the lock as free.
    ///
    /// Any waiter may grab the lock right after the store, before this
    /// function returns.
    #[inline]
    pub fn release(&self) {
        self.held.store(false);
    }

    /// Returns whether the lock is currently held by someone.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.held.load()
    }
}

/// A mutual exclusion primitive useful for protecting shared data
///
/// This spinlock will busy-wait threads waiting for the lock to become
/// available. The spinlock can be created via a [`new`] constructor. Each
/// spinlock has a type parameter which represents the data that it is
/// protecting. The data can only be accessed through the guards returned from
/// [`lock`] and [`try_lock`], which guarantees that the data is only ever
/// accessed when the spinlock is locked.
///
/// [`new`]: Self::new
/// [`lock`]: Self::lock
/// [`try_lock`]: Self::try_lock
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kesync::sync::SpinLock;
/// use kesync::thread::ThreadBuilder;
///
/// const N: usize = 10;
///
/// let data = Arc::new(SpinLock::new(0));
///
/// let handles: Vec<_> = (0..N)
///     .map(|_| {
///         let data = Arc::clone(&data);
///         ThreadBuilder::new("work").spawn(move || {
///             let mut guard = data.lock();
///             *guard += 1;
///             // the lock must be "explicitly" unlocked before `guard` goes out of scope.
///             guard.unlock();
///         })
///     })
///     .collect();
/// for handle in handles {
///     assert_eq!(handle.join(), 0);
/// }
/// let guard = data.lock();
/// assert_eq!(*guard, N);
/// guard.unlock();
/// ```
pub struct SpinLock<T: ?Sized> {
    raw: RawSpinLock,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new spinlock in an unlocked state ready for use.
    #[inline]
    pub const fn new(t: T) -> SpinLock<T> {
        SpinLock {
            raw: RawSpinLock::new(),
            data: UnsafeCell::new(t),
        }
    }

    /// Consumes this spinlock, returning the underlying data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Acquires a spinlock, spinning until it is able to do so.
    ///
    /// Upon returning, the thread is the only thread with the lock held. A
    /// guard is returned to allow scoped access of the lock. When the guard
    /// goes out of scope without [`SpinLockGuard::unlock`], panic occurs.
    ///
    /// The exact behavior on locking a spinlock in the thread which already
    /// holds the lock is left unspecified. However, this function will not
    /// return on the second call.
    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        self.raw.acquire();
        SpinLockGuard::new(self)
    }

    /// Attempts to acquire this lock.
    ///
    /// This function does not spin.
    ///
    /// # Errors
    ///
    /// If the spinlock could not be acquired because it is already locked,
    /// then this call will return the [`WouldBlock`] error.
    #[track_caller]
    pub fn try_lock(&self) -> Result<SpinLockGuard<'_, T>, WouldBlock> {
        if self.raw.try_acquire() {
            Ok(SpinLockGuard::new(self))
        } else {
            Err(WouldBlock)
        }
    }

    /// Returns whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl<T: Default> Default for SpinLock<T> {
    /// Creates a `SpinLock<T>`, with the `Default` value for T.
    fn default() -> SpinLock<T> {
        SpinLock::new(Default::default())
    }
}

/// An implementation of a "scoped lock" of a spinlock. When this structure
/// is dropped (falls out of scope) without unlock, panic occurs.
///
/// The lock must be explicitly unlocked by [`unlock`] method.
///
/// This structure is created by the [`lock`] and [`try_lock`] methods on
/// [`SpinLock`].
///
/// [`lock`]: SpinLock::lock
/// [`try_lock`]: SpinLock::try_lock
/// [`unlock`]: Self::unlock
pub struct SpinLockGuard<'a, T: ?Sized + 'a> {
    caller: &'static core::panic::Location<'static>,
    lock: &'a SpinLock<T>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for SpinLockGuard<'_, T> {}

impl<'a, T: ?Sized> SpinLockGuard<'a, T> {
    #[track_caller]
    fn new(lock: &'a SpinLock<T>) -> Self {
        Self {
            caller: core::panic::Location::caller(),
            lock,
            _not_send: PhantomData,
        }
    }

    /// Releases the underlying [`SpinLock`].
    ///
    /// As the guard does **not** automatically release the lock on drop,
    /// the caller must explicitly invoke [`unlock`] to mark the lock
    /// as available again.
    ///
    /// [`unlock`]: SpinLockGuard::unlock
    pub fn unlock(self) {
        self.lock.raw.release();
        core::mem::forget(self);
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Unwinding through a held guard must not turn into an abort.
        if std::thread::panicking() {
            self.lock.raw.release();
            return;
        }
        panic!(
            "`.unlock()` must be explicitly called before dropping SpinLockGuard.
The lock is held at {:?}.",
            self.caller
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn raw_lock_excludes() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 2000;
        let lock = Arc::new(RawSpinLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let (lock, inside) = (lock.clone(), inside.clone());
                std::thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        lock.acquire();
                        assert_eq!(inside.fetch_add(1), 0);
                        core::hint::spin_loop();
                        inside.fetch_sub(1);
                        lock.release();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn release_does_not_check_owner() {
        let lock = RawSpinLock::new();
        lock.acquire();
        std::thread::scope(|s| {
            s.spawn(|| lock.release());
        });
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn try_lock_reports_would_block() {
        let lock = SpinLock::new(5);
        let guard = lock.lock();
        assert!(matches!(lock.try_lock(), Err(WouldBlock)));
        assert!(lock.is_locked());
        guard.unlock();
        let mut guard = lock.try_lock().unwrap();
        *guard += 1;
        guard.unlock();
        assert_eq!(lock.into_inner(), 6);
    }

    #[test]
    #[should_panic(expected = "must be explicitly called")]
    fn dropping_guard_panics() {
        let lock = SpinLock::new(());
        let _guard = lock.lock();
    }
}
