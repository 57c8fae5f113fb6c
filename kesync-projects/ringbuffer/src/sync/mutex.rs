//! # Mutex.
//!
//! Mutex is a synchronization primitive that allows **only one thread at a
//! time** to access a critical section, protecting shared state from
//! concurrent modification. Unlike the spin lock, it **blocks** threads trying
//! to acquire it while another thread holds the lock.
//!
//! The [`Mutex`] keeps a count (1 when free, 0 when held) and the list of
//! threads sleeping on it, both behind one internal [`SpinLock`]. A thread
//! that finds the count at zero parks itself with [`Current::park_with`],
//! registering its [`ParkHandle`] at the tail of the queue before the spinlock
//! is released. When unlocking, the holder **hands the lock over** to the
//! waiter at the head of the queue: the count stays at zero and exactly one
//! thread is woken. Only when nobody waits does the count go back to one.
//!
//! |                | SpinLock                 | Mutex                      |
//! |----------------|--------------------------|----------------------------|
//! | Waiting thread | Spins (busy-waits)       | Sleeps                     |
//! | CPU usage      | High (wastes CPU cycles) | Low (no busy waiting)      |
//! | Overhead       | Low (fast if uncontended)| Higher (due to sleep/wake) |
//! | Wake order     | Arbitrary                | FIFO                       |
//!
//! [`SpinLock`]: kesync::sync::SpinLock
//! [`Current::park_with`]: kesync::thread::Current::park_with
//! [`ParkHandle`]: kesync::thread::ParkHandle

use super::waiter::WaitQueue;
use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};
use kesync::{
    sync::{SpinLock, WouldBlock},
    thread::{Current, WakeChannel},
};

struct MutexState {
    count: usize,
    waiters: WaitQueue,
}

/// A mutual exclusion primitive useful for protecting shared data
///
/// This mutex will put threads waiting for the lock to sleep until it becomes
/// available. The data can only be accessed through the guards returned from
/// [`lock`] and [`try_lock`], which guarantees that the data is only ever
/// accessed when the mutex is locked.
///
/// [`lock`]: Self::lock
/// [`try_lock`]: Self::try_lock
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kesync::thread::ThreadBuilder;
/// use kesync_ringbuffer::sync::Mutex;
///
/// const N: usize = 10;
///
/// let data = Arc::new(Mutex::new(0));
///
/// let handles: Vec<_> = (0..N)
///     .map(|_| {
///         let data = Arc::clone(&data);
///         ThreadBuilder::new("work").spawn(move || {
///             let mut data = data.lock();
///             *data += 1;
///             // the lock must be "explicitly" unlocked.
///             data.unlock();
///         })
///     })
///     .collect();
/// for handle in handles {
///     assert_eq!(handle.join(), 0);
/// }
/// assert_eq!(Arc::into_inner(data).map(|m| m.into_inner()), Some(N));
/// ```
pub struct Mutex<T> {
    state: SpinLock<MutexState>,
    channel: WakeChannel,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new mutex in an unlocked state ready for use.
    pub fn new(t: T) -> Mutex<T> {
        Mutex {
            state: SpinLock::new(MutexState {
                count: 1,
                waiters: WaitQueue::new(),
            }),
            channel: WakeChannel::allocate(),
            data: UnsafeCell::new(t),
        }
    }

    /// Acquires a mutex, blocking the current thread until it is able to do
    /// so.
    ///
    /// If the mutex is free, this takes it without sleeping. Otherwise the
    /// current thread joins the tail of the waiter queue and sleeps until a
    /// releasing thread hands the mutex over to it. Upon returning, the thread
    /// is the only thread with the lock held.
    ///
    /// Locking a mutex in the thread which already holds it deadlocks.
    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let mut state = self.state.lock();
        if state.count > 0 {
            state.count -= 1;
            state.unlock();
        } else {
            tracing::trace!(
                channel = self.channel.id(),
                waiters = state.waiters.len(),
                "mutex contended"
            );
            Current::park_with(self.channel, move |handle| {
                let mut state = state;
                state.waiters.push_back(handle);
                state.unlock();
            });
            // The releasing thread left the count at zero for us.
        }
        MutexGuard::new(self)
    }

    /// Attempts to acquire this lock.
    ///
    /// This function does not block.
    ///
    /// # Errors
    ///
    /// If the mutex could not be acquired because it is already locked, then
    /// this call will return the [`WouldBlock`] error.
    #[track_caller]
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, WouldBlock> {
        let mut state = self.state.lock();
        let acquired = state.count > 0;
        if acquired {
            state.count -= 1;
        }
        state.unlock();
        if acquired {
            Ok(MutexGuard::new(self))
        } else {
            Err(WouldBlock)
        }
    }

    /// Returns whether the mutex is currently held.
    pub fn is_locked(&self) -> bool {
        let state = self.state.lock();
        let locked = state.count == 0;
        state.unlock();
        locked
    }

    /// Number of threads currently sleeping on this mutex.
    pub fn waiters(&self) -> usize {
        let state = self.state.lock();
        let waiters = state.waiters.len();
        state.unlock();
        waiters
    }

    /// Consumes this mutex, returning the underlying data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn release(&self) {
        let mut state = self.state.lock();
        let next = state.waiters.pop_front();
        if next.is_none() {
            state.count += 1;
        }
        state.unlock();
        // Ownership passes directly to `next`; nobody can slip in between.
        if let Some(next) = next {
            next.unpark();
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    /// Creates a `Mutex<T>`, with the `Default` value for T.
    fn default() -> Mutex<T> {
        Mutex::new(Default::default())
    }
}

/// An implementation of a "scoped lock" of a mutex. When this structure
/// is dropped (falls out of scope) without unlocking, the panic occurs.
///
/// The lock must be explicitly unlocked by [`unlock`] method.
///
/// The data protected by the mutex can be accessed through this guard.
///
/// [`unlock`]: MutexGuard::unlock
pub struct MutexGuard<'a, T: 'a> {
    caller: &'static core::panic::Location<'static>,
    lock: &'a Mutex<T>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T> MutexGuard<'a, T> {
    #[track_caller]
    fn new(lock: &'a Mutex<T>) -> Self {
        Self {
            caller: core::panic::Location::caller(),
            lock,
            _not_send: PhantomData,
        }
    }

    /// Releases the underlying [`Mutex`].
    ///
    /// If threads are sleeping on the mutex, the one that has waited longest
    /// is woken and becomes the new holder. As the guard does **not**
    /// automatically release the lock on drop, the caller must explicitly
    /// invoke `unlock` to mark the lock as available again.
    pub fn unlock(self) {
        self.lock.release();
        core::mem::forget(self);
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.lock.release();
            return;
        }
        panic!(
            "`.unlock()` must be explicitly called for MutexGuard.
The lock is held at {:?}.",
            self.caller
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_fails_while_held() {
        let mutex = Mutex::new(1);
        let mut guard = mutex.lock();
        assert!(mutex.is_locked());
        assert!(matches!(mutex.try_lock(), Err(WouldBlock)));
        *guard += 1;
        guard.unlock();
        assert!(!mutex.is_locked());
        let guard = mutex.try_lock().unwrap();
        assert_eq!(*guard, 2);
        guard.unlock();
        assert_eq!(mutex.waiters(), 0);
    }
}
