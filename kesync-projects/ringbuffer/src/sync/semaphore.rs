//! # Semaphore.
//!
//! A **semaphore** regulates concurrent access to a finite set of resources.
//! It maintains a count of available "permits"; each permit grants a thread
//! the right to use one unit of the shared resource.
//!
//! The [`Semaphore`] here generalizes the park/hand-over scheme of the
//! [`Mutex`] to a signed count:
//!
//! - [`Semaphore::wait()`] decrements the count. A result of zero or more
//!   means a unit was available. A negative result means the caller must
//!   sleep: it registers at the tail of the waiter queue and parks.
//! - [`Semaphore::signal()`] increments the count. A result of zero or less
//!   means somebody was sleeping, and the waiter at the head of the queue is
//!   woken with the unit.
//!
//! While the count is negative, its magnitude is exactly the number of parked
//! threads.
//!
//! Each semaphore wakes its sleepers on its own [`WakeChannel`], so two
//! semaphores used side by side (like the "empty" and "full" counts of a
//! bounded buffer) can never wake each other's waiters.
//!
//! #### Usage Example
//!
//! ```rust
//! use kesync_ringbuffer::sync::Semaphore;
//!
//! let sema = Semaphore::new(3, "state"); // Allows up to 3 concurrent holders.
//!
//! // Acquire a permit (blocks if unavailable)
//! let permit = sema.wait();
//! assert_eq!(*permit, "state");
//! assert_eq!(sema.permits(), 2);
//!
//! // Permit is automatically released when `permit` goes out of scope.
//! drop(permit);
//! assert_eq!(sema.permits(), 3);
//! ```
//!
//! [`Mutex`]: crate::sync::Mutex
//! [`WakeChannel`]: kesync::thread::WakeChannel

use super::waiter::WaitQueue;
use core::ops::Deref;
use kesync::{
    sync::{SpinLock, WouldBlock},
    thread::{Current, WakeChannel},
};

struct SemaphoreState {
    count: isize,
    waiters: WaitQueue,
}

/// Counting semaphore.
///
/// A semaphore maintains a set of permits and a resource. Permits are used to
/// synchronize access to the shared resource. A semaphore differs from a mutex
/// in that it can allow more than one concurrent caller to access the shared
/// resource at a time.
pub struct Semaphore<T> {
    state: SpinLock<SemaphoreState>,
    channel: WakeChannel,
    resource: T,
}

impl<T> Semaphore<T> {
    /// Creates a new semaphore initialized with a specified number of permits.
    ///
    /// # Arguments
    ///
    /// * `permits` - The initial number of available permits.
    /// * `resource` - A resource combined with this semaphore.
    ///
    /// The count is signed, so `permits` is capped at [`isize::MAX`].
    pub fn new(permits: usize, resource: T) -> Self {
        Self {
            state: SpinLock::new(SemaphoreState {
                count: isize::try_from(permits).unwrap_or(isize::MAX),
                waiters: WaitQueue::new(),
            }),
            channel: WakeChannel::allocate(),
            resource,
        }
    }

    /// Waits until a permit becomes available and then acquires it.
    ///
    /// If no permits are available, this function will block the current
    /// thread until another thread calls [`signal`] on this semaphore.
    ///
    /// This method returns a [`SemaphorePermits`] RAII guard. When the guard is
    /// dropped, it will automatically release the acquired permit.
    ///
    /// [`signal`]: Self::signal
    pub fn wait(&self) -> SemaphorePermits<'_, T> {
        let mut state = self.state.lock();
        state.count -= 1;
        if state.count >= 0 {
            state.unlock();
        } else {
            tracing::trace!(
                channel = self.channel.id(),
                count = state.count,
                "semaphore exhausted"
            );
            Current::park_with(self.channel, move |handle| {
                let mut state = state;
                state.waiters.push_back(handle);
                state.unlock();
            });
        }
        SemaphorePermits { sema: self }
    }

    /// Acquires a permit only if one is available right now.
    ///
    /// # Errors
    ///
    /// Returns [`WouldBlock`] when [`wait`] would have slept.
    ///
    /// [`wait`]: Self::wait
    pub fn try_wait(&self) -> Result<SemaphorePermits<'_, T>, WouldBlock> {
        let mut state = self.state.lock();
        let acquired = state.count > 0;
        if acquired {
            state.count -= 1;
        }
        state.unlock();
        if acquired {
            Ok(SemaphorePermits { sema: self })
        } else {
            Err(WouldBlock)
        }
    }

    /// Releases a permit back to the semaphore.
    ///
    /// This method increases the number of available permits by one, and if
    /// any threads are blocked in [`wait`], the one that has waited longest is
    /// woken up with the released permit.
    ///
    /// Normally, you don't call this directly except for signaling an event
    /// with a zero-initialized semaphore, or for pairing with a permit that was
    /// [`forget`]ed on another semaphore.
    ///
    /// [`wait`]: Self::wait
    /// [`forget`]: SemaphorePermits::forget
    pub fn signal(&self) {
        let mut state = self.state.lock();
        state.count += 1;
        let next = if state.count <= 0 {
            state.waiters.pop_front()
        } else {
            None
        };
        debug_assert_eq!(
            state.count.min(0).unsigned_abs(),
            state.waiters.len(),
            "semaphore count out of sync with its waiters"
        );
        state.unlock();
        if let Some(next) = next {
            next.unpark();
        }
    }

    /// Snapshot of the count: the number of free permits when positive, minus
    /// the number of sleeping waiters when negative.
    pub fn permits(&self) -> isize {
        let state = self.state.lock();
        let count = state.count;
        state.unlock();
        count
    }

    /// Number of threads currently sleeping on this semaphore.
    pub fn waiters(&self) -> usize {
        let state = self.state.lock();
        let waiters = state.waiters.len();
        state.unlock();
        waiters
    }
}

/// An RAII implementation of a "scoped semaphore". When this structure
/// is dropped (falls out of scope), the semaphore will be signaled.
///
/// The resource combined with the semaphore can be accessed through this guard
/// via its [`Deref`] implementation.
///
/// This structure is created by the [`wait`] and [`try_wait`] methods on
/// [`Semaphore`].
///
/// [`wait`]: Semaphore::wait
/// [`try_wait`]: Semaphore::try_wait
#[must_use = "dropping the permit signals the semaphore immediately"]
pub struct SemaphorePermits<'a, T> {
    sema: &'a Semaphore<T>,
}

impl<T> SemaphorePermits<'_, T> {
    /// Consumes the permit without signaling the semaphore.
    ///
    /// The unit stays taken until somebody calls [`Semaphore::signal`].
    pub fn forget(self) {
        core::mem::forget(self);
    }
}

impl<T> Deref for SemaphorePermits<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.sema.resource
    }
}

impl<T> Drop for SemaphorePermits<'_, T> {
    fn drop(&mut self) {
        self.sema.signal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_wait_respects_count() {
        let sema = Semaphore::new(2, ());
        let a = sema.try_wait().unwrap();
        let b = sema.try_wait().unwrap();
        assert!(matches!(sema.try_wait(), Err(WouldBlock)));
        assert_eq!(sema.permits(), 0);
        drop(a);
        b.forget();
        assert_eq!(sema.permits(), 1);
        sema.signal();
        assert_eq!(sema.permits(), 2);
        assert_eq!(sema.waiters(), 0);
    }

    #[test]
    fn huge_permit_count_is_capped() {
        let sema = Semaphore::new(usize::MAX, ());
        assert_eq!(sema.permits(), isize::MAX);
        let permit = sema.try_wait().unwrap();
        assert_eq!(sema.permits(), isize::MAX - 1);
        assert_eq!(sema.waiters(), 0);
        drop(permit);
        sema.wait().forget();
        assert_eq!(sema.permits(), isize::MAX - 1);
    }
}
