//! # Waiter queue.
//!
//! Both sleeping primitives keep the threads blocked on them in a
//! [`WaitQueue`]: an ordered collection of [`ParkHandle`]s served first in,
//! first out. The earliest waiter is always the next one woken, so a thread
//! cannot starve behind later arrivals on the same primitive.
//!
//! The queue has no lock of its own. It always lives inside the
//! [`SpinLock`]-protected state of its owning mutex or semaphore, next to the
//! count, so "check the count" and "enqueue myself" happen in one critical
//! section.
//!
//! [`SpinLock`]: kesync::sync::SpinLock

use std::collections::VecDeque;

use kesync::thread::ParkHandle;

/// FIFO queue of parked threads.
#[derive(Debug, Default)]
pub struct WaitQueue {
    waiters: VecDeque<ParkHandle>,
}

impl WaitQueue {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    /// Appends a waiter at the tail.
    pub fn push_back(&mut self, waiter: ParkHandle) {
        self.waiters.push_back(waiter);
    }

    /// Removes the waiter at the head, the one that has waited longest.
    pub fn pop_front(&mut self) -> Option<ParkHandle> {
        self.waiters.pop_front()
    }

    /// Number of queued waiters.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Returns `true` if no thread is waiting.
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
