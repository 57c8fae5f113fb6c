//! # Ring buffer.
//!
//! A fixed-capacity circular buffer used as a bounded FIFO channel between
//! any number of producers and consumers: the classic bounded-buffer problem.
//!
//! Three primitives coordinate it:
//!
//! - `empty`, a [`Semaphore`] counting free slots (starts at the capacity),
//! - `full`, a [`Semaphore`] counting filled slots (starts at zero),
//! - a [`Mutex`] owning the slot array and the `in`/`out` cursors.
//!
//! ```text
//!  enqueue(v)                         dequeue()
//!  ----------                         ---------
//!  empty.wait()  (sleeps when full)   full.wait()   (sleeps when empty)
//!  lock mutex                         lock mutex
//!  slots[in] = v; in += 1             v = slots[out]; out += 1
//!  unlock mutex                       unlock mutex
//!  full.signal()                      empty.signal()
//! ```
//!
//! The semaphores only gate availability. Every read or write of a slot and
//! every cursor move happens under the mutex, which is what keeps two
//! producers (or two consumers) off the same index. Because cursor moves are
//! serialized, values come out in the order they went in.

use crate::sync::{Mutex, Semaphore};
use kesync::{Error, sync::WouldBlock};

struct Slots<T> {
    next_in: usize,
    next_out: usize,
    slots: Box<[T]>,
}

/// A bounded, blocking, multi-producer multi-consumer FIFO of integers.
///
/// The element type defaults to `i32`; any `Copy + Default` value works.
/// Share it between threads with an `Arc` or scoped threads.
pub struct RingBuffer<T = i32> {
    nr_slots: usize,
    slots: Mutex<Slots<T>>,
    empty: Semaphore<()>,
    full: Semaphore<()>,
}

impl<T: Copy + Default + Send> RingBuffer<T> {
    /// Initialize a ring buffer with `nr_slots` slots.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `nr_slots` is zero.
    /// - [`Error::NoMemory`] if the slot array cannot be allocated.
    ///
    /// Use [`kesync::Status::from`] on the result to get the integer status
    /// (0 on success).
    pub fn init(nr_slots: usize) -> Result<Self, Error> {
        if nr_slots == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(nr_slots)
            .map_err(|_| Error::NoMemory)?;
        slots.resize(nr_slots, T::default());
        tracing::debug!(nr_slots, "ring buffer initialized");

        Ok(Self {
            nr_slots,
            slots: Mutex::new(Slots {
                next_in: 0,
                next_out: 0,
                slots: slots.into_boxed_slice(),
            }),
            empty: Semaphore::new(nr_slots, ()),
            full: Semaphore::new(0, ()),
        })
    }

    /// Put `value` into the buffer, sleeping while the buffer is full.
    pub fn enqueue(&self, value: T) {
        self.empty.wait().forget();
        self.put(value);
    }

    /// Take the oldest value out of the buffer, sleeping while it is empty.
    pub fn dequeue(&self) -> T {
        self.full.wait().forget();
        self.take()
    }

    /// Put `value` into the buffer only if a slot is free right now.
    ///
    /// # Errors
    ///
    /// Gives `value` back when the buffer is full.
    pub fn try_enqueue(&self, value: T) -> Result<(), T> {
        match self.empty.try_wait() {
            Ok(permit) => {
                permit.forget();
                self.put(value);
                Ok(())
            }
            Err(WouldBlock) => Err(value),
        }
    }

    /// Take the oldest value only if one is available right now.
    pub fn try_dequeue(&self) -> Option<T> {
        let permit = self.full.try_wait().ok()?;
        permit.forget();
        Some(self.take())
    }

    /// Release the slot array.
    pub fn fini(self) {
        tracing::debug!(
            nr_slots = self.nr_slots,
            remaining = self.len(),
            "ring buffer finalized"
        );
    }

    /// Number of slots, fixed at initialization.
    pub fn capacity(&self) -> usize {
        self.nr_slots
    }

    /// Snapshot of the number of filled slots.
    pub fn len(&self) -> usize {
        usize::try_from(self.full.permits()).unwrap_or(0)
    }

    /// Whether no slot is filled, as a snapshot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, value: T) {
        let mut guard = self.slots.lock();
        let at = guard.next_in;
        guard.slots[at] = value;
        guard.next_in = (at + 1) % self.nr_slots;
        guard.unlock();
        self.full.signal();
    }

    fn take(&self) -> T {
        let mut guard = self.slots.lock();
        let at = guard.next_out;
        let value = guard.slots[at];
        guard.next_out = (at + 1) % self.nr_slots;
        guard.unlock();
        self.empty.signal();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kesync::Status;

    #[test]
    fn init_rejects_zero_slots() {
        let ring = RingBuffer::<i32>::init(0);
        assert_eq!(Status::from(&ring), Status::InvalidArgument);
        assert_eq!(i32::from(Status::from(&ring)), -22);
    }

    #[test]
    fn init_reports_allocation_failure() {
        let ring = RingBuffer::<i32>::init(usize::MAX);
        assert!(matches!(ring, Err(Error::NoMemory)));
    }

    #[test]
    fn wraps_around() {
        let ring = RingBuffer::init(2).unwrap();
        assert_eq!(Status::from(&Ok::<_, Error>(())), Status::Success);
        for round in 0..5 {
            ring.enqueue(round * 2);
            ring.enqueue(round * 2 + 1);
            assert_eq!(ring.try_enqueue(-1), Err(-1));
            assert_eq!(ring.len(), 2);
            assert_eq!(ring.dequeue(), round * 2);
            assert_eq!(ring.dequeue(), round * 2 + 1);
            assert_eq!(ring.try_dequeue(), None);
            assert!(ring.is_empty());
        }
        assert_eq!(ring.capacity(), 2);
        ring.fini();
    }
}
