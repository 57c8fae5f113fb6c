//! # Sleeping synchronization primitives.
//!
//! [`SpinLock`] gives correct mutual exclusion by repeatedly checking for lock
//! availability, but it wastes CPU cycles under contention. The primitives in
//! this module put a waiting thread to sleep instead, and wake exactly one
//! sleeper, in arrival order, per release.
//!
//! | Primitive     | Blocks Thread? | Fair?      | Typical Use Case                         |
//! |---------------|----------------|------------|------------------------------------------|
//! | [`SpinLock`]  | No (busy wait) | No         | Short, uncontended bookkeeping           |
//! | [`Mutex`]     | Yes            | Yes (FIFO) | Exclusive access to shared data          |
//! | [`Semaphore`] | Yes            | Yes (FIFO) | Limiting access to a bounded resource    |
//!
//! Both are built the same way: a count and a [`WaitQueue`] behind one
//! internal [`SpinLock`], with [`Current::park_with`] closing the window
//! between "decided to sleep" and "registered as a sleeper".
//!
//! [`SpinLock`]: kesync::sync::SpinLock
//! [`Current::park_with`]: kesync::thread::Current::park_with

pub mod mutex;
pub mod semaphore;
pub mod waiter;

pub use mutex::*;
pub use semaphore::*;
pub use waiter::*;
