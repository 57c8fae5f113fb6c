//! Low-level synchronization primitives.
//!
//! Everything here busy-waits. The sleeping primitives (mutex, semaphore) are
//! built on top of [`SpinLock`] and [`crate::thread::ParkHandle`] in the
//! project crates.

pub mod atomic;
pub mod spinlock;

pub use spinlock::{RawSpinLock, SpinLock, SpinLockGuard, WouldBlock};
