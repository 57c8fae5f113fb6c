//! # Bounded ring buffer over sleeping primitives.
//!
//! This crate builds, on top of `kesync`'s spinlock and parking layer:
//!
//! 1. [`sync::Mutex`]: a sleeping mutex with FIFO hand-off.
//! 2. [`sync::Semaphore`]: a counting semaphore with FIFO wakeups.
//! 3. [`RingBuffer`]: a fixed-capacity circular buffer shared by any number of
//!    producer and consumer threads, coordinated by two semaphores and one
//!    mutex.
//!
//! ```
//! use std::sync::Arc;
//! use kesync::thread::ThreadBuilder;
//! use kesync_ringbuffer::RingBuffer;
//!
//! let ring = Arc::new(RingBuffer::<i32>::init(2).unwrap());
//! let producer = {
//!     let ring = ring.clone();
//!     ThreadBuilder::new("producer").spawn(move || {
//!         for i in 0..10 {
//!             ring.enqueue(i);
//!         }
//!     })
//! };
//! let received: Vec<_> = (0..10).map(|_| ring.dequeue()).collect();
//! assert_eq!(producer.join(), 0);
//! assert_eq!(received, (0..10).collect::<Vec<_>>());
//! ```

pub mod ringbuffer;
pub mod sync;

pub use ringbuffer::RingBuffer;
