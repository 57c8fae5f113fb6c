//! # kesync
//!
//! The foundation of the kesync workspace: the pieces every sleeping
//! primitive is built from.
//!
//! - [`sync::atomic`]: sequentially consistent atomics and the
//!   [`compare_and_swap`] primitive.
//! - [`sync::spinlock`]: the busy-waiting [`RawSpinLock`] and the
//!   data-carrying [`SpinLock`].
//! - [`thread`]: tracked threads and targeted, single-wake parking
//!   ([`Current::park_with`], [`ParkHandle`]).
//! - [`trace`]: subscriber setup for the `tracing` events the primitives emit.
//!
//! The blocking mutex, the counting semaphore and the ring buffer live in
//! `kesync-ringbuffer`, which only talks to the thread layer through
//! [`Current::park_with`] and [`ParkHandle::unpark`].
//!
//! [`compare_and_swap`]: sync::atomic::compare_and_swap
//! [`RawSpinLock`]: sync::RawSpinLock
//! [`SpinLock`]: sync::SpinLock
//! [`Current::park_with`]: thread::Current::park_with
//! [`ParkHandle`]: thread::ParkHandle
//! [`ParkHandle::unpark`]: thread::ParkHandle::unpark

#![deny(unsafe_op_in_unsafe_fn)]

pub mod sync;
pub mod thread;
pub mod trace;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::collections::BTreeSet;

/// Errors reported by the kesync primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No such entry. (ENOENT)
    #[error("no such entry")]
    NoSuchEntry,
    /// Out of memory. (ENOMEM)
    #[error("out of memory")]
    NoMemory,
    /// Invalid argument. (EINVAL)
    #[error("invalid argument")]
    InvalidArgument,
}

/// Integer status of an operation: 0 on success, a negative errno otherwise.
///
/// ```
/// use kesync::{Error, Status};
///
/// assert_eq!(i32::from(Status::Success), 0);
/// assert_eq!(i32::from(Error::NoMemory.status()), -12);
/// assert_eq!(Status::try_from(-22).ok(), Some(Status::InvalidArgument));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Status {
    /// The operation succeeded.
    Success = 0,
    /// See [`Error::NoSuchEntry`].
    NoSuchEntry = -2,
    /// See [`Error::NoMemory`].
    NoMemory = -12,
    /// See [`Error::InvalidArgument`].
    InvalidArgument = -22,
}

impl Error {
    /// Converts the [`Error`] into its [`Status`] code.
    pub fn status(self) -> Status {
        match self {
            Error::NoSuchEntry => Status::NoSuchEntry,
            Error::NoMemory => Status::NoMemory,
            Error::InvalidArgument => Status::InvalidArgument,
        }
    }
}

impl<T> From<&Result<T, Error>> for Status {
    fn from(result: &Result<T, Error>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }
}

// Test utilities
#[doc(hidden)]
pub trait TestCase
where
    Self: Sync + Send,
{
    fn name(&'static self) -> &'static str;
    fn run(&'static self) -> bool;
}

impl<T> TestCase for T
where
    T: Fn() + Send + Sync + 'static,
{
    fn name(&'static self) -> &'static str {
        core::any::type_name::<T>()
    }
    fn run(&'static self) -> bool {
        print!("test {} ... ", self.name());
        if thread::ThreadBuilder::new(self.name()).spawn(self).join() == 0 {
            println!("ok");
            true
        } else {
            println!("FAILED");
            false
        }
    }
}

/// A driver for running tests.
pub struct TestDriver;

impl TestDriver {
    /// Run the given tests, each on its own thread, and report whether all of
    /// them passed.
    ///
    /// Test names given on the command line (without the crate prefix,
    /// separated by spaces) restrict the run to those tests.
    pub fn start<const TC: usize>(tests: [&'static dyn TestCase; TC]) -> bool {
        trace::init_tracing();
        let filter = std::env::args()
            .skip(1)
            .flat_map(|arg| arg.split(' ').map(str::to_owned).collect::<Vec<_>>())
            .filter(|arg| !arg.is_empty())
            .collect::<BTreeSet<_>>();
        let tests = tests
            .iter()
            .filter(|test| {
                if filter.is_empty() {
                    return true;
                }
                let name = test.name();
                let r = name.split("::").next().map(|n| n.len() + 2).unwrap_or(0);
                name.get(r..).is_some_and(|short| filter.contains(short))
            })
            .collect::<Vec<_>>();

        let (total, mut succ) = (tests.len(), 0);
        println!(
            "Running {} test{}",
            total,
            if total == 1 { "" } else { "s" }
        );
        for test in tests {
            if test.run() {
                succ += 1;
            }
        }
        println!(
            "test result: {}. {} passed; {} failed",
            if total == succ { "ok" } else { "FAILED" },
            succ,
            total - succ
        );
        total == succ
    }
}
