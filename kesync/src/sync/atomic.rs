//! A wrapper around the core::sync::atomic.
//!
//! # Atomic types
//!
//! Atomic types provide primitive shared-memory communication between
//! threads, and are the building blocks of other concurrent types. Every
//! primitive in this workspace, from the [`RawSpinLock`] up to the ring
//! buffer, bottoms out in one of the read-modify-write operations below.
//!
//! This module defines a wrapper to the atomic types defined in
//! [`core::sync::atomic`]: [`AtomicBool`] and [`AtomicUsize`]. All operations
//! are sequentially consistent, so the wrappers take no [`Ordering`] argument.
//!
//! Atomic variables are safe to share between threads (they implement
//! [`Sync`]) but they do not themselves provide the mechanism for sharing. The
//! most common way to share an atomic variable is to put it into an
//! [`Arc`][arc] (an atomically-reference-counted shared pointer).
//!
//! [arc]: std::sync::Arc
//! [`RawSpinLock`]: crate::sync::RawSpinLock

use core::sync::atomic::Ordering;

/// A boolean type which can be safely shared between threads.
///
/// This type has the same size, alignment, and bit validity as a [`bool`].
#[derive(Default, Debug)]
pub struct AtomicBool(core::sync::atomic::AtomicBool);

impl AtomicBool {
    /// Creates a new `AtomicBool`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kesync::sync::atomic::AtomicBool;
    ///
    /// let atomic_true = AtomicBool::new(true);
    /// let atomic_false = AtomicBool::new(false);
    /// ```
    #[inline]
    #[must_use]
    pub const fn new(v: bool) -> AtomicBool {
        Self(core::sync::atomic::AtomicBool::new(v))
    }

    /// Loads a value from the bool.
    #[inline]
    pub fn load(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Stores a value into the bool.
    #[inline]
    pub fn store(&self, val: bool) {
        self.0.store(val, Ordering::SeqCst)
    }

    /// Stores a value into the [`bool`] if the current value is the same as the
    /// `current` value.
    ///
    /// The return value is a result indicating whether the new value was
    /// written and containing the previous value. On success this value is
    /// guaranteed to be equal to `current`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kesync::sync::atomic::AtomicBool;
    ///
    /// let some_bool = AtomicBool::new(true);
    ///
    /// assert_eq!(some_bool.compare_exchange(true, false), Ok(true));
    /// assert_eq!(some_bool.load(), false);
    ///
    /// assert_eq!(some_bool.compare_exchange(true, true), Err(false));
    /// assert_eq!(some_bool.load(), false);
    /// ```
    #[inline]
    pub fn compare_exchange(&self, current: bool, new: bool) -> Result<bool, bool> {
        self.0
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
    }
}

macro_rules! atomic_int {
    ($(#[$meta:meta])* $name:ident, $int:ty) => {
        $(#[$meta])*
        #[derive(Default, Debug)]
        pub struct $name(core::sync::atomic::$name);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`.")]
            #[inline]
            #[must_use]
            pub const fn new(v: $int) -> Self {
                Self(core::sync::atomic::$name::new(v))
            }

            /// Loads a value from the atomic integer.
            #[inline]
            pub fn load(&self) -> $int {
                self.0.load(Ordering::SeqCst)
            }

            /// Stores a value into the atomic integer.
            #[inline]
            pub fn store(&self, val: $int) {
                self.0.store(val, Ordering::SeqCst)
            }

            /// Adds to the current value, returning the previous value.
            ///
            /// This operation wraps around on overflow.
            #[inline]
            pub fn fetch_add(&self, val: $int) -> $int {
                self.0.fetch_add(val, Ordering::SeqCst)
            }

            /// Subtracts from the current value, returning the previous value.
            ///
            /// This operation wraps around on overflow.
            #[inline]
            pub fn fetch_sub(&self, val: $int) -> $int {
                self.0.fetch_sub(val, Ordering::SeqCst)
            }

            /// Maximum with the current value, returning the previous value.
            #[inline]
            pub fn fetch_max(&self, val: $int) -> $int {
                self.0.fetch_max(val, Ordering::SeqCst)
            }
        }
    };
}

atomic_int!(
    /// An integer type which can be safely shared between threads.
    ///
    /// This type has the same size and bit validity as the underlying integer
    /// type, [`usize`].
    AtomicUsize,
    usize
);

/// Atomically replaces `old` with `new` in `word`.
///
/// Returns `true` if `word` held `old` and now holds `new`, and `false` if
/// another value was observed (in which case `word` is left untouched). This is
/// the one hardware primitive the spinlock is built on.
///
/// # Examples
///
/// ```
/// use kesync::sync::atomic::{AtomicBool, compare_and_swap};
///
/// let held = AtomicBool::new(false);
/// assert!(compare_and_swap(&held, false, true));
/// assert!(!compare_and_swap(&held, false, true));
/// ```
#[inline]
pub fn compare_and_swap(word: &AtomicBool, old: bool, new: bool) -> bool {
    word.compare_exchange(old, new).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_only_succeeds_from_expected() {
        let word = AtomicBool::new(false);
        assert!(compare_and_swap(&word, false, true));
        assert!(word.load());
        assert!(!compare_and_swap(&word, false, true));
        assert!(compare_and_swap(&word, true, false));
        assert!(!word.load());
    }

    #[test]
    fn counter_tracks_max() {
        let count = AtomicUsize::new(1);
        assert_eq!(count.fetch_add(2), 1);
        assert_eq!(count.fetch_sub(1), 3);
        assert_eq!(count.fetch_max(5), 2);
        assert_eq!(count.fetch_max(4), 5);
        count.store(0);
        assert_eq!(count.load(), 0);
    }
}
