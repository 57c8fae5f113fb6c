//! Thread bookkeeping and targeted parking.
//!
//! The sleeping primitives need one thing from the thread layer: a way to put
//! the *current* thread to sleep and hand somebody else a handle that wakes
//! exactly that thread, exactly once. [`Current::park_with`] provides it.
//!
//! ```text
//!  waiter                                   waker
//!  ------                                   -----
//!  lock primitive's spinlock
//!  Current::park_with(ch, |handle| {
//!      queue.push_back(handle);
//!      unlock spinlock;          ------>    lock spinlock
//!  });                                      handle = queue.pop_front()
//!  (suspended until token delivered)        unlock spinlock
//!                                <------    handle.unpark()
//!  returns
//! ```
//!
//! Every park creates a fresh single-permit wake token. The waker sets the
//! token *before* resuming the OS thread and the sleeper re-checks the token
//! after every resume, so a wake that lands between "registered in the queue"
//! and "actually asleep" is never lost, and spurious OS wakeups are ignored.
//!
//! Threads spawned through [`ThreadBuilder`] are visible through
//! [`get_state_by_tid`] until joined, which is how tests observe that a thread
//! really is parked instead of spinning. Any other thread is registered the
//! first time it parks or asks for its id, and drops out when it exits.

use crate::{
    Error,
    sync::{SpinLock, atomic::AtomicUsize},
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::{cell::OnceCell, collections::BTreeMap, num::NonZeroUsize, sync::Arc};

/// The scheduling state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum ThreadState {
    /// The thread is running or ready to run.
    Runnable,
    /// The thread is suspended inside [`Current::park_with`].
    Parked,
    /// The thread has finished, either normally or by panicking.
    Exited,
}

struct ThreadInfo {
    tid: u64,
    name: String,
    state: AtomicUsize,
}

impl ThreadInfo {
    fn new(name: String) -> Arc<Self> {
        static NEXT_TID: AtomicUsize = AtomicUsize::new(1);
        Arc::new(Self {
            tid: NEXT_TID.fetch_add(1) as u64,
            name,
            state: AtomicUsize::new(ThreadState::Runnable.into()),
        })
    }

    fn state(&self) -> ThreadState {
        ThreadState::try_from(self.state.load()).unwrap_or(ThreadState::Exited)
    }

    fn set_state(&self, state: ThreadState) {
        self.state.store(state.into());
    }
}

static THREADS: SpinLock<BTreeMap<u64, Arc<ThreadInfo>>> = SpinLock::new(BTreeMap::new());

// The calling thread's entry. Threads that were not spawned by `ThreadBuilder`
// are adopted on first use and leave the registry when their thread-locals are
// torn down; builder threads stay until joined.
struct Registration {
    info: Arc<ThreadInfo>,
    adopted: bool,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.adopted {
            self.info.set_state(ThreadState::Exited);
            unregister(self.info.tid);
        }
    }
}

thread_local! {
    static CURRENT: OnceCell<Registration> = const { OnceCell::new() };
}

fn register(info: &Arc<ThreadInfo>) {
    let mut threads = THREADS.lock();
    threads.insert(info.tid, info.clone());
    threads.unlock();
}

fn unregister(tid: u64) {
    let mut threads = THREADS.lock();
    threads.remove(&tid);
    threads.unlock();
}

fn with_current<R>(f: impl FnOnce(&Arc<ThreadInfo>) -> R) -> R {
    CURRENT.with(|cell| {
        let current = cell.get_or_init(|| {
            let name = std::thread::current().name().unwrap_or("<unnamed>").to_owned();
            let info = ThreadInfo::new(name);
            register(&info);
            Registration {
                info,
                adopted: true,
            }
        });
        f(&current.info)
    })
}

/// Get the state of the thread whose id is `tid`.
///
/// # Errors
///
/// Returns [`Error::NoSuchEntry`] if no live thread has that id, or if it has
/// already been joined.
pub fn get_state_by_tid(tid: u64) -> Result<ThreadState, Error> {
    let threads = THREADS.lock();
    let state = threads.get(&tid).map(|info| info.state());
    threads.unlock();
    state.ok_or(Error::NoSuchEntry)
}

/// Identifies the primitive a parked thread is waiting on.
///
/// Every mutex and semaphore allocates its own channel, so a wake delivered on
/// behalf of one primitive can never resume a thread parked on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeChannel(NonZeroUsize);

impl WakeChannel {
    /// Allocates a process-unique channel.
    pub fn allocate() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(1);
        let id = NEXT.fetch_add(1);
        // The counter starts at one and would take centuries to wrap.
        Self(NonZeroUsize::new(id).unwrap_or(NonZeroUsize::MIN))
    }

    /// The numeric id of this channel.
    pub fn id(self) -> usize {
        self.0.get()
    }
}

struct WakeToken {
    thread: std::thread::Thread,
    // 0 until delivered, then the id of the delivering channel.
    delivered: AtomicUsize,
}

/// A handle to wake up one parked thread.
///
/// Created by [`Current::park_with`] and consumed by [`ParkHandle::unpark`], so
/// each park is matched by at most one wake.
pub struct ParkHandle {
    token: Arc<WakeToken>,
    channel: WakeChannel,
    th: Arc<ThreadInfo>,
}

impl ParkHandle {
    /// Consume the handle and unpark the underlying thread.
    pub fn unpark(self) {
        tracing::trace!(
            tid = self.th.tid,
            thread = %self.th.name,
            channel = self.channel.id(),
            "unpark"
        );
        self.th.set_state(ThreadState::Runnable);
        self.token.delivered.store(self.channel.id());
        self.token.thread.unpark();
    }

    /// The id of the thread this handle wakes.
    pub fn tid(&self) -> u64 {
        self.th.tid
    }

    /// The channel this handle delivers on.
    pub fn channel(&self) -> WakeChannel {
        self.channel
    }
}

impl core::fmt::Debug for ParkHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ParkHandle")
            .field("tid", &self.th.tid)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Operations on the calling thread.
pub struct Current;

impl Current {
    /// Run a function `f` with [`ParkHandle`] for current thread, and then park
    /// the current thread until the handle is unparked.
    ///
    /// `f` is where the caller publishes the handle (typically by pushing it
    /// to a waiter queue) and releases whatever spinlock protected that queue.
    /// Holding a spinlock past `f` would deadlock the waker.
    pub fn park_with(channel: WakeChannel, f: impl FnOnce(ParkHandle)) {
        let th = with_current(Arc::clone);
        let token = Arc::new(WakeToken {
            thread: std::thread::current(),
            delivered: AtomicUsize::new(0),
        });
        th.set_state(ThreadState::Parked);
        tracing::trace!(tid = th.tid, channel = channel.id(), "park");

        f(ParkHandle {
            token: token.clone(),
            channel,
            th: th.clone(),
        });

        loop {
            match token.delivered.load() {
                0 => std::thread::park(),
                by => {
                    debug_assert_eq!(by, channel.id(), "wake delivered on a foreign channel");
                    break;
                }
            }
        }
        th.set_state(ThreadState::Runnable);
    }

    /// Get the current thread's id.
    pub fn get_tid() -> u64 {
        with_current(|th| th.tid)
    }

    /// Get the current thread's name.
    pub fn get_name() -> String {
        with_current(|th| th.name.clone())
    }
}

/// A builder for spawning a named, tracked thread.
pub struct ThreadBuilder {
    name: String,
}

impl ThreadBuilder {
    /// Create a new builder for a thread called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Spawn the thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread, like [`std::thread::spawn`].
    pub fn spawn<F: FnOnce() + Send + 'static>(self, thread_fn: F) -> JoinHandle {
        let th = ThreadInfo::new(self.name.clone());
        register(&th);

        struct ExitGuard(Arc<ThreadInfo>);
        impl Drop for ExitGuard {
            fn drop(&mut self) {
                self.0.set_state(ThreadState::Exited);
            }
        }

        let child = th.clone();
        let inner = std::thread::Builder::new()
            .name(self.name)
            .spawn(move || {
                let _exit = ExitGuard(child.clone());
                CURRENT.with(|cell| {
                    let _ = cell.set(Registration {
                        info: child,
                        adopted: false,
                    });
                });
                thread_fn()
            })
            .unwrap_or_else(|e| panic!("failed to spawn thread: {e}"));
        JoinHandle { th, inner }
    }
}

/// A handle to join a thread spawned by [`ThreadBuilder`].
pub struct JoinHandle {
    th: Arc<ThreadInfo>,
    inner: std::thread::JoinHandle<()>,
}

impl JoinHandle {
    /// The id of the spawned thread.
    pub fn tid(&self) -> u64 {
        self.th.tid
    }

    /// The current state of the spawned thread.
    pub fn state(&self) -> ThreadState {
        self.th.state()
    }

    /// Whether the thread has finished running.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the thread to finish, returning its exit code: 0 when the
    /// thread function returned and 1 when it panicked.
    pub fn join(self) -> i32 {
        let code = match self.inner.join() {
            Ok(()) => 0,
            Err(_) => 1,
        };
        unregister(self.th.tid);
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::atomic::AtomicBool;

    fn wait_for_state(tid: u64, want: ThreadState) {
        while get_state_by_tid(tid) != Ok(want) {
            std::thread::yield_now();
        }
    }

    #[test]
    fn park_then_unpark() {
        let slot = Arc::new(SpinLock::new(None::<ParkHandle>));
        let woken = Arc::new(AtomicBool::new(false));
        let channel = WakeChannel::allocate();

        let sleeper = {
            let (slot, woken) = (slot.clone(), woken.clone());
            ThreadBuilder::new("sleeper").spawn(move || {
                let guard = slot.lock();
                Current::park_with(channel, move |handle| {
                    let mut guard = guard;
                    *guard = Some(handle);
                    guard.unlock();
                });
                woken.store(true);
            })
        };

        wait_for_state(sleeper.tid(), ThreadState::Parked);
        let handle = loop {
            let mut guard = slot.lock();
            let handle = guard.take();
            guard.unlock();
            if let Some(handle) = handle {
                break handle;
            }
        };
        assert_eq!(handle.tid(), sleeper.tid());
        assert_eq!(handle.channel(), channel);
        assert!(!woken.load());
        handle.unpark();
        assert_eq!(sleeper.join(), 0);
        assert!(woken.load());
    }

    #[test]
    fn wake_before_sleep_is_not_lost() {
        // Unpark from inside the registration closure, before the thread
        // suspends.
        Current::park_with(WakeChannel::allocate(), ParkHandle::unpark);
    }

    #[test]
    fn joined_threads_are_forgotten() {
        let handle = ThreadBuilder::new("short").spawn(|| {});
        let tid = handle.tid();
        assert_eq!(handle.join(), 0);
        assert_eq!(get_state_by_tid(tid), Err(Error::NoSuchEntry));
    }

    #[test]
    fn adopted_threads_leave_on_exit() {
        let tids = (0..16)
            .map(|_| std::thread::spawn(Current::get_tid))
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();
        for tid in tids {
            assert_eq!(get_state_by_tid(tid), Err(Error::NoSuchEntry));
        }
    }

    #[test]
    fn adopted_thread_is_visible_while_alive() {
        let (tx, rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            tx.send(Current::get_tid()).unwrap();
            done_rx.recv().unwrap();
        });
        let tid = rx.recv().unwrap();
        assert_eq!(get_state_by_tid(tid), Ok(ThreadState::Runnable));
        done_tx.send(()).unwrap();
        worker.join().unwrap();
        assert_eq!(get_state_by_tid(tid), Err(Error::NoSuchEntry));
    }

    #[test]
    fn panics_become_exit_code() {
        let handle = ThreadBuilder::new("boom").spawn(|| panic!("boom"));
        assert_eq!(handle.join(), 1);
    }

    #[test]
    fn channels_are_unique() {
        assert_ne!(WakeChannel::allocate(), WakeChannel::allocate());
    }
}
