use kesync::thread::{JoinHandle, ThreadState, get_state_by_tid};

/// Wait until `handle`'s thread has gone to sleep.
pub(crate) fn wait_parked(handle: &JoinHandle) {
    while get_state_by_tid(handle.tid()) != Ok(ThreadState::Parked) {
        std::thread::yield_now();
    }
}

/// Let other threads run for a while.
fn settle() {
    for _ in 0..1000 {
        std::thread::yield_now();
    }
}

pub mod spinlock {
    use kesync::{
        sync::{RawSpinLock, SpinLock, atomic::AtomicUsize},
        thread::ThreadBuilder,
    };
    use std::sync::Arc;

    pub fn smoke() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 1000;
        let counter = Arc::new(SpinLock::new(0usize));

        let handles = (0..THREADS)
            .map(|_| {
                let counter = counter.clone();
                ThreadBuilder::new("spinner").spawn(move || {
                    for _ in 0..ROUNDS {
                        let mut guard = counter.lock();
                        *guard += 1;
                        guard.unlock();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }

        let guard = counter.lock();
        assert_eq!(*guard, THREADS * ROUNDS);
        guard.unlock();
    }

    pub fn mutual_exclusion() {
        const THREADS: usize = 8;
        let lock = Arc::new(RawSpinLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max = Arc::new(AtomicUsize::new(0));

        let handles = (0..THREADS)
            .map(|_| {
                let (lock, inside, max) = (lock.clone(), inside.clone(), max.clone());
                ThreadBuilder::new("spinner").spawn(move || {
                    for _ in 0..500 {
                        lock.acquire();
                        let now = inside.fetch_add(1) + 1;
                        max.fetch_max(now);
                        core::hint::spin_loop();
                        inside.fetch_sub(1);
                        lock.release();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }
        assert_eq!(max.load(), 1, "two threads were inside the spinlock at once");
        assert!(!lock.is_locked());
    }
}

pub mod mutex {
    use super::{settle, wait_parked};
    use kesync::{
        sync::atomic::{AtomicBool, AtomicUsize},
        thread::{ThreadBuilder, ThreadState, get_state_by_tid},
    };
    use kesync_ringbuffer::sync::Mutex;
    use std::sync::Arc;

    pub fn smoke() {
        const LENGTH: usize = 64;
        let output = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = Arc::new(AtomicUsize::new(0));

        let handles = (0..LENGTH)
            .map(|i| {
                let counter = counter.clone();
                let counter2 = counter2.clone();
                let output = output.clone();
                ThreadBuilder::new("smoker").spawn(move || {
                    counter.fetch_add(1);
                    let mut d = output.lock();
                    while counter.load() != LENGTH {
                        std::thread::yield_now();
                    }
                    d.push(i);
                    counter2.fetch_add(1);
                    d.unlock();
                })
            })
            .collect::<Vec<_>>();

        while counter2.load() != LENGTH {
            std::thread::yield_now();
        }
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }

        let mut output = output.lock();
        output.sort();
        assert_eq!(&*output, &(0..LENGTH).collect::<Vec<_>>());
        output.unlock();
    }

    pub fn smoke_many() {
        for _ in 0..20 {
            smoke()
        }
    }

    pub fn parking() {
        let mutex = Arc::new(Mutex::new(()));
        let guard = mutex.lock();
        let thread_spawned = Arc::new(AtomicBool::new(false));

        let be_parked = {
            let (thread_spawned, mutex) = (thread_spawned.clone(), mutex.clone());
            ThreadBuilder::new("blockee").spawn(move || {
                thread_spawned.store(true);
                let guard = mutex.lock();
                guard.unlock();
            })
        };

        while !thread_spawned.load() {
            core::hint::spin_loop();
        }
        wait_parked(&be_parked);
        settle();

        assert_eq!(
            get_state_by_tid(be_parked.tid()),
            Ok(ThreadState::Parked),
            "Blocked thread by Mutex should be in Parked state"
        );
        assert_eq!(mutex.waiters(), 1);

        guard.unlock();
        assert_eq!(be_parked.join(), 0);
        assert!(!mutex.is_locked());
    }

    /// Two threads race for a fresh mutex: one proceeds, the other sleeps
    /// until the first releases.
    pub fn two_threads() {
        let mutex = Arc::new(Mutex::new(0usize));
        let inside = Arc::new(AtomicUsize::new(0));
        let max = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(AtomicBool::new(false));

        let guard = mutex.lock();
        inside.fetch_add(1);
        max.fetch_max(1);

        let second = {
            let (mutex, inside, max, entered) =
                (mutex.clone(), inside.clone(), max.clone(), entered.clone());
            ThreadBuilder::new("second").spawn(move || {
                let mut guard = mutex.lock();
                entered.store(true);
                max.fetch_max(inside.fetch_add(1) + 1);
                *guard += 1;
                inside.fetch_sub(1);
                guard.unlock();
            })
        };

        wait_parked(&second);
        settle();
        assert!(!entered.load(), "second thread entered a held mutex");
        assert!(mutex.try_lock().is_err());

        inside.fetch_sub(1);
        guard.unlock();
        assert_eq!(second.join(), 0);
        assert!(entered.load());
        assert_eq!(max.load(), 1);

        let guard = mutex.lock();
        assert_eq!(*guard, 1);
        guard.unlock();
    }

    /// Waiters are resumed one per release, in the order they arrived.
    pub fn fifo_handoff() {
        const WAITERS: usize = 5;
        let mutex = Arc::new(Mutex::new(Vec::new()));
        let guard = mutex.lock();

        let mut handles = Vec::new();
        for i in 0..WAITERS {
            let mutex = mutex.clone();
            let handle = ThreadBuilder::new("waiter").spawn(move || {
                let mut order = mutex.lock();
                order.push(i);
                order.unlock();
            });
            // Serialize arrivals so queue order is known.
            wait_parked(&handle);
            handles.push(handle);
        }
        assert_eq!(mutex.waiters(), WAITERS);
        assert!(mutex.is_locked());

        guard.unlock();
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }

        assert!(!mutex.is_locked());
        assert_eq!(mutex.waiters(), 0);
        let order = mutex.lock();
        assert_eq!(&*order, &(0..WAITERS).collect::<Vec<_>>());
        order.unlock();
    }

    pub fn contention() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 500;
        let mutex = Arc::new(Mutex::new(0usize));
        let inside = Arc::new(AtomicUsize::new(0));

        let handles = (0..THREADS)
            .map(|_| {
                let (mutex, inside) = (mutex.clone(), inside.clone());
                ThreadBuilder::new("contender").spawn(move || {
                    for _ in 0..ROUNDS {
                        let mut guard = mutex.lock();
                        assert_eq!(inside.fetch_add(1), 0, "mutual exclusion violated");
                        *guard += 1;
                        inside.fetch_sub(1);
                        guard.unlock();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }

        let guard = mutex.lock();
        assert_eq!(*guard, THREADS * ROUNDS);
        guard.unlock();
    }
}

pub mod semaphore {
    use super::{settle, wait_parked};
    use kesync::{
        sync::atomic::{AtomicBool, AtomicUsize},
        thread::{ThreadBuilder, ThreadState, get_state_by_tid},
    };
    use kesync_ringbuffer::sync::{Mutex, Semaphore};
    use std::sync::Arc;

    pub fn sema_0() {
        let sema = Arc::new(Semaphore::new(0, ()));
        let is_woken_up = Arc::new(AtomicBool::new(false));

        let thread = {
            let (sema, is_woken_up) = (sema.clone(), is_woken_up.clone());
            ThreadBuilder::new("worker").spawn(move || {
                sema.wait().forget();
                is_woken_up.store(true);
            })
        };

        wait_parked(&thread);
        settle();
        assert!(!is_woken_up.load());
        assert_eq!(sema.permits(), -1);

        sema.signal();
        assert_eq!(thread.join(), 0);
        assert!(is_woken_up.load());
        assert_eq!(sema.permits(), 0);
    }

    pub fn n_permits() {
        const PERMITS: usize = 3;
        const THREADS: usize = 8;
        let sema = Arc::new(Semaphore::new(PERMITS, AtomicUsize::new(0)));
        let max = Arc::new(AtomicUsize::new(0));

        let handles = (0..THREADS)
            .map(|_| {
                let (sema, max) = (sema.clone(), max.clone());
                ThreadBuilder::new("holder").spawn(move || {
                    for _ in 0..200 {
                        let holders = sema.wait();
                        max.fetch_max(holders.fetch_add(1) + 1);
                        std::thread::yield_now();
                        holders.fetch_sub(1);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }

        assert!(max.load() <= PERMITS, "more holders than permits");
        assert!(max.load() >= 1);
        assert_eq!(sema.permits(), PERMITS as isize);
    }

    /// While the count is negative, it counts the sleepers.
    pub fn negative_count() {
        const WAITERS: usize = 3;
        let sema = Arc::new(Semaphore::new(0, ()));

        let handles = (0..WAITERS)
            .map(|_| {
                let sema = sema.clone();
                let handle = ThreadBuilder::new("sleeper").spawn(move || sema.wait().forget());
                wait_parked(&handle);
                handle
            })
            .collect::<Vec<_>>();
        assert_eq!(sema.permits(), -(WAITERS as isize));
        assert_eq!(sema.waiters(), WAITERS);

        for _ in 0..WAITERS {
            sema.signal();
        }
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }
        assert_eq!(sema.permits(), 0);
        assert_eq!(sema.waiters(), 0);
    }

    /// Each signal wakes the waiter that has waited longest.
    pub fn exec_order() {
        const WAITERS: usize = 5;
        let sema = Arc::new(Semaphore::new(0, ()));
        let order = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(AtomicUsize::new(0));

        let handles = (0..WAITERS)
            .map(|i| {
                let (sema, order, finished) = (sema.clone(), order.clone(), finished.clone());
                let handle = ThreadBuilder::new("ordered").spawn(move || {
                    sema.wait().forget();
                    let mut guard = order.lock();
                    guard.push(i);
                    guard.unlock();
                    finished.fetch_add(1);
                });
                wait_parked(&handle);
                handle
            })
            .collect::<Vec<_>>();

        for i in 0..WAITERS {
            sema.signal();
            while finished.load() != i + 1 {
                std::thread::yield_now();
            }
            let guard = order.lock();
            assert_eq!(guard[i], i, "semaphore woke waiters out of order");
            guard.unlock();
        }
        for handle in handles {
            assert_eq!(handle.join(), 0);
        }
    }

    /// Signaling one semaphore never wakes a sleeper of another.
    pub fn separate_channels() {
        let empty = Arc::new(Semaphore::new(0, ()));
        let full = Arc::new(Semaphore::new(0, ()));

        let sleeper = {
            let empty = empty.clone();
            ThreadBuilder::new("empty-waiter").spawn(move || empty.wait().forget())
        };
        wait_parked(&sleeper);

        full.signal();
        settle();
        assert_eq!(get_state_by_tid(sleeper.tid()), Ok(ThreadState::Parked));
        assert_eq!(full.permits(), 1);
        assert_eq!(empty.permits(), -1);

        empty.signal();
        assert_eq!(sleeper.join(), 0);
        assert_eq!(empty.permits(), 0);
    }
}
