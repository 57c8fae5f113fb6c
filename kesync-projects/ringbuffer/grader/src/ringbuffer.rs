use crate::sync::wait_parked;
use kesync::{
    Error, Status,
    sync::atomic::{AtomicBool, AtomicUsize},
    thread::ThreadBuilder,
};
use kesync_ringbuffer::{RingBuffer, sync::Mutex};
use std::sync::Arc;

pub fn init_status() {
    let ring = RingBuffer::<i32>::init(0);
    assert!(matches!(ring, Err(Error::InvalidArgument)));
    assert_eq!(i32::from(Status::from(&ring)), -22);

    let ring = RingBuffer::<i32>::init(4);
    assert_eq!(i32::from(Status::from(&ring)), 0);
    let ring = ring.unwrap();
    assert_eq!(ring.capacity(), 4);
    assert!(ring.is_empty());
    ring.fini();
}

/// Single producer, single consumer: values come out in the order they went
/// in.
pub fn fifo() {
    const COUNT: i32 = 10000;
    let ring = Arc::new(RingBuffer::init(8).unwrap());

    let producer = {
        let ring = ring.clone();
        ThreadBuilder::new("producer").spawn(move || {
            for i in 0..COUNT {
                ring.enqueue(i);
            }
        })
    };
    for expected in 0..COUNT {
        assert_eq!(ring.dequeue(), expected);
        assert!(ring.len() <= ring.capacity());
    }
    assert_eq!(producer.join(), 0);
    assert!(ring.is_empty());
}

/// Capacity 3: three enqueues fit, the fourth sleeps until a dequeue frees
/// a slot.
pub fn full_buffer_blocks() {
    let ring = Arc::new(RingBuffer::init(3).unwrap());
    for i in 1..=3 {
        ring.enqueue(i);
    }
    assert_eq!(ring.len(), 3);

    let done = Arc::new(AtomicBool::new(false));
    let fourth = {
        let (ring, done) = (ring.clone(), done.clone());
        ThreadBuilder::new("fourth").spawn(move || {
            ring.enqueue(4);
            done.store(true);
        })
    };
    wait_parked(&fourth);
    assert!(!done.load(), "enqueue into a full buffer returned");

    assert_eq!(ring.dequeue(), 1);
    assert_eq!(fourth.join(), 0);
    assert!(done.load());

    assert_eq!(ring.dequeue(), 2);
    assert_eq!(ring.dequeue(), 3);
    assert_eq!(ring.dequeue(), 4);
    assert!(ring.is_empty());
}

/// Capacity 1: a second producer sleeps until the consumer takes the first
/// value.
pub fn capacity_one() {
    let ring = Arc::new(RingBuffer::init(1).unwrap());
    ring.enqueue(10);

    let second = {
        let ring = ring.clone();
        ThreadBuilder::new("second-producer").spawn(move || ring.enqueue(20))
    };
    wait_parked(&second);
    assert_eq!(ring.len(), 1);
    assert_eq!(ring.try_enqueue(30), Err(30));

    assert_eq!(ring.dequeue(), 10);
    assert_eq!(second.join(), 0);
    assert_eq!(ring.dequeue(), 20);
    assert_eq!(ring.try_dequeue(), None);
}

/// A consumer sleeping on an empty buffer is woken by the next enqueue.
pub fn empty_buffer_wakes() {
    let ring = Arc::new(RingBuffer::init(4).unwrap());
    let got = Arc::new(AtomicUsize::new(0));

    let consumer = {
        let (ring, got) = (ring.clone(), got.clone());
        ThreadBuilder::new("consumer").spawn(move || {
            got.store(ring.dequeue());
        })
    };
    wait_parked(&consumer);
    assert_eq!(got.load(), 0);

    ring.enqueue(42usize);
    assert_eq!(consumer.join(), 0);
    assert_eq!(got.load(), 42);
}

/// Many producers and consumers: nothing lost, nothing duplicated, and no
/// more values taken than put.
pub fn many_producers_consumers() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_THREAD: usize = 1000;
    let ring = Arc::new(RingBuffer::<usize>::init(5).unwrap());
    let enqueued = Arc::new(AtomicUsize::new(0));
    let dequeued = Arc::new(AtomicUsize::new(0));
    let output = Arc::new(Mutex::new(Vec::new()));

    let producers = (0..PRODUCERS)
        .map(|p| {
            let (ring, enqueued) = (ring.clone(), enqueued.clone());
            ThreadBuilder::new("producer").spawn(move || {
                for i in 0..PER_THREAD {
                    enqueued.fetch_add(1);
                    ring.enqueue(p * PER_THREAD + i);
                }
            })
        })
        .collect::<Vec<_>>();

    let consumers = (0..CONSUMERS)
        .map(|_| {
            let (ring, enqueued, dequeued, output) =
                (ring.clone(), enqueued.clone(), dequeued.clone(), output.clone());
            ThreadBuilder::new("consumer").spawn(move || {
                let mut mine = Vec::with_capacity(PER_THREAD * PRODUCERS / CONSUMERS);
                for _ in 0..PER_THREAD * PRODUCERS / CONSUMERS {
                    mine.push(ring.dequeue());
                    let taken = dequeued.fetch_add(1) + 1;
                    assert!(taken <= enqueued.load(), "dequeued more than enqueued");
                    assert!(ring.len() <= ring.capacity());
                }
                let mut guard = output.lock();
                guard.extend(mine);
                guard.unlock();
            })
        })
        .collect::<Vec<_>>();

    for handle in producers.into_iter().chain(consumers) {
        assert_eq!(handle.join(), 0);
    }

    let mut guard = output.lock();
    guard.sort_unstable();
    assert_eq!(&*guard, &(0..PRODUCERS * PER_THREAD).collect::<Vec<_>>());
    guard.unlock();
    assert!(ring.is_empty());
}
