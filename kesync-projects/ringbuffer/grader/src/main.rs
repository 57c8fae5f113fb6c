// Grading driver for kesync-ringbuffer.
//
// `cargo run -p ringbuffer-grader [test names...]` runs the suite through the
// `TestDriver`; `cargo test` runs the same cases as ordinary tests.

mod ringbuffer;
mod sync;

fn main() {
    let ok = kesync::TestDriver::start([
        // Spinlock.
        &sync::spinlock::smoke,
        &sync::spinlock::mutual_exclusion,
        // Mutex.
        &sync::mutex::smoke,
        &sync::mutex::parking,
        &sync::mutex::smoke_many,
        &sync::mutex::two_threads,
        &sync::mutex::fifo_handoff,
        &sync::mutex::contention,
        // Semaphore.
        &sync::semaphore::sema_0,
        &sync::semaphore::n_permits,
        &sync::semaphore::negative_count,
        &sync::semaphore::exec_order,
        &sync::semaphore::separate_channels,
        // Ring buffer.
        &ringbuffer::init_status,
        &ringbuffer::fifo,
        &ringbuffer::full_buffer_blocks,
        &ringbuffer::capacity_one,
        &ringbuffer::empty_buffer_wakes,
        &ringbuffer::many_producers_consumers,
    ]);
    if !ok {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    macro_rules! grade {
        ($($name:ident => $case:path),* $(,)?) => {
            $(
                #[test]
                fn $name() {
                    $case()
                }
            )*
        };
    }

    grade! {
        spinlock_smoke => crate::sync::spinlock::smoke,
        spinlock_mutual_exclusion => crate::sync::spinlock::mutual_exclusion,
        mutex_smoke => crate::sync::mutex::smoke,
        mutex_parking => crate::sync::mutex::parking,
        mutex_smoke_many => crate::sync::mutex::smoke_many,
        mutex_two_threads => crate::sync::mutex::two_threads,
        mutex_fifo_handoff => crate::sync::mutex::fifo_handoff,
        mutex_contention => crate::sync::mutex::contention,
        semaphore_sema_0 => crate::sync::semaphore::sema_0,
        semaphore_n_permits => crate::sync::semaphore::n_permits,
        semaphore_negative_count => crate::sync::semaphore::negative_count,
        semaphore_exec_order => crate::sync::semaphore::exec_order,
        semaphore_separate_channels => crate::sync::semaphore::separate_channels,
        ringbuffer_init_status => crate::ringbuffer::init_status,
        ringbuffer_fifo => crate::ringbuffer::fifo,
        ringbuffer_full_buffer_blocks => crate::ringbuffer::full_buffer_blocks,
        ringbuffer_capacity_one => crate::ringbuffer::capacity_one,
        ringbuffer_empty_buffer_wakes => crate::ringbuffer::empty_buffer_wakes,
        ringbuffer_many_producers_consumers => crate::ringbuffer::many_producers_consumers,
    }
}
