//! Tracing setup.
//!
//! The primitives emit `tracing` events (park/unpark at `trace`, lifecycle at
//! `debug`). Nothing is printed until a subscriber is installed with
//! [`init_tracing`].

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `kesync=info`).
///
/// Call this at the start of a test driver or binary. Calling it again, or
/// after another subscriber was installed, does nothing.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kesync=info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}
