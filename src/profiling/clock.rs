//! Monotonic microsecond clock
//!
//! All instrumentation timestamps are microseconds relative to a process
//! epoch fixed the first time the clock is read. Backed by
//! `std::time::Instant`, so it never goes backwards.

use std::sync::OnceLock;
use std::time::Instant;

use crate::domain::TimestampUs;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Current monotonic time in microseconds since the process epoch.
///
/// The first call fixes the epoch; that call returns 0.
#[must_use]
pub fn now_us() -> TimestampUs {
    let epoch = *EPOCH.get_or_init(Instant::now);
    #[allow(clippy::cast_possible_truncation)]
    TimestampUs(epoch.elapsed().as_micros() as u64)
}
