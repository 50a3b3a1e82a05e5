//! TSC clock for cheap receive timestamps and call-duration measurement.

use once_cell::sync::Lazy;
use quanta::Clock;

/// Global TSC clock - zero syscall timestamp reads
pub static CLOCK: Lazy<Clock> = Lazy::new(Clock::new);

/// Get current TSC timestamp (zero syscalls)
#[inline]
pub fn now_tsc() -> u64 {
    CLOCK.raw()
}
