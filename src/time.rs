//! Monotonic millisecond time.
//!
//! The tick counter is a wrapping `u32` (about 50 days per lap). Interval
//! math is always `now - past` with wrapping subtraction, which yields the
//! right small number even across the wrap.
//!
//! The intervals the crate cares about are short: things happen repeatedly
//! under normal circumstances, and a long silence is handled by scheduling a
//! fresh introduction event rather than by comparing huge intervals. So the
//! fact that a wrapped interval *could* look weird is of no consequence.

/// Milliseconds since boot, wrapping.
pub type Timestamp = u32;

/// A span of milliseconds.
pub type Duration = u32;

/// Length of the interval between `past` and `now`, if `past` is known.
///
/// Wrap-safe: underflow in the subtraction is the mechanism, not a bug.
pub fn since(now: Timestamp, past: Option<Timestamp>) -> Option<Duration> {
    past.map(|past| now.wrapping_sub(past))
}
