//! Some utility functions that don't need to be part of the public release.

use std::sync::LockResult;
use std::time::Duration;

/// The longest timeout `poll` accepts in a single call.
pub const MAX_POLL: Duration = Duration::from_millis(i32::MAX as u64);

//Unwrap a LockResult to get the guard even when poisoned.
//
//Everything the signal lock protects lives in the kernel's pipe buffer, so a thread that panicked
//while holding it can't have left anything half-written on our side. Recovering is always fine.
//
//Source for the name: http://bulbapedia.bulbagarden.net/wiki/Guts_(Ability)
pub fn guts<T>(res: LockResult<T>) -> T {
    match res {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}

/// Converts a timeout to the millisecond argument of `poll`.
///
/// `None` becomes `-1` (block indefinitely). Partial milliseconds round *up*, so a poll never
/// returns before the requested time has passed. Anything longer than `MAX_POLL` is clamped; the
/// caller is expected to poll again for the rest.
pub fn poll_millis(timeout: Option<Duration>) -> i32 {
    let timeout = match timeout {
        Some(t) => t,
        None => return -1,
    };

    if timeout >= MAX_POLL {
        return i32::MAX;
    }

    let mut millis = timeout.as_millis();
    if timeout.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }

    // MAX_POLL check above keeps this in range, rounding included
    millis.min(i32::MAX as u128) as i32
}

/// Converts a timeout given in (possibly fractional, possibly negative) seconds.
///
/// Negative values and NaN clamp to zero, i.e. a pure poll. Positive infinity (or anything too
/// large for a `Duration`) means "no timeout".
pub fn secs_to_timeout(secs: f64) -> Option<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return Some(Duration::ZERO);
    }

    Duration::try_from_secs_f64(secs).ok()
}
