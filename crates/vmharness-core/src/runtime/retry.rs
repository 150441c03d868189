// crates/vmharness-core/src/runtime/retry.rs
// ============================================================================
// Module: VM Harness Retry Combinators
// Description: Bounded polling helpers for eventually consistent checks.
// Purpose: Let test bodies wait for remote state without ad hoc loops.
// Dependencies: std
// ============================================================================

//! ## Overview
//! All combinators sleep a fixed interval between attempts (no backoff) and
//! never sleep after the final attempt. Sleeps are not interruptible;
//! cancellation is the caller's concern. When every attempt fails, the error
//! from the last attempt is returned unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Combinators
// ============================================================================

/// Calls `probe` up to `attempts` times, sleeping `interval` between calls.
///
/// Returns `Ok(())` on the first success. With zero attempts the probe is never
/// called and the result is `Ok(())`.
///
/// # Errors
///
/// Returns the error from the final attempt when every attempt fails.
pub fn retry<E>(
    attempts: u32,
    interval: Duration,
    probe: impl FnMut() -> Result<(), E>,
) -> Result<(), E> {
    retry_conditional(attempts, interval, probe, |_| true)
}

/// Like [`retry`], but stops early when `should_retry` rejects an error.
///
/// # Errors
///
/// Returns the first non-retryable error, or the final error when every
/// attempt fails.
pub fn retry_conditional<E>(
    attempts: u32,
    interval: Duration,
    mut probe: impl FnMut() -> Result<(), E>,
    mut should_retry: impl FnMut(&E) -> bool,
) -> Result<(), E> {
    for attempt in 1 ..= attempts {
        match probe() {
            Ok(()) => return Ok(()),
            Err(err) if attempt == attempts || !should_retry(&err) => return Err(err),
            Err(_) => thread::sleep(interval),
        }
    }
    Ok(())
}

/// Calls `probe` until it succeeds or `timeout` elapses.
///
/// The probe is always called at least once. No sleep starts once the next
/// attempt would begin after the deadline. A timeout too large to represent
/// as an instant never expires; an interval that large ends polling after
/// the first failure.
///
/// # Errors
///
/// Returns the error from the last attempt made before the deadline.
pub fn retry_until<E>(
    timeout: Duration,
    interval: Duration,
    mut probe: impl FnMut() -> Result<(), E>,
) -> Result<(), E> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match probe() {
            Ok(()) => return Ok(()),
            Err(err) => {
                let expired = match (deadline, Instant::now().checked_add(interval)) {
                    (_, None) => true,
                    (None, Some(_)) => false,
                    (Some(deadline), Some(next)) => next > deadline,
                };
                if expired {
                    return Err(err);
                }
                thread::sleep(interval);
            }
        }
    }
}
