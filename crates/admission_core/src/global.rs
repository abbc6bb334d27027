//! Process-wide default limiter.
//!
//! Convenience for callers that have nowhere to inject a [`RateLimiter`].
//! Prefer constructing and passing one explicitly.

use std::sync::OnceLock;

use crate::error::Result;
use crate::rate_limiter::RateLimiter;

pub const DEFAULT_RATE: f64 = 10.0;
pub const DEFAULT_CAPACITY: f64 = 20.0;

static DEFAULT: OnceLock<RateLimiter> = OnceLock::new();

/// Returns the shared limiter, building it on first use.
///
/// The first call must happen inside a Tokio runtime, and the idle sweeper
/// stays bound to that runtime for the life of the process. Make the first
/// call from the application's main runtime, not from a short-lived one;
/// [`RateLimiter::is_running`] turns false if that runtime goes away.
pub fn limiter() -> Result<&'static RateLimiter> {
    if let Some(limiter) = DEFAULT.get() {
        return Ok(limiter);
    }
    let candidate = RateLimiter::new(DEFAULT_RATE, DEFAULT_CAPACITY)?;
    // a losing candidate is dropped here, which stops its sweeper
    Ok(DEFAULT.get_or_init(move || candidate))
}

/// Stops the shared limiter's sweeper if it was ever built.
pub fn shutdown() {
    if let Some(limiter) = DEFAULT.get() {
        limiter.shutdown();
    }
}
