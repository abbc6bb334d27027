//! Per-client admission control.
//!
//! A [`RateLimiter`] keeps one token bucket per client key, answers
//! [`RateLimiter::allow`] on the request path and evicts idle keys from a
//! background sweeper task so memory stays bounded.
//!
//! ```no_run
//! # async fn demo() -> admission_core::Result<()> {
//! use admission_core::RateLimiter;
//!
//! let limiter = RateLimiter::new(10.0, 20.0)?;
//! if !limiter.allow("203.0.113.7") {
//!     // reject with 429
//! }
//! limiter.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod global;
pub mod rate_limiter;

pub use config::LimiterConfig;
pub use error::{LimiterError, Result};
pub use rate_limiter::{AllowResult, BucketStats, RateLimited, RateLimiter};
