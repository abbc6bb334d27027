use std::time::Duration;

use tokio::time::Instant;

use crate::config::LimiterConfig;
use crate::rate_limiter::decision::AllowResult;

/// Continuous-refill token bucket.
///
/// Policy (rate, capacity) lives in [`LimiterConfig`] and is passed in, so a
/// bucket only carries its own balance and timestamp.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    pub fn full(config: &LimiterConfig, now: Instant) -> Self {
        Self {
            tokens: config.capacity,
            last_update: now,
        }
    }

    /// Bucket for a key seen for the first time, with its first request
    /// already admitted.
    ///
    /// A fresh bucket starts full and pays for the request it was created
    /// for, leaving `capacity - 1`; it does not keep the full `capacity`
    /// after admitting. With `capacity < 1` the request is still admitted
    /// and the balance clamps at zero.
    pub fn first_contact(config: &LimiterConfig, now: Instant) -> Self {
        Self {
            tokens: (config.capacity - 1.0).max(0.0),
            last_update: now,
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    /// Credits tokens for the time elapsed since the last update.
    ///
    /// An instant earlier than `last_update` counts as zero elapsed time and
    /// leaves `last_update` where it is.
    pub fn refill(&mut self, config: &LimiterConfig, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * config.rate).min(config.capacity);
        if now > self.last_update {
            self.last_update = now;
        }
    }

    pub fn allow(&mut self, config: &LimiterConfig, now: Instant) -> AllowResult {
        self.refill(config, now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return AllowResult::Allowed;
        }

        // rejections are free: the balance is left as refilled
        AllowResult::Denied {
            retry_after: self.retry_after(config.rate),
        }
    }

    /// Time until one whole token is available, or `None` if it never will be.
    pub fn retry_after(&self, rate: f64) -> Option<Duration> {
        if self.tokens >= 1.0 {
            return Some(Duration::ZERO);
        }
        if rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64((1.0 - self.tokens) / rate).ok()
    }

    pub fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_update) > idle_timeout
    }
}
