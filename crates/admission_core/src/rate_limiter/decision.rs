use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AllowResult {
    Allowed,
    /// `retry_after` is `None` when the bucket never refills (rate 0).
    Denied { retry_after: Option<Duration> },
}

impl AllowResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AllowResult::Allowed)
    }
}

/// Read-only view of one key's bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketStats {
    pub capacity: f64,
    pub tokens: f64,
    pub exists: bool,
    pub last_update: Option<Instant>,
}

impl BucketStats {
    /// Whole tokens left, as advertised to clients.
    pub fn remaining(&self) -> u64 {
        self.tokens.floor() as u64
    }

    pub fn limit(&self) -> u64 {
        self.capacity.floor() as u64
    }
}

/// A rejected check, with the bucket as it stood after the decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimited {
    pub retry_after: Option<Duration>,
    pub snapshot: BucketStats,
}
