use std::sync::Arc;

use tokio::{runtime::Handle, time::Instant};

use crate::config::LimiterConfig;
use crate::error::{LimiterError, Result};
use crate::rate_limiter::{
    decision::{BucketStats, RateLimited},
    store::BucketStore,
    sweeper::Sweeper,
};

/// Per-client token bucket rate limiter with idle-key eviction.
///
/// Cloning is cheap and every clone shares the same buckets and sweeper.
/// The sweeper runs on the Tokio runtime the limiter was built in. It stops
/// on [`shutdown`](Self::shutdown), when the last clone is dropped, or when
/// that runtime shuts down; the limiter keeps answering in every case, it
/// just stops reclaiming idle keys. [`is_running`](Self::is_running) tells
/// which state it is in.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<BucketStore>,
    sweeper: Arc<Sweeper>,
}

impl RateLimiter {
    /// Builds a limiter with default idle timeout and sweep interval.
    ///
    /// Must be called from within a Tokio runtime, which hosts the sweeper.
    pub fn new(rate: f64, capacity: f64) -> Result<Self> {
        Self::with_config(LimiterConfig::new(rate, capacity))
    }

    pub fn with_config(config: LimiterConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| LimiterError::NoRuntime)?;

        let interval = config.sweep_interval;
        let store = Arc::new(BucketStore::new(config));
        let sweeper = Sweeper::spawn(Arc::downgrade(&store), interval, &runtime);

        Ok(Self {
            store,
            sweeper: Arc::new(sweeper),
        })
    }

    pub fn config(&self) -> &LimiterConfig {
        self.store.config()
    }

    /// Whether a request from `key` may proceed now.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        self.store.allow(key, now)
    }

    /// Like [`allow`](Self::allow), but hands back the bucket snapshot so the
    /// caller can advertise limits or a retry delay.
    pub fn check(&self, key: &str) -> std::result::Result<BucketStats, RateLimited> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> std::result::Result<BucketStats, RateLimited> {
        self.store.check(key, now)
    }

    /// Diagnostic view of a key. Never changes limiter state.
    ///
    /// `tokens` is the balance as of `last_update`; refill for the time since
    /// then is only credited by the next `allow`/`check`, so an idle key can
    /// report fewer tokens than its next request will see.
    pub fn stats(&self, key: &str) -> BucketStats {
        self.store.stats(key)
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        self.store.sweep(now)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Stops the idle sweeper. Safe to call more than once.
    pub fn shutdown(&self) {
        self.sweeper.stop();
    }

    /// Whether idle keys are still being evicted.
    pub fn is_running(&self) -> bool {
        self.sweeper.is_running()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", self.store.config())
            .field("keys", &self.store.len())
            .field("sweeper_running", &self.sweeper.is_running())
            .finish()
    }
}
