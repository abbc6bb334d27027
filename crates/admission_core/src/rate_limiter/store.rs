use std::{
    collections::{hash_map::RandomState, HashMap},
    hash::BuildHasher,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::time::Instant;

use crate::config::LimiterConfig;
use crate::rate_limiter::{
    decision::{AllowResult, BucketStats, RateLimited},
    token_bucket::TokenBucket,
};

type Shard = Mutex<HashMap<String, TokenBucket>>;

/// Key -> bucket map split into independently locked shards.
///
/// A key always hashes to the same shard, so every operation on one key is
/// serialized by that shard's lock. Operations on keys in different shards
/// never contend.
pub struct BucketStore {
    shards: Box<[Shard]>,
    hasher: RandomState,
    config: LimiterConfig,
}

// Bucket updates can't leave a shard half-written, so a poisoned lock is
// still safe to use.
fn lock(shard: &Shard) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BucketStore {
    /// `config` is expected to be validated already.
    pub fn new(config: LimiterConfig) -> Self {
        let shards = (0..config.shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            hasher: RandomState::new(),
            config,
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    pub fn shard_index(&self, key: &str) -> usize {
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    pub fn allow(&self, key: &str, now: Instant) -> bool {
        self.check(key, now).is_ok()
    }

    /// Same decision as [`allow`](Self::allow), returning the bucket as it
    /// stands afterwards.
    pub fn check(&self, key: &str, now: Instant) -> Result<BucketStats, RateLimited> {
        let mut buckets = lock(self.shard(key));

        if let Some(bucket) = buckets.get_mut(key) {
            let decision = bucket.allow(&self.config, now);
            let snapshot = self.snapshot(bucket);
            return match decision {
                AllowResult::Allowed => Ok(snapshot),
                AllowResult::Denied { retry_after } => Err(RateLimited {
                    retry_after,
                    snapshot,
                }),
            };
        }

        let bucket = TokenBucket::first_contact(&self.config, now);
        let snapshot = self.snapshot(&bucket);
        buckets.insert(key.to_owned(), bucket);
        Ok(snapshot)
    }

    /// Stored balance as of the key's last update; no refill is applied.
    pub fn stats(&self, key: &str) -> BucketStats {
        let buckets = lock(self.shard(key));

        match buckets.get(key) {
            Some(bucket) => self.snapshot(bucket),
            None => BucketStats {
                capacity: self.config.capacity,
                tokens: self.config.capacity,
                exists: false,
                last_update: None,
            },
        }
    }

    fn snapshot(&self, bucket: &TokenBucket) -> BucketStats {
        BucketStats {
            capacity: self.config.capacity,
            tokens: bucket.tokens(),
            exists: true,
            last_update: Some(bucket.last_update()),
        }
    }

    /// Removes every key idle for longer than the configured timeout,
    /// holding each shard's lock while it is scanned. Returns the number of
    /// evicted keys.
    pub fn sweep(&self, now: Instant) -> usize {
        let idle_timeout = self.config.idle_timeout;
        self.shards
            .iter()
            .map(|shard| {
                let mut buckets = lock(shard);
                let before = buckets.len();
                buckets.retain(|_, bucket| !bucket.is_idle(now, idle_timeout));
                before - buckets.len()
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| lock(shard).is_empty())
    }
}
