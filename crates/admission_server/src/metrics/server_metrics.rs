use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// Atomic type -> No locking, thread safe and high performance
#[derive(Debug, Default)]
pub struct ServerMetrics {
    pub total_requests: AtomicU64,
    pub total_allowed: AtomicU64,
    pub total_rate_limited: AtomicU64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_allowed: u64,
    pub total_rate_limited: u64,
    pub tracked_keys: usize,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allowed(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, tracked_keys: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_allowed: self.total_allowed.load(Ordering::Relaxed),
            total_rate_limited: self.total_rate_limited.load(Ordering::Relaxed),
            tracked_keys,
        }
    }
}
