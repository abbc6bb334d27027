use std::{sync::Weak, time::Duration};

use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::rate_limiter::store::BucketStore;

/// Handle to the background task that evicts idle keys.
///
/// Running from creation until [`stop`](Self::stop) or drop. Stopping is
/// terminal. The task lives on the runtime that spawned it, so shutting that
/// runtime down stops the sweeper too.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_token: CancellationToken,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Starts sweeping `store` every `interval` on `runtime`.
    ///
    /// The task only holds a weak reference, so it also ends once the store
    /// itself is gone.
    pub fn spawn(store: Weak<BucketStore>, interval: Duration, runtime: &Handle) -> Self {
        let shutdown_token = CancellationToken::new();
        let cancelled = shutdown_token.clone();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            debug!(interval_ms = interval.as_millis() as u64, "Idle sweeper started");

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else { break };
                        let evicted = store.sweep(Instant::now());
                        if evicted > 0 {
                            debug!(evicted, remaining = store.len(), "Evicted idle rate limit buckets");
                        }
                    }
                }
            }

            debug!("Idle sweeper stopped");
        });

        Self {
            shutdown_token,
            task,
        }
    }

    pub fn stop(&self) {
        self.shutdown_token.cancel();
    }

    /// False once stopped, or once the task is gone with its runtime.
    pub fn is_running(&self) -> bool {
        !self.shutdown_token.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
