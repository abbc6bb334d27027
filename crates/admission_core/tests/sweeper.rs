use std::time::Duration;

use admission_core::{LimiterConfig, RateLimiter};

fn quick_sweep(rate: f64, capacity: f64) -> LimiterConfig {
    LimiterConfig::new(rate, capacity)
        .with_idle_timeout(Duration::from_secs(1))
        .with_sweep_interval(Duration::from_millis(500))
}

#[tokio::test(start_paused = true)]
async fn cleanup_removes_stale_entries() {
    let limiter = RateLimiter::with_config(quick_sweep(1.0, 2.0)).unwrap();
    let ip = "192.168.1.5";
    assert!(limiter.allow(ip));

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(!limiter.stats(ip).exists);
    assert!(limiter.is_empty());
}

#[tokio::test(start_paused = true)]
async fn active_keys_survive_sweeps() {
    let limiter = RateLimiter::with_config(quick_sweep(10.0, 10.0)).unwrap();

    for _ in 0..6 {
        assert!(limiter.allow("busy"));
        tokio::time::sleep(Duration::from_millis(800)).await;
    }

    assert!(limiter.stats("busy").exists);
}

#[tokio::test(start_paused = true)]
async fn only_idle_keys_are_evicted() {
    let limiter = RateLimiter::with_config(quick_sweep(1.0, 2.0)).unwrap();
    assert!(limiter.allow("quiet"));

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(limiter.allow("chatty"));

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!limiter.stats("quiet").exists);
    assert!(limiter.stats("chatty").exists);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_sweeping() {
    let limiter = RateLimiter::with_config(quick_sweep(1.0, 2.0)).unwrap();
    assert!(limiter.is_running());
    assert!(limiter.allow("kept"));

    limiter.shutdown();
    limiter.shutdown();
    assert!(!limiter.is_running());

    tokio::time::sleep(Duration::from_secs(3)).await;

    // nothing reclaims memory any more, but decisions still work
    assert!(limiter.stats("kept").exists);
    assert!(limiter.allow("kept"));
    assert!(limiter.allow("new-after-shutdown"));
    assert_eq!(limiter.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn clones_share_state_and_sweeper() {
    let limiter = RateLimiter::with_config(quick_sweep(0.0, 1.0)).unwrap();
    let handle = limiter.clone();

    assert!(limiter.allow("shared"));
    assert!(!handle.allow("shared"));

    handle.shutdown();
    assert!(!limiter.is_running());
}

#[tokio::test(start_paused = true)]
async fn manual_sweep_reports_evictions() {
    let limiter = RateLimiter::with_config(
        LimiterConfig::new(1.0, 1.0).with_idle_timeout(Duration::from_secs(1)),
    )
    .unwrap();
    limiter.allow("a");
    limiter.allow("b");

    assert_eq!(limiter.sweep(), 0);
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(limiter.sweep(), 2);
}

#[test]
fn sweeper_stops_with_its_runtime() {
    let build = || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    };

    let origin = build();
    let limiter = origin.block_on(async {
        RateLimiter::with_config(
            LimiterConfig::new(1.0, 2.0)
                .with_idle_timeout(Duration::from_millis(50))
                .with_sweep_interval(Duration::from_millis(20)),
        )
        .unwrap()
    });
    assert!(limiter.is_running());

    drop(origin);
    assert!(!limiter.is_running());

    // decisions keep working from another runtime, but nothing evicts any more
    let other = build();
    other.block_on(async {
        assert!(limiter.allow("k"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(limiter.stats("k").exists);
        assert_eq!(limiter.sweep(), 1);
    });
}
