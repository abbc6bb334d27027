use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::{
    http::handlers::{forward, health, limit_stats, metrics},
    middleware::rate_limit::rate_limit_middleware,
    AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/limits/{key}", get(limit_stats))
        .fallback(forward)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, time::Duration};

    use admission_core::{LimiterConfig, RateLimiter};
    use axum::{
        body::{to_bytes, Body},
        extract::connect_info::MockConnectInfo,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServerConfig;

    fn app(rate: f64, capacity: f64, trust_forwarded_for: bool) -> (Router, AppState) {
        let mut config = ServerConfig::from_lookup(|_| None).unwrap();
        config.trust_forwarded_for = trust_forwarded_for;
        let limiter = RateLimiter::with_config(
            LimiterConfig::new(rate, capacity).with_idle_timeout(Duration::from_secs(60)),
        )
        .unwrap();
        let state = AppState::new(config, limiter);
        let router = router(state.clone()).layer(MockConnectInfo(SocketAddr::from((
            [192, 168, 1, 20],
            40000,
        ))));
        (router, state)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn admits_until_burst_is_spent() {
        let (app, state) = app(0.0, 2.0, false);

        let first = app.clone().oneshot(get("/trips/upcoming")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-ratelimit-limit"], "2");
        assert_eq!(first.headers()["x-ratelimit-remaining"], "1");

        let second = app.clone().oneshot(get("/trips/upcoming")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        let third = app.clone().oneshot(get("/trips/upcoming")).await.unwrap();
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(third.headers().get(header::RETRY_AFTER).is_none());
        let body = json(third).await;
        assert_eq!(body["error"], "rate_limited");

        let snapshot = state.metrics.snapshot(state.limiter.len());
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.total_allowed, 2);
        assert_eq!(snapshot.total_rate_limited, 1);
        assert_eq!(snapshot.tracked_keys, 1);
    }

    #[tokio::test]
    async fn rejected_request_carries_retry_after() {
        let (app, _) = app(0.5, 1.0, false);

        assert_eq!(
            app.clone().oneshot(get("/")).await.unwrap().status(),
            StatusCode::OK
        );
        let rejected = app.oneshot(get("/")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejected.headers()[header::RETRY_AFTER], "2");
    }

    #[tokio::test]
    async fn internal_routes_bypass_limiting() {
        let (app, state) = app(0.0, 1.0, false);

        for _ in 0..5 {
            let response = app.clone().oneshot(get("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["total_requests"], 0);
        assert!(state.limiter.is_empty());
    }

    #[tokio::test]
    async fn lookalike_internal_paths_are_limited() {
        let (app, state) = app(0.0, 1.0, false);

        let first = app.clone().oneshot(get("/healthcheck/anything")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        for path in ["/healthcheck", "/metrics-export", "/limitsfoo"] {
            let response = app.clone().oneshot(get(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS, "{path}");
        }

        let snapshot = state.metrics.snapshot(state.limiter.len());
        assert_eq!(snapshot.total_allowed, 1);
        assert_eq!(snapshot.total_rate_limited, 3);
        assert_eq!(snapshot.tracked_keys, 1);
    }

    #[tokio::test]
    async fn forwarded_clients_get_their_own_buckets() {
        let (app, _) = app(0.0, 1.0, true);

        let from = |ip: &str| {
            Request::builder()
                .uri("/friends/all")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(
            app.clone().oneshot(from("203.0.113.1")).await.unwrap().status(),
            StatusCode::OK
        );
        assert_eq!(
            app.clone().oneshot(from("203.0.113.1")).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            app.oneshot(from("203.0.113.2")).await.unwrap().status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn limit_stats_do_not_spend_tokens() {
        let (app, state) = app(0.0, 3.0, false);
        app.clone().oneshot(get("/country/all")).await.unwrap();

        let response = app.clone().oneshot(get("/limits/192.168.1.20")).await.unwrap();
        let body = json(response).await;
        assert_eq!(body["exists"], true);
        assert_eq!(body["tokens"], 2.0);
        assert_eq!(body["capacity"], 3.0);

        let response = app.oneshot(get("/limits/10.9.9.9")).await.unwrap();
        let body = json(response).await;
        assert_eq!(body["exists"], false);
        assert!(body["idle_ms"].is_null());

        assert_eq!(state.limiter.stats("192.168.1.20").tokens, 2.0);
    }
}
