use std::net::SocketAddr;

use admission_core::BucketStats;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::{http::errors::RateLimitHttpError, middleware::client_key::client_key, AppState};

pub const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_RATE_LIMIT_REMAINING: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");

fn attach_headers(response: &mut Response<Body>, snapshot: &BucketStats) {
    let headers = response.headers_mut();
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(snapshot.limit()));
    headers.insert(
        HEADER_RATE_LIMIT_REMAINING,
        HeaderValue::from(snapshot.remaining()),
    );
}

// exact routes only: anything else falls through to the forwarding fallback
fn is_internal(path: &str) -> bool {
    path == "/health" || path == "/metrics" || path.starts_with("/limits/")
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // Skip internal routes
    if is_internal(req.uri().path()) {
        return next.run(req).await;
    }

    let key = client_key(req.headers(), addr.ip(), state.config.trust_forwarded_for);
    let span = tracing::info_span!("request", client = %key, path = %req.uri().path());

    async move {
        match state.limiter.check(&key) {
            Ok(snapshot) => {
                state.metrics.record_allowed();
                tracing::debug!(decision = "allowed", remaining = snapshot.remaining());

                let mut response = next.run(req).await;
                attach_headers(&mut response, &snapshot);
                response
            }
            Err(limited) => {
                state.metrics.record_rate_limited();
                tracing::warn!(decision = "denied", tokens = limited.snapshot.tokens);

                let mut response = RateLimitHttpError {
                    retry_after: limited.retry_after,
                }
                .into_response();
                attach_headers(&mut response, &limited.snapshot);
                response
            }
        }
    }
    .instrument(span)
    .await
}
