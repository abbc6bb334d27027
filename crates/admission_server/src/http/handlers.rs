use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::time::Instant;

use crate::{http::errors::UpstreamError, metrics::MetricsSnapshot, AppState};

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot(state.limiter.len()))
}

#[derive(Debug, Serialize)]
pub struct LimitStats {
    pub key: String,
    pub exists: bool,
    pub tokens: f64,
    pub capacity: f64,
    pub idle_ms: Option<u64>,
}

pub async fn limit_stats(State(state): State<AppState>, Path(key): Path<String>) -> Json<LimitStats> {
    let stats = state.limiter.stats(&key);
    let idle_ms = stats
        .last_update
        .map(|at| Instant::now().saturating_duration_since(at).as_millis() as u64);

    Json(LimitStats {
        key,
        exists: stats.exists,
        tokens: stats.tokens,
        capacity: stats.capacity,
        idle_ms,
    })
}

/// Admitted traffic: relayed to the upstream when one is configured,
/// answered locally otherwise.
pub async fn forward(State(state): State<AppState>, req: Request<Body>) -> Response {
    let Some(upstream_base_url) = state.config.upstream_base_url.as_deref() else {
        return (StatusCode::OK, "OK").into_response();
    };

    let method = req.method().clone();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let mut headers = req.headers().clone();
    headers.remove(header::HOST);

    let body = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };

    match relay(&state, method, format!("{upstream_base_url}{path}"), headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn relay(
    state: &AppState,
    method: axum::http::Method,
    url: String,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, UpstreamError> {
    let upstream = state
        .client
        .request(method, url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    //convert reqwest response to axum response
    let status = upstream.status();
    let body = upstream.bytes().await?;

    Ok((status, body).into_response())
}
