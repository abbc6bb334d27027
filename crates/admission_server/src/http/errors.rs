use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub struct RateLimitHttpError {
    /// `None` when the client's bucket never refills.
    pub retry_after: Option<Duration>,
}

impl IntoResponse for RateLimitHttpError {
    fn into_response(self) -> Response {
        let retry_after_ms = self.retry_after.map(|d| d.as_millis() as u64);
        let body = json!({
            "error": "rate_limited",
            "retry_after_ms": retry_after_ms,
        });

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Some(ms) = retry_after_ms {
            //convert the millis to seconds using ceiling
            let seconds = ms.div_ceil(1000);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// The upstream could not be reached or answered with an unreadable body.
pub struct UpstreamError(pub String);

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Upstream request failed");
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "upstream_unavailable" })),
        )
            .into_response()
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}
