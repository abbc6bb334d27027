use std::sync::Arc;

use admission_core::RateLimiter;
use reqwest::Client;

use crate::{config::ServerConfig, metrics::ServerMetrics};

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub limiter: RateLimiter,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, limiter: RateLimiter) -> Self {
        Self {
            client: Client::new(),
            limiter,
            metrics: Arc::new(ServerMetrics::new()),
            config: Arc::new(config),
        }
    }
}
