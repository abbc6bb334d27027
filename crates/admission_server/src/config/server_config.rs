use std::{env, net::SocketAddr, time::Duration};

use admission_core::{
    config::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SHARDS, DEFAULT_SWEEP_INTERVAL},
    global::{DEFAULT_CAPACITY, DEFAULT_RATE},
    LimiterConfig,
};
use thiserror::Error;

static BIND_ADDR_DEFAULT: &str = "127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub rate: f64,
    pub capacity: f64,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    pub shards: usize,
    pub trust_forwarded_for: bool,
    pub upstream_base_url: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not a valid number")]
    InvalidNumber(&'static str),
    #[error("{0} has an invalid value")]
    InvalidValue(&'static str),
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; unset keys fall back to
    /// defaults, malformed ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| BIND_ADDR_DEFAULT.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("BIND_ADDR"))?;

        Ok(Self {
            bind_addr,
            rate: read_number(&lookup, "RATE_LIMIT_RATE", DEFAULT_RATE)?,
            capacity: read_number(&lookup, "RATE_LIMIT_CAPACITY", DEFAULT_CAPACITY)?,
            idle_timeout: read_secs(&lookup, "RATE_LIMIT_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT)?,
            sweep_interval: read_secs(
                &lookup,
                "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL,
            )?,
            shards: read_number(&lookup, "RATE_LIMIT_SHARDS", DEFAULT_SHARDS)?,
            trust_forwarded_for: read_bool(&lookup, "TRUST_FORWARDED_FOR", false)?,
            upstream_base_url: lookup("UPSTREAM_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        })
    }

    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig::new(self.rate, self.capacity)
            .with_idle_timeout(self.idle_timeout)
            .with_sweep_interval(self.sweep_interval)
            .with_shards(self.shards)
    }
}

fn read_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(default),
    }
}

fn read_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    read_number(lookup, key, default.as_secs()).map(Duration::from_secs)
}

fn read_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::InvalidValue(key)),
    }
}
