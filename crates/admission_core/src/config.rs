use std::time::Duration;

use crate::error::{LimiterError, Result};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SHARDS: usize = 16;

/// Process-wide limiting policy. Fixed once a limiter is built.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    /// Tokens added per second.
    pub rate: f64,
    /// Maximum tokens a bucket holds (burst size).
    pub capacity: f64,
    /// A key untouched for longer than this is evicted by the sweeper.
    pub idle_timeout: Duration,
    /// How often the sweeper scans for idle keys.
    pub sweep_interval: Duration,
    /// Number of independently locked partitions of the key space.
    pub shards: usize,
}

impl LimiterConfig {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            rate,
            capacity,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            shards: DEFAULT_SHARDS,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(LimiterError::InvalidConfig(format!(
                "rate must be a finite, non-negative number (got {})",
                self.rate
            )));
        }
        if !self.capacity.is_finite() || self.capacity <= 0.0 {
            return Err(LimiterError::InvalidConfig(format!(
                "capacity must be a finite, positive number (got {})",
                self.capacity
            )));
        }
        if self.idle_timeout.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "idle_timeout must be greater than zero".to_string(),
            ));
        }
        // tokio::time::interval panics on a zero period
        if self.sweep_interval.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        if self.shards == 0 {
            return Err(LimiterError::InvalidConfig(
                "shards must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = LimiterConfig::new(10.0, 20.0);
        assert_eq!(config.idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.shards, DEFAULT_SHARDS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_rate_is_valid() {
        assert!(LimiterConfig::new(0.0, 2.0).validate().is_ok());
    }

    #[test]
    fn rejects_bad_numbers() {
        for (rate, capacity) in [
            (-1.0, 2.0),
            (f64::NAN, 2.0),
            (f64::INFINITY, 2.0),
            (1.0, 0.0),
            (1.0, -3.0),
            (1.0, f64::NAN),
        ] {
            let err = LimiterConfig::new(rate, capacity).validate().unwrap_err();
            assert!(matches!(err, LimiterError::InvalidConfig(_)));
        }
    }

    #[test]
    fn rejects_zero_durations_and_shards() {
        let base = LimiterConfig::new(1.0, 1.0);
        assert!(base
            .clone()
            .with_idle_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(base
            .clone()
            .with_sweep_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(base.with_shards(0).validate().is_err());
    }
}
