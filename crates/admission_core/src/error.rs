//! Error types for admission_core

use thiserror::Error;

/// Errors raised while building a limiter.
///
/// Admission decisions themselves never fail; only construction does.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    #[error("Invalid limiter config: {0}")]
    InvalidConfig(String),

    #[error("No Tokio runtime available to run the idle sweeper")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, LimiterError>;
