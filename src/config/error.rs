//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Default channel buffer size must be at least 1")]
    InvalidBufferSize,

    #[error("Default timeout must be between 1 and 3600 seconds")]
    InvalidTimeout,

    #[error("Max concurrent handlers must be between 1 and {max}")]
    InvalidConcurrency { max: usize },

    #[error("Invalid log filter directive: {0}")]
    InvalidLogFilter(String),
}
