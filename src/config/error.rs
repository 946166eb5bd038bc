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
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Request body limit must be between 1 byte and 4 MiB")]
    InvalidBodyLimit,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Ledger lock timeout must be between 1 and 60 seconds")]
    InvalidLockTimeout,

    #[error("Unknown active gateway: {0}")]
    UnknownGateway(String),

    #[error("Webhook secret is too short (minimum 16 characters)")]
    WeakWebhookSecret,

    #[error("Fee schedule values must be finite and non-negative")]
    InvalidFeeSchedule,

    #[error("Revenue percentages must be between 0 and 100 and sum to at most 100")]
    InvalidRevenuePercentages,

    #[error("Webhook max age must be between 1 and 86400 seconds")]
    InvalidWebhookAge,
}
