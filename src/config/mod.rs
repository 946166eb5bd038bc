//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `PAYFLOW` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use payflow::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod database;
mod error;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::{PaymentConfig, SUPPORTED_GATEWAYS};
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Gateways, fees and revenue split defaults
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `PAYFLOW` prefix
    /// 3. Uses `__` to separate nested values
    ///
    /// - `PAYFLOW__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PAYFLOW__DATABASE__URL=...` -> `database.url = ...`
    /// - `PAYFLOW__PAYMENT__FEES__PIX_PERCENT=0.0099` -> `payment.fees.pix_percent`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PAYFLOW")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "PAYFLOW__DATABASE__URL",
        "PAYFLOW__PAYMENT__SANDBOX_WEBHOOK_SECRET",
        "PAYFLOW__PAYMENT__DEFAULT_INSTRUCTOR_PERCENT",
        "PAYFLOW__SERVER__PORT",
        "PAYFLOW__SERVER__ENVIRONMENT",
    ];

    fn set_minimal_env() {
        env::set_var("PAYFLOW__DATABASE__URL", "postgres://payflow@localhost/payflow");
        env::set_var(
            "PAYFLOW__PAYMENT__SANDBOX_WEBHOOK_SECRET",
            "whsec_0123456789abcdef",
        );
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.database.url, "postgres://payflow@localhost/payflow");
        assert_eq!(config.payment.active_gateway, "sandbox");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_nested_overrides() {
        let config = load_with(&[
            ("PAYFLOW__SERVER__PORT", "3000"),
            ("PAYFLOW__SERVER__ENVIRONMENT", "production"),
            ("PAYFLOW__PAYMENT__DEFAULT_INSTRUCTOR_PERCENT", "60"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.payment.default_instructor_percent, 60.0);
    }

    #[test]
    fn test_missing_database_fails() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var(
            "PAYFLOW__PAYMENT__SANDBOX_WEBHOOK_SECRET",
            "whsec_0123456789abcdef",
        );
        let result = AppConfig::load();
        clear_env();
        assert!(result.is_err());
    }
}
