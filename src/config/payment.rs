//! Payment configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::application::{OrchestratorSettings, DEFAULT_MAX_EVENT_AGE_SECS};
use crate::domain::revenue::FeeSchedule;

/// Gateways this build can register.
pub const SUPPORTED_GATEWAYS: &[&str] = &["sandbox"];

/// Payment configuration (gateways, fees, revenue split)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Gateway used for new charges
    #[serde(default = "default_active_gateway")]
    pub active_gateway: String,

    /// HMAC secret for sandbox webhook signatures
    pub sandbox_webhook_secret: SecretString,

    /// Fees charged by the active gateway
    #[serde(default)]
    pub fees: FeeSchedule,

    /// Instructor share of the net amount, in percent
    #[serde(default = "default_instructor_percent")]
    pub default_instructor_percent: f64,

    /// Platform share of the net amount, in percent
    #[serde(default = "default_platform_percent")]
    pub default_platform_percent: f64,

    /// Oldest webhook timestamp accepted, in seconds
    #[serde(default = "default_max_webhook_age")]
    pub max_webhook_age_secs: i64,

    /// Ledger write attempts before a version conflict is reported
    #[serde(default = "default_max_transition_attempts")]
    pub max_transition_attempts: u32,
}

impl PaymentConfig {
    /// Orchestrator tunables derived from this configuration.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            default_instructor_percent: self.default_instructor_percent,
            default_platform_percent: self.default_platform_percent,
            fallback_fees: self.fees,
            max_transition_attempts: self.max_transition_attempts,
        }
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !SUPPORTED_GATEWAYS.contains(&self.active_gateway.as_str()) {
            return Err(ValidationError::UnknownGateway(self.active_gateway.clone()));
        }

        let secret = self.sandbox_webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("SANDBOX_WEBHOOK_SECRET"));
        }
        if secret.len() < 16 {
            return Err(ValidationError::WeakWebhookSecret);
        }

        let fees = [
            self.fees.pix_percent,
            self.fees.boleto_fixed,
            self.fees.card_percent,
            self.fees.card_fixed,
        ];
        if fees.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ValidationError::InvalidFeeSchedule);
        }

        let percents = [self.default_instructor_percent, self.default_platform_percent];
        if percents.iter().any(|p| !(0.0..=100.0).contains(p))
            || percents.iter().sum::<f64>() > 100.0
        {
            return Err(ValidationError::InvalidRevenuePercentages);
        }

        if !(1..=86_400).contains(&self.max_webhook_age_secs) {
            return Err(ValidationError::InvalidWebhookAge);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            active_gateway: default_active_gateway(),
            sandbox_webhook_secret: SecretString::new(String::new()),
            fees: FeeSchedule::default(),
            default_instructor_percent: default_instructor_percent(),
            default_platform_percent: default_platform_percent(),
            max_webhook_age_secs: default_max_webhook_age(),
            max_transition_attempts: default_max_transition_attempts(),
        }
    }
}

fn default_active_gateway() -> String {
    "sandbox".to_string()
}

fn default_instructor_percent() -> f64 {
    70.0
}

fn default_platform_percent() -> f64 {
    30.0
}

fn default_max_webhook_age() -> i64 {
    DEFAULT_MAX_EVENT_AGE_SECS
}

fn default_max_transition_attempts() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            sandbox_webhook_secret: SecretString::new("whsec_0123456789abcdef".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = valid();
        assert_eq!(config.active_gateway, "sandbox");
        assert_eq!(config.fees, FeeSchedule::default());
        assert_eq!(config.max_webhook_age_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_secret() {
        let config = PaymentConfig::default();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("SANDBOX_WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn test_validation_short_secret() {
        let config = PaymentConfig {
            sandbox_webhook_secret: SecretString::new("short".to_string()),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::WeakWebhookSecret));
    }

    #[test]
    fn test_validation_unknown_gateway() {
        let config = PaymentConfig {
            active_gateway: "acme".to_string(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::UnknownGateway(name)) if name == "acme"
        ));
    }

    #[test]
    fn test_validation_negative_fee() {
        let mut config = valid();
        config.fees.boleto_fixed = -1.0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidFeeSchedule));
    }

    #[test]
    fn test_validation_percentages_over_100() {
        let config = PaymentConfig {
            default_instructor_percent: 80.0,
            default_platform_percent: 30.0,
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidRevenuePercentages)
        );
    }

    #[test]
    fn test_orchestrator_settings() {
        let settings = valid().orchestrator_settings();
        assert_eq!(settings.default_instructor_percent, 70.0);
        assert_eq!(settings.default_platform_percent, 30.0);
        assert_eq!(settings.max_transition_attempts, 3);
    }
}
