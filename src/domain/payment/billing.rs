//! Billing types accepted by gateways and payment methods stored on the ledger.

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a gateway charges the payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    Pix,
    Boleto,
    CreditCard,
    DebitCard,
}

impl BillingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingType::Pix => "pix",
            BillingType::Boleto => "boleto",
            BillingType::CreditCard => "credit_card",
            BillingType::DebitCard => "debit_card",
        }
    }

    /// Card billing carries sensitive card fields and goes through a separate gateway path.
    pub fn is_card(&self) -> bool {
        matches!(self, BillingType::CreditCard | BillingType::DebitCard)
    }
}

impl fmt::Display for BillingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pix" => Ok(BillingType::Pix),
            "boleto" => Ok(BillingType::Boleto),
            "credit_card" => Ok(BillingType::CreditCard),
            "debit_card" => Ok(BillingType::DebitCard),
            other => Err(ValidationError::invalid_format(
                "billing_type",
                format!("unknown billing type '{}'", other),
            )),
        }
    }
}

/// Payment method recorded on a ledger row.
///
/// A superset of [`BillingType`]: bank transfers are reconciled manually and
/// fully discounted orders never reach a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Boleto,
    Pix,
    BankTransfer,
    Free,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Boleto => "boleto",
            PaymentMethod::Pix => "pix",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Free => "free",
        }
    }
}

impl From<BillingType> for PaymentMethod {
    fn from(billing: BillingType) -> Self {
        match billing {
            BillingType::Pix => PaymentMethod::Pix,
            BillingType::Boleto => PaymentMethod::Boleto,
            BillingType::CreditCard => PaymentMethod::CreditCard,
            BillingType::DebitCard => PaymentMethod::DebitCard,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "boleto" => Ok(PaymentMethod::Boleto),
            "pix" => Ok(PaymentMethod::Pix),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "free" => Ok(PaymentMethod::Free),
            other => Err(ValidationError::invalid_format(
                "payment_method",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}
