//! Gateway fee schedule and fee calculation.

use serde::{Deserialize, Serialize};

/// Fees a gateway charges per billing method.
///
/// Percentages are fractions (`0.0099` is 0.99%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub pix_percent: f64,
    pub boleto_fixed: f64,
    pub card_percent: f64,
    pub card_fixed: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            pix_percent: 0.0099,
            boleto_fixed: 2.99,
            card_percent: 0.0299,
            card_fixed: 0.49,
        }
    }
}

/// Fee rule a method string resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeCategory {
    Pix,
    Boleto,
    Card,
    /// No fee is charged.
    Other,
}

impl FeeCategory {
    /// Case-insensitive method lookup.
    pub fn for_method(method: &str) -> Self {
        match method.trim().to_ascii_lowercase().as_str() {
            "pix" => FeeCategory::Pix,
            "boleto" => FeeCategory::Boleto,
            "card" | "credit_card" | "debit_card" => FeeCategory::Card,
            _ => FeeCategory::Other,
        }
    }

    /// Human-readable fee description.
    pub fn description(&self) -> &'static str {
        match self {
            FeeCategory::Pix => "Taxa PIX: 0,99% sobre o valor",
            FeeCategory::Boleto => "Taxa boleto: R$ 2,99 por boleto pago",
            FeeCategory::Card => "Taxa cartão: 2,99% + R$ 0,49 por transação",
            FeeCategory::Other => "Método de pagamento desconhecido",
        }
    }
}

/// Fee charged by the gateway for `amount` paid with `method`.
///
/// PIX is a percentage, boleto a flat fee regardless of amount, cards a
/// percentage plus a fixed part. Unknown methods are free.
pub fn calculate_payment_fee(amount: f64, method: &str, fees: &FeeSchedule) -> f64 {
    match FeeCategory::for_method(method) {
        FeeCategory::Pix => amount * fees.pix_percent,
        FeeCategory::Boleto => fees.boleto_fixed,
        FeeCategory::Card => amount * fees.card_percent + fees.card_fixed,
        FeeCategory::Other => 0.0,
    }
}
