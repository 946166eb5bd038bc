//! Shared wiring for integration tests: sandbox gateway, in-memory ledger
//! and an orchestrator over both.

#![allow(dead_code)]

use std::sync::Arc;

use payflow::adapters::gateway::SandboxGateway;
use payflow::adapters::memory::{InMemoryCouponRepository, InMemoryLedger};
use payflow::application::{
    CheckoutCommand, GatewayRegistry, OrchestratorSettings, PaymentOrchestrator,
};
use payflow::domain::payment::{BillingType, Payer};
use secrecy::SecretString;

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";

pub struct TestApp {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub gateway: Arc<SandboxGateway>,
    pub ledger: Arc<InMemoryLedger>,
    pub coupons: Arc<InMemoryCouponRepository>,
}

pub fn test_app() -> TestApp {
    let gateway = Arc::new(SandboxGateway::new(
        "sandbox",
        SecretString::new(WEBHOOK_SECRET.to_string()),
    ));
    let registry = Arc::new(GatewayRegistry::new());
    registry.register(gateway.clone());

    let coupons = Arc::new(InMemoryCouponRepository::new());
    let ledger = Arc::new(InMemoryLedger::new(coupons.clone()));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        registry,
        ledger.clone(),
        coupons.clone(),
        ledger.clone(),
        OrchestratorSettings::default(),
    ));

    TestApp {
        orchestrator,
        gateway,
        ledger,
        coupons,
    }
}

pub fn pix_checkout(amount: f64) -> CheckoutCommand {
    CheckoutCommand {
        enrollment_id: None,
        course_id: None,
        instructor_id: None,
        user_id: None,
        payer: Payer::new("Ana Souza", Some("ana@example.com".into()), "12345678900").unwrap(),
        payer_phone: None,
        amount,
        billing_type: BillingType::Pix,
        coupon_code: None,
        due_date: None,
        description: Some("Rust course".into()),
        card: None,
    }
}
