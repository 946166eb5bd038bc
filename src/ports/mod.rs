//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `PaymentGateway` - Capability contract for payment providers
//! - `PaymentLedger` - Payments and audit trail, written as one unit of work
//! - `RevenueSplitRepository` - Revenue split reads and settlement
//! - `CouponRepository` - Coupon lookups

mod coupon_repository;
mod payment_gateway;
mod payment_ledger;
mod revenue_split_repository;

pub use coupon_repository::CouponRepository;
pub use payment_gateway::{
    BoletoCharge, CardChargeRequest, CardDetails, CardHolder, CardReceipt, ChargeRequest,
    CreateCustomerRequest, GatewayCustomer, GatewayPayment, PaymentGateway, PixCharge,
};
pub use payment_ledger::{LedgerWrite, NewLedgerEntry, PaymentLedger, TransitionOutcome};
pub use revenue_split_repository::RevenueSplitRepository;
