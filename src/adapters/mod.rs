//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `gateway` - Payment gateway implementations (sandbox)
//! - `http` - REST API and webhook endpoints (axum)
//! - `memory` - In-process ledger and coupon store
//! - `postgres` - Database-backed ledger, splits and coupons (sqlx)

pub mod gateway;
pub mod http;
pub mod memory;
pub mod postgres;

pub use gateway::SandboxGateway;
pub use memory::{InMemoryCouponRepository, InMemoryLedger};
pub use postgres::{PostgresCouponRepository, PostgresPaymentLedger, PostgresRevenueSplitRepository};
