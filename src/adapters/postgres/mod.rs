//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPaymentLedger` - Payments and audit trail, one transaction per write
//! - `PostgresRevenueSplitRepository` - Split reads and settlement
//! - `PostgresCouponRepository` - Coupon lookups and inserts

mod coupon_repository;
mod payment_ledger;
mod revenue_split_repository;

pub use coupon_repository::PostgresCouponRepository;
pub use payment_ledger::PostgresPaymentLedger;
pub use revenue_split_repository::PostgresRevenueSplitRepository;

use std::fmt::Display;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

fn db_error(action: &str, err: impl Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, err))
}

fn parse_user_id(raw: String) -> Result<UserId, DomainError> {
    UserId::new(raw).map_err(|e| db_error("decode user id", e))
}
