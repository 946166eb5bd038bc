//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, money, errors)
//! - `payment` - Canonical payment model, ledger row and audit trail
//! - `revenue` - Gateway fees and instructor/platform revenue split
//! - `coupon` - Coupon discount engine
//! - `assessment` - Audit score outcomes

pub mod assessment;
pub mod coupon;
pub mod foundation;
pub mod payment;
pub mod revenue;
