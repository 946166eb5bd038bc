//! In-memory adapters for tests and local runs.

mod coupons;
mod ledger;

pub use coupons::InMemoryCouponRepository;
pub use ledger::InMemoryLedger;
