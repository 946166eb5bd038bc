//! Fee and revenue split engine.
//!
//! Pure computation over the canonical payment model, plus the persisted
//! `RevenueSplit` entity.

mod fees;
mod split;

pub use fees::{calculate_payment_fee, FeeCategory, FeeSchedule};
pub use split::{
    calculate_revenue_split, RevenueSplit, RevenueSplitStatus, SplitCalculation,
};
