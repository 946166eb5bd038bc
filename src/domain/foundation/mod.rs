//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, money helpers, the state machine trait
//! and the error types that form the vocabulary of the payment core.

mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    CouponId, CouponUsageId, CourseId, EnrollmentId, PaymentId, PaymentTransactionId,
    RevenueSplitId, UserId,
};
pub use money::{approx_eq, round_currency, MONEY_TOLERANCE};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
