//! Canonical payment model.
//!
//! Provider-independent vocabulary shared by every other component.
//!
//! # Module Structure
//!
//! - `status` - PaymentStatus state machine
//! - `billing` - BillingType and PaymentMethod
//! - `event` - Canonical WebhookEvent and EventSource
//! - `aggregate` - Payment ledger row
//! - `transaction` - PaymentTransaction audit record and trail replay
//! - `errors` - PaymentFlowError and GatewayError

mod aggregate;
mod billing;
mod errors;
mod event;
mod status;
mod transaction;

pub use aggregate::{Payer, Payment};
pub use billing::{BillingType, PaymentMethod};
pub use errors::{GatewayError, GatewayErrorCode, PaymentFlowError};
pub use event::{EventSource, WebhookEvent, WebhookEventType};
pub use status::PaymentStatus;
pub use transaction::{replay_status, AuditTrailError, PaymentTransaction, ERROR_EVENT_TYPE};
