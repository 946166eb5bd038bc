//! Payment gateway adapters.
//!
//! - `sandbox` - In-process gateway with HMAC-signed webhooks, used for local
//!   runs and tests

mod sandbox;

pub use sandbox::{sandbox_mapper, SandboxGateway, SandboxPaymentPayload, SandboxWebhook};
