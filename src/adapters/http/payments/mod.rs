//! HTTP adapter for payment endpoints.
//!
//! - `POST /api/payments/checkout` - Start a checkout
//! - `GET /api/payments/:id` and its `status`, `transactions`, `replay` views
//! - `POST /api/payments/:id/refund`, `POST /api/payments/:id/cancel`
//! - `POST /api/coupons/preview`
//! - `POST /api/revenue/simulate`, `POST /api/revenue/splits/:id/settle`
//! - `POST /api/webhooks/:gateway` - Gateway notifications

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{PaymentApiError, PaymentAppState};
pub use routes::payment_router;
