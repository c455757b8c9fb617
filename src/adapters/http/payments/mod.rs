//! HTTP adapter for payment endpoints.
//!
//! Client callbacks from the payment flow:
//! - `POST /api/payments/approve` - Server-side approval
//! - `POST /api/payments/complete` - Server-side completion
//! - `POST /api/payments/cancelled_payment` - Cancellation report
//! - `POST /api/payments/incomplete` - Incomplete payment found by the client
//! - `GET /api/payments` - Caller's payment records
//! - `GET /api/payments/purchases` - Caller's entitlements

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use routes::payment_routes;
