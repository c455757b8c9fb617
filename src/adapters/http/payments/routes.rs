//! Axum router for payment endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::super::AppState;
use super::handlers::{
    approve_payment, cancelled_payment, complete_payment, incomplete_payment, list_payments,
    list_purchases,
};

/// Payment routes, mounted at `/api/payments`. All require `X-User-Id`.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/purchases", get(list_purchases))
        .route("/approve", post(approve_payment))
        .route("/complete", post(complete_payment))
        .route("/cancelled_payment", post(cancelled_payment))
        .route("/incomplete", post(incomplete_payment))
}
