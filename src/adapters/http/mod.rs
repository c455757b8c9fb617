//! HTTP adapters - REST API over the reconciliation coordinator.
//!
//! - `/api/payments/*` - Client payment callbacks and purchase listing
//! - `/api/content/*` - Content gating
//! - `/health` - Liveness check

pub mod auth;
pub mod content;
pub mod error;
pub mod payments;
mod state;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub use auth::{AuthenticatedUser, AuthenticationRequired};
pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

/// Complete API router, ready for `.with_state(app_state)`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/payments", payments::payment_routes())
        .nest("/api/content", content::content_routes())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
