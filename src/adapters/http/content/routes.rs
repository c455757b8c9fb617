//! Axum router for content endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::super::AppState;
use super::handlers::{check_access, grant_creator_access};

/// Content routes, mounted at `/api/content`.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/:content_id/access", get(check_access))
        .route("/:content_id/creator-access", post(grant_creator_access))
}
