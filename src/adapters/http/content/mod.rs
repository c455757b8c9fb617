//! HTTP adapter for content gating.
//!
//! - `GET /api/content/:content_id/access` - May the caller read it in full?
//! - `POST /api/content/:content_id/creator-access` - Record the creator's own grant

pub mod handlers;
pub mod routes;

pub use handlers::{ContentAccessResponse, CreatorAccessResponse};
pub use routes::content_routes;
