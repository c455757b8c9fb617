//! HTTP handlers for content endpoints.

use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::application::handlers::CheckContentAccessQuery;
use crate::domain::entitlement::AccessDecision;
use crate::domain::foundation::ContentId;

use super::super::{ApiError, AppState, AuthenticatedUser};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAccessResponse {
    pub content_id: String,
    pub can_access_full: bool,
    pub decision: AccessDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorAccessResponse {
    pub content_id: String,
    /// False if the grant already existed.
    pub granted: bool,
}

/// GET /api/content/:content_id/access
///
/// Never errors on lookup failures; those deny access.
pub async fn check_access(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let content_id = ContentId::new(content_id)?;
    let result = state
        .check_content_access_handler()
        .handle(CheckContentAccessQuery {
            user_id: user.user_id,
            content_id: content_id.clone(),
        })
        .await;

    Ok(Json(ContentAccessResponse {
        content_id: content_id.to_string(),
        can_access_full: result.can_access_full(),
        decision: result.decision,
    }))
}

/// POST /api/content/:content_id/creator-access
pub async fn grant_creator_access(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(content_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let content_id = ContentId::new(content_id)?;

    if !state
        .content_ownership
        .is_creator(&user.user_id, &content_id)
        .await?
    {
        return Err(ApiError::Forbidden(format!(
            "{} is not the creator of {}",
            user.user_id, content_id
        )));
    }

    let granted = state
        .coordinator
        .grant_creator_access(&user.user_id, &content_id)
        .await?;

    Ok(Json(CreatorAccessResponse {
        content_id: content_id.to_string(),
        granted,
    }))
}
