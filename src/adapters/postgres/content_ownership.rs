//! PostgreSQL implementation of ContentOwnership.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{ContentId, DomainError, UserId};
use crate::ports::ContentOwnership;

/// Reads the `content_creators` table maintained by the content service.
pub struct PostgresContentOwnership {
    pool: PgPool,
}

impl PostgresContentOwnership {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentOwnership for PostgresContentOwnership {
    async fn is_creator(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<bool, DomainError> {
        let found: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM content_creators WHERE content_id = $1 AND creator_id = $2",
        )
        .bind(content_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check content ownership: {}", e)))?;

        Ok(found.is_some())
    }
}
