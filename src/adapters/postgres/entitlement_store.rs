//! PostgreSQL implementation of EntitlementStore.
//!
//! `(user_id, content_id)` is the primary key, so concurrent grants race on
//! the constraint and exactly one insert wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entitlement::EntitlementRecord;
use crate::domain::foundation::{ContentId, DomainError, ErrorCode, PaymentId, Timestamp, UserId};
use crate::ports::EntitlementStore;

pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    user_id: String,
    content_id: String,
    granted_at: DateTime<Utc>,
    source_payment_id: Option<String>,
}

impl TryFrom<EntitlementRow> for EntitlementRecord {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::domain::foundation::ValidationError| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid entitlement row: {}", e))
        };
        Ok(EntitlementRecord {
            user_id: UserId::new(row.user_id).map_err(corrupt)?,
            content_id: ContentId::new(row.content_id).map_err(corrupt)?,
            granted_at: Timestamp::from_datetime(row.granted_at),
            source_payment_id: row
                .source_payment_id
                .map(PaymentId::new)
                .transpose()
                .map_err(corrupt)?,
        })
    }
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn get(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(
            r#"
            SELECT user_id, content_id, granted_at, source_payment_id
            FROM entitlements
            WHERE user_id = $1 AND content_id = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(content_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load entitlement: {}", e)))?;

        row.map(EntitlementRecord::try_from).transpose()
    }

    async fn create_if_absent(&self, record: EntitlementRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO entitlements (user_id, content_id, granted_at, source_payment_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, content_id) DO NOTHING
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(record.content_id.as_str())
        .bind(record.granted_at.as_datetime())
        .bind(record.source_payment_id.as_ref().map(|p| p.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to grant entitlement: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<EntitlementRecord>, DomainError> {
        let rows: Vec<EntitlementRow> = sqlx::query_as(
            r#"
            SELECT user_id, content_id, granted_at, source_payment_id
            FROM entitlements
            WHERE user_id = $1
            ORDER BY granted_at ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list entitlements: {}", e)))?;

        rows.into_iter().map(EntitlementRecord::try_from).collect()
    }
}
