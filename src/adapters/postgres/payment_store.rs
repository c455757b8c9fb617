//! PostgreSQL implementation of PaymentRecordStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::foundation::{
    Amount, ContentId, DomainError, ErrorCode, PaymentId, Timestamp, TransactionId, UserId,
};
use crate::domain::payment::{PaymentRecord, PaymentState};
use crate::ports::PaymentRecordStore;

pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment record.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    payment_id: String,
    user_id: String,
    content_id: String,
    amount: Decimal,
    memo: String,
    state: String,
    transaction_id: Option<String>,
    settlement_ref: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            payment_id: PaymentId::new(row.payment_id).map_err(corrupt)?,
            user_id: UserId::new(row.user_id).map_err(corrupt)?,
            content_id: ContentId::new(row.content_id).map_err(corrupt)?,
            amount: Amount::new(row.amount).map_err(corrupt)?,
            memo: row.memo,
            state: row.state.parse::<PaymentState>().map_err(corrupt)?,
            transaction_id: row
                .transaction_id
                .map(TransactionId::new)
                .transpose()
                .map_err(corrupt)?,
            settlement_ref: row.settlement_ref,
            failure_reason: row.failure_reason,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn corrupt(e: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid payment row: {}", e))
}

fn query_failed(action: &str) -> impl Fn(sqlx::Error) -> DomainError + '_ {
    move |e| DomainError::storage(format!("Failed to {} payment: {}", action, e))
}

const SELECT_COLUMNS: &str = r#"
    SELECT payment_id, user_id, content_id, amount, memo, state, transaction_id,
           settlement_ref, failure_reason, created_at, updated_at
    FROM payments
"#;

#[async_trait]
impl PaymentRecordStore for PostgresPaymentStore {
    async fn get(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("{} WHERE payment_id = $1", SELECT_COLUMNS))
                .bind(payment_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed("load"))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn compare_and_save(
        &self,
        record: &PaymentRecord,
        expected: Option<PaymentState>,
    ) -> Result<bool, DomainError> {
        let result = match expected {
            None => sqlx::query(
                r#"
                INSERT INTO payments (
                    payment_id, user_id, content_id, amount, memo, state, transaction_id,
                    settlement_ref, failure_reason, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (payment_id) DO NOTHING
                "#,
            )
            .bind(record.payment_id.as_str())
            .bind(record.user_id.as_str())
            .bind(record.content_id.as_str())
            .bind(record.amount.value())
            .bind(&record.memo)
            .bind(record.state.as_str())
            .bind(record.transaction_id.as_ref().map(|t| t.as_str()))
            .bind(&record.settlement_ref)
            .bind(&record.failure_reason)
            .bind(record.created_at.as_datetime())
            .bind(record.updated_at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(query_failed("insert"))?,

            // Only lifecycle columns move after creation.
            Some(state) => sqlx::query(
                r#"
                UPDATE payments SET
                    state = $2,
                    transaction_id = $3,
                    settlement_ref = $4,
                    failure_reason = $5,
                    updated_at = $6
                WHERE payment_id = $1 AND state = $7
                "#,
            )
            .bind(record.payment_id.as_str())
            .bind(record.state.as_str())
            .bind(record.transaction_id.as_ref().map(|t| t.as_str()))
            .bind(&record.settlement_ref)
            .bind(&record.failure_reason)
            .bind(record.updated_at.as_datetime())
            .bind(state.as_str())
            .execute(&self.pool)
            .await
            .map_err(query_failed("update"))?,
        };

        Ok(result.rows_affected() == 1)
    }

    async fn list_stale(
        &self,
        updated_before: Timestamp,
        limit: usize,
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "{} WHERE state IN ('created', 'approval_requested', 'approved') \
             AND updated_at < $1 ORDER BY updated_at ASC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(updated_before.as_datetime())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list stale"))?;

        rows.into_iter().map(PaymentRecord::try_from).collect()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list"))?;

        rows.into_iter().map(PaymentRecord::try_from).collect()
    }
}
