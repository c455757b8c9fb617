//! Payment record store port.
//!
//! Durable keyed storage of payment lifecycle state. The coordinator is the
//! only writer. It holds the per-payment lock while writing, and every write
//! is conditional on the state it read, so writers in other processes cannot
//! both commit a transition out of the same state.

use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::domain::payment::{PaymentRecord, PaymentState};
use async_trait::async_trait;

/// Port for payment record persistence.
///
/// Implementations must ensure:
/// - `compare_and_save` is a single atomic conditional write (no partial writes)
/// - Unreachable storage returns `ErrorCode::StorageUnavailable` or
///   `ErrorCode::DatabaseError`
#[async_trait]
pub trait PaymentRecordStore: Send + Sync {
    /// Find a record by payment id.
    async fn get(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError>;

    /// Writes `record` only if the stored state still equals `expected`.
    ///
    /// `expected = None` means the record must not exist yet. Returns `false`
    /// without writing when another writer got there first.
    async fn compare_and_save(
        &self,
        record: &PaymentRecord,
        expected: Option<PaymentState>,
    ) -> Result<bool, DomainError>;

    /// Non-terminal records last updated before `updated_before`, oldest first.
    async fn list_stale(
        &self,
        updated_before: Timestamp,
        limit: usize,
    ) -> Result<Vec<PaymentRecord>, DomainError>;

    /// All records for a user, newest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>, DomainError>;
}
