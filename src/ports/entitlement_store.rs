//! Entitlement store port.

use crate::domain::entitlement::EntitlementRecord;
use crate::domain::foundation::{ContentId, DomainError, UserId};
use async_trait::async_trait;

/// Port for entitlement persistence.
///
/// Records are keyed by `(user_id, content_id)` and never mutated, so there
/// is no upsert.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Find the entitlement for a user and content item.
    async fn get(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<Option<EntitlementRecord>, DomainError>;

    /// Insert the record unless one already exists for its key.
    ///
    /// Returns `true` if this call created it. Concurrent callers for the
    /// same key see exactly one `true`.
    async fn create_if_absent(&self, record: EntitlementRecord) -> Result<bool, DomainError>;

    /// All entitlements held by a user, oldest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<EntitlementRecord>, DomainError>;
}
