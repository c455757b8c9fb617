//! Entitlement record entity.

use crate::domain::foundation::{ContentId, PaymentId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Durable grant of full access to one piece of content for one user.
///
/// Keyed by `(user_id, content_id)`. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub granted_at: Timestamp,

    /// Payment that settled this grant. `None` for creator-owned content.
    pub source_payment_id: Option<PaymentId>,
}

impl EntitlementRecord {
    /// Grant backed by a settled payment.
    pub fn from_payment(
        user_id: UserId,
        content_id: ContentId,
        payment_id: PaymentId,
        granted_at: Timestamp,
    ) -> Self {
        Self {
            user_id,
            content_id,
            granted_at,
            source_payment_id: Some(payment_id),
        }
    }

    /// Grant for the creator of the content.
    pub fn for_creator(user_id: UserId, content_id: ContentId, granted_at: Timestamp) -> Self {
        Self {
            user_id,
            content_id,
            granted_at,
            source_payment_id: None,
        }
    }

    pub fn key(&self) -> (UserId, ContentId) {
        (self.user_id.clone(), self.content_id.clone())
    }

    pub fn is_creator_grant(&self) -> bool {
        self.source_payment_id.is_none()
    }
}
