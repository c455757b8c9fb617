//! Entitlement domain events.

use crate::domain::foundation::{domain_event, ContentId, EventId, PaymentId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use super::EntitlementRecord;

/// A new entitlement was created. Never emitted for idempotent re-grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementGranted {
    pub event_id: EventId,
    /// `user_id:content_id`
    pub entitlement_key: String,
    pub user_id: UserId,
    pub content_id: ContentId,
    pub source_payment_id: Option<PaymentId>,
    pub granted_at: Timestamp,
}

impl EntitlementGranted {
    pub fn new(record: &EntitlementRecord) -> Self {
        Self {
            event_id: EventId::new(),
            entitlement_key: format!("{}:{}", record.user_id, record.content_id),
            user_id: record.user_id.clone(),
            content_id: record.content_id.clone(),
            source_payment_id: record.source_payment_id.clone(),
            granted_at: record.granted_at,
        }
    }
}

domain_event!(
    EntitlementGranted,
    event_type = "entitlement.granted.v1",
    schema_version = 1,
    aggregate_id = entitlement_key,
    aggregate_type = "Entitlement",
    occurred_at = granted_at,
    event_id = event_id
);
