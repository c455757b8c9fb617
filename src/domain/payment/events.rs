//! Payment domain events.

use crate::domain::foundation::{
    domain_event, ContentId, EventId, PaymentId, Timestamp, TransactionId, UserId,
};
use serde::{Deserialize, Serialize};

use super::{PaymentRecord, PaymentState};

/// A payment record committed a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransitioned {
    pub event_id: EventId,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub content_id: ContentId,
    /// `None` when the record was first seeded by this transition.
    pub from: Option<PaymentState>,
    pub to: PaymentState,
    pub transaction_id: Option<TransactionId>,
    pub occurred_at: Timestamp,
}

impl PaymentTransitioned {
    pub fn new(from: Option<PaymentState>, record: &PaymentRecord) -> Self {
        Self {
            event_id: EventId::new(),
            payment_id: record.payment_id.clone(),
            user_id: record.user_id.clone(),
            content_id: record.content_id.clone(),
            from,
            to: record.state,
            transaction_id: record.transaction_id.clone(),
            occurred_at: record.updated_at,
        }
    }
}

domain_event!(
    PaymentTransitioned,
    event_type = "payment.transitioned.v1",
    schema_version = 1,
    aggregate_id = payment_id,
    aggregate_type = "Payment",
    occurred_at = occurred_at,
    event_id = event_id
);
