//! Payment record entity.

use crate::domain::foundation::{Amount, ContentId, PaymentId, Timestamp, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use super::machine::Transition;
use super::PaymentState;

/// Durable lifecycle state of a single payment.
///
/// # Invariants
///
/// - `payment_id` is globally unique
/// - `state` only moves forward (see [`PaymentState::rank`])
/// - `transaction_id` is set only once settlement was verified or reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub content_id: ContentId,
    pub amount: Amount,
    pub memo: String,
    pub state: PaymentState,
    pub transaction_id: Option<TransactionId>,

    /// Reference returned by the network when it verified settlement.
    pub settlement_ref: Option<String>,

    /// Why the network rejected the payment, when `state` is `Failed`.
    pub failure_reason: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentRecord {
    /// A fresh record in `Created`.
    pub fn new(
        payment_id: PaymentId,
        user_id: UserId,
        content_id: ContentId,
        amount: Amount,
        memo: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            payment_id,
            user_id,
            content_id,
            amount,
            memo: memo.into(),
            state: PaymentState::Created,
            transaction_id: None,
            settlement_ref: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Default memo shown by the payment network for an unlock purchase.
    pub fn default_memo(content_id: &ContentId) -> String {
        format!("Unlock: {}", content_id)
    }

    /// Returns a copy of this record with the transition applied.
    ///
    /// Fields the transition leaves unset keep their current value.
    pub fn with_transition(&self, transition: &Transition, now: Timestamp) -> Self {
        let mut next = self.clone();
        next.state = transition.to;
        if let Some(tx) = &transition.transaction_id {
            next.transaction_id = Some(tx.clone());
        }
        if let Some(reference) = &transition.settlement_ref {
            next.settlement_ref = Some(reference.clone());
        }
        if let Some(reason) = &transition.failure_reason {
            next.failure_reason = Some(reason.clone());
        }
        next.updated_at = now;
        next
    }

    /// True when this record authorizes an entitlement grant.
    pub fn grants_entitlement(&self) -> bool {
        self.state.is_settled()
    }
}
