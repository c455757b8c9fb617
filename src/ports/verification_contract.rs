//! Verification contract port for the external payment network.
//!
//! The network is the authority on whether a payment is pending, settled, or
//! dead. This port is the only channel through which the paywall asks.
//!
//! # Design
//!
//! - **Provider-idempotent**: every call may be repeated safely
//! - **Transient vs definitive**: timeouts and transport errors are
//!   `VerificationError::Unavailable`, never a rejection

use crate::domain::foundation::{
    Amount, ContentId, PaymentId, TransactionId, UserId, ValidationError,
};
use crate::domain::payment::{
    ApprovalVerdict, CompletionVerdict, PaymentRecord, PaymentState, RecoveryPayload,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port for the payment network's server-side verification API.
#[async_trait]
pub trait VerificationContract: Send + Sync {
    /// Ask the network to confirm the payment is legitimately pending.
    async fn confirm_approval(
        &self,
        payment_id: &PaymentId,
    ) -> Result<ApprovalVerdict, VerificationError>;

    /// Ask the network to confirm `transaction_id` settles `payment_id`.
    async fn confirm_completion(
        &self,
        payment_id: &PaymentId,
        transaction_id: &TransactionId,
    ) -> Result<CompletionVerdict, VerificationError>;

    /// The network's current view of a payment.
    async fn fetch_payment(&self, payment_id: &PaymentId)
        -> Result<NetworkPayment, VerificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Timeout, transport failure, or a non-definitive response.
    #[error("payment network unavailable: {0}")]
    Unavailable(String),

    /// The network has no payment with this id.
    #[error("payment {0} is unknown to the payment network")]
    UnknownPayment(PaymentId),

    /// The network answered with something we could not interpret.
    #[error("malformed payment network response: {0}")]
    Malformed(String),
}

impl From<ValidationError> for VerificationError {
    fn from(err: ValidationError) -> Self {
        VerificationError::Malformed(err.to_string())
    }
}

/// Payment as described by the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPayment {
    pub identifier: String,
    pub user_uid: String,
    pub amount: Decimal,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub status: NetworkPaymentStatus,
    #[serde(default)]
    pub transaction: Option<NetworkTransaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPaymentStatus {
    #[serde(default)]
    pub developer_approved: bool,
    #[serde(default)]
    pub transaction_verified: bool,
    #[serde(default)]
    pub developer_completed: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub user_cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTransaction {
    pub txid: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, rename = "_link")]
    pub link: Option<String>,
}

impl NetworkPayment {
    /// Builds the network view of a locally known record. Used by test doubles.
    pub fn from_record(record: &PaymentRecord) -> Self {
        let state = record.state;
        Self {
            identifier: record.payment_id.to_string(),
            user_uid: record.user_id.to_string(),
            amount: record.amount.value(),
            memo: record.memo.clone(),
            metadata: serde_json::json!({ "productId": record.content_id.as_str() }),
            to_address: None,
            created_at: None,
            status: NetworkPaymentStatus {
                developer_approved: state.rank() >= PaymentState::Approved.rank()
                    && !state.is_aborted(),
                transaction_verified: state.is_settled(),
                developer_completed: state.is_settled(),
                cancelled: state.is_aborted(),
                user_cancelled: state == PaymentState::UserCancelled,
            },
            transaction: record.transaction_id.as_ref().map(|tx| NetworkTransaction {
                txid: tx.to_string(),
                verified: true,
                link: None,
            }),
        }
    }

    pub fn payment_id(&self) -> Result<PaymentId, ValidationError> {
        PaymentId::new(self.identifier.clone())
    }

    /// Content being purchased, carried in `metadata.productId`.
    pub fn content_id(&self) -> Result<ContentId, ValidationError> {
        let product = self
            .metadata
            .get("productId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::invalid_format("metadata", "missing productId"))?;
        ContentId::new(product)
    }

    /// Transaction bound to the payment, if the network has seen one.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction
            .as_ref()
            .and_then(|t| TransactionId::new(t.txid.clone()).ok())
    }

    /// Maps the network's status flags onto a lifecycle state.
    ///
    /// A verified transaction counts as settled even before the server has
    /// acknowledged completion.
    pub fn reported_state(&self) -> PaymentState {
        let status = &self.status;
        if status.user_cancelled {
            PaymentState::UserCancelled
        } else if status.cancelled {
            PaymentState::Cancelled
        } else if status.developer_completed
            || (status.transaction_verified && self.transaction_id().is_some())
        {
            PaymentState::Completed
        } else if status.developer_approved {
            PaymentState::Approved
        } else {
            PaymentState::Created
        }
    }

    /// Splits the network view into a reported state and a recovery payload.
    pub fn to_recovery(&self) -> Result<(PaymentState, RecoveryPayload), ValidationError> {
        let content_id = self.content_id()?;
        let memo = if self.memo.trim().is_empty() {
            PaymentRecord::default_memo(&content_id)
        } else {
            self.memo.clone()
        };
        let payload = RecoveryPayload {
            user_id: UserId::new(self.user_uid.clone())?,
            content_id,
            amount: Amount::new(self.amount)?,
            memo,
            transaction_id: self.transaction_id(),
            network_acknowledged: self.status.developer_completed,
        };
        Ok((self.reported_state(), payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incomplete_payment_json() -> serde_json::Value {
        serde_json::json!({
            "amount": 3.14,
            "user_uid": "user-1",
            "created_at": "2026-02-01T10:00:00Z",
            "identifier": "pay-1",
            "metadata": { "productId": "post-9", "contentType": "post" },
            "memo": "Unlock: Sunsets",
            "status": {
                "developer_approved": true,
                "transaction_verified": true,
                "developer_completed": false,
                "cancelled": false,
                "user_cancelled": false
            },
            "to_address": "GABC",
            "transaction": { "txid": "tx-77", "verified": true, "_link": "https://example.test/tx-77" }
        })
    }

    #[test]
    fn verified_but_unacknowledged_payment_reports_completed() {
        let payment: NetworkPayment = serde_json::from_value(incomplete_payment_json()).unwrap();

        let (state, payload) = payment.to_recovery().unwrap();

        assert_eq!(state, PaymentState::Completed);
        assert_eq!(payload.content_id.as_str(), "post-9");
        assert_eq!(payload.transaction_id.unwrap().as_str(), "tx-77");
        assert_eq!(payload.amount, Amount::parse("3.14").unwrap());
        assert!(!payload.network_acknowledged);
    }

    #[test]
    fn approved_without_transaction_reports_approved() {
        let mut json = incomplete_payment_json();
        json["status"]["transaction_verified"] = false.into();
        json["transaction"] = serde_json::Value::Null;
        let payment: NetworkPayment = serde_json::from_value(json).unwrap();

        assert_eq!(payment.reported_state(), PaymentState::Approved);
    }

    #[test]
    fn user_cancel_wins_over_other_flags() {
        let mut json = incomplete_payment_json();
        json["status"]["cancelled"] = true.into();
        json["status"]["user_cancelled"] = true.into();
        let payment: NetworkPayment = serde_json::from_value(json).unwrap();

        assert_eq!(payment.reported_state(), PaymentState::UserCancelled);
    }

    #[test]
    fn missing_product_id_is_rejected() {
        let mut json = incomplete_payment_json();
        json["metadata"] = serde_json::json!({});
        let payment: NetworkPayment = serde_json::from_value(json).unwrap();

        assert!(payment.to_recovery().is_err());
    }

    #[test]
    fn empty_memo_falls_back_to_unlock_memo() {
        let mut json = incomplete_payment_json();
        json["memo"] = "".into();
        let payment: NetworkPayment = serde_json::from_value(json).unwrap();

        let (_, payload) = payment.to_recovery().unwrap();
        assert_eq!(payload.memo, "Unlock: post-9");
    }
}
