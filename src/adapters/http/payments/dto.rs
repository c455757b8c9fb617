//! HTTP DTOs for payment endpoints.
//!
//! Field names follow the client SDK, which speaks camelCase.

use serde::{Deserialize, Serialize};

use crate::application::reconciliation::{Disposition, ReconciliationOutcome};
use crate::domain::entitlement::EntitlementRecord;
use crate::domain::payment::{PaymentRecord, PaymentState};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Approval callback, sent once the client has created the payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePaymentRequest {
    pub payment_id: String,
    pub content_id: String,
    pub amount: f64,
}

/// Completion callback carrying the settlement transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePaymentRequest {
    pub payment_id: String,
    pub txid: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledPaymentRequest {
    pub payment_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// The network's payment object, as handed to the client's
/// incomplete-payment callback.
///
/// Only the identifier is read. Everything else is fetched from the network.
#[derive(Debug, Clone, Deserialize)]
pub struct IncompletePaymentRequest {
    pub payment: ReportedPayment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportedPayment {
    pub identifier: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Payment record view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_id: String,
    pub content_id: String,
    pub amount: String,
    pub memo: String,
    pub state: PaymentState,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    /// RFC 3339.
    pub created_at: String,
    pub updated_at: String,
}

impl From<&PaymentRecord> for PaymentView {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            payment_id: record.payment_id.to_string(),
            content_id: record.content_id.to_string(),
            amount: record.amount.to_string(),
            memo: record.memo.clone(),
            state: record.state,
            transaction_id: record.transaction_id.as_ref().map(|t| t.to_string()),
            failure_reason: record.failure_reason.clone(),
            created_at: record.created_at.as_datetime().to_rfc3339(),
            updated_at: record.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Response to every payment signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSignalResponse {
    pub payment: PaymentView,
    /// False when the signal was an idempotent no-op.
    pub changed: bool,
    pub already_completed: bool,
    pub entitlement_granted: bool,
}

impl From<ReconciliationOutcome> for PaymentSignalResponse {
    fn from(outcome: ReconciliationOutcome) -> Self {
        Self {
            payment: PaymentView::from(&outcome.record),
            changed: matches!(outcome.disposition, Disposition::Transitioned { .. }),
            already_completed: outcome.already_completed(),
            entitlement_granted: outcome.entitlement_granted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseView {
    pub content_id: String,
    pub granted_at: String,
    pub source_payment_id: Option<String>,
}

impl From<&EntitlementRecord> for PurchaseView {
    fn from(record: &EntitlementRecord) -> Self {
        Self {
            content_id: record.content_id.to_string(),
            granted_at: record.granted_at.as_datetime().to_rfc3339(),
            source_payment_id: record.source_payment_id.as_ref().map(|p| p.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasesResponse {
    pub purchases: Vec<PurchaseView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_request_reads_camel_case() {
        let req: ApprovePaymentRequest = serde_json::from_str(
            r#"{"paymentId":"p1","contentId":"post-1","amount":3.14}"#,
        )
        .unwrap();
        assert_eq!(req.payment_id, "p1");
        assert_eq!(req.content_id, "post-1");
    }

    #[test]
    fn incomplete_request_ignores_client_payment_fields() {
        let req: IncompletePaymentRequest = serde_json::from_str(
            r#"{"payment":{"identifier":"p9","user_uid":"mallory","status":{"developer_completed":true}}}"#,
        )
        .unwrap();
        assert_eq!(req.payment.identifier, "p9");
    }

    #[test]
    fn cancelled_request_reason_is_optional() {
        let req: CancelledPaymentRequest =
            serde_json::from_str(r#"{"paymentId":"p1"}"#).unwrap();
        assert!(req.reason.is_none());
    }
}
