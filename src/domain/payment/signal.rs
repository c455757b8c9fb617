//! Inbound payment lifecycle signals and network verdicts.

use crate::domain::foundation::{Amount, ContentId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use super::PaymentState;

/// Who cancelled a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelSource {
    /// The payment network or the platform.
    Network,
    /// The paying user.
    User,
}

impl CancelSource {
    /// Maps a free-form cancellation reason onto a source.
    ///
    /// Only the reasons the client sends for a user-initiated abort count as
    /// `User`.
    pub fn from_reason(reason: Option<&str>) -> Self {
        match reason.map(|r| r.trim().to_ascii_lowercase()) {
            Some(r) if r == "user_cancelled" || r == "user_cancelled_payment" => CancelSource::User,
            _ => CancelSource::Network,
        }
    }

    pub fn target_state(&self) -> PaymentState {
        match self {
            CancelSource::Network => PaymentState::Cancelled,
            CancelSource::User => PaymentState::UserCancelled,
        }
    }
}

/// Network verdict on an approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalVerdict {
    Approved,
    Rejected { reason: String },
}

/// Network verdict on a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionVerdict {
    /// The transaction is bound to the payment and settled.
    Verified { settlement_ref: Option<String> },
    /// Not (yet) verifiable. Retry later.
    Unverified,
    /// The network says this payment will never settle.
    Rejected { reason: String },
}

/// A signal fed into the payment state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSignal {
    RequestApproval,
    ApprovalVerified(ApprovalVerdict),
    RequestCompletion {
        transaction_id: TransactionId,
    },
    CompletionVerified {
        transaction_id: TransactionId,
        verdict: CompletionVerdict,
    },
    Cancel {
        source: CancelSource,
    },
    /// The network reported this payment in `reported` state, e.g. after the
    /// user re-authenticated with a payment still in flight.
    Recover {
        reported: PaymentState,
        transaction_id: Option<TransactionId>,
    },
}

/// The network's view of an in-flight payment, as reported on recovery.
///
/// Seeds the record when the payment was never seen locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPayload {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub amount: Amount,
    pub memo: String,
    pub transaction_id: Option<TransactionId>,
    /// Whether the network already acknowledged server-side completion.
    pub network_acknowledged: bool,
}

impl PaymentSignal {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PaymentSignal::RequestApproval => "request_approval",
            PaymentSignal::ApprovalVerified(_) => "approval_verified",
            PaymentSignal::RequestCompletion { .. } => "request_completion",
            PaymentSignal::CompletionVerified { .. } => "completion_verified",
            PaymentSignal::Cancel { .. } => "cancel",
            PaymentSignal::Recover { .. } => "recover",
        }
    }
}
