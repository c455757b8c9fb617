//! Pure payment transition function.
//!
//! `decide` maps a record and a signal onto a [`Decision`] without touching
//! storage or the network. Signals that need the network's word come back as
//! [`Decision::Verify`]; the caller performs the call and feeds the verdict
//! back in as another signal.

use crate::domain::foundation::{StateMachine, TransactionId};

use super::{
    ApprovalVerdict, CompletionVerdict, PaymentRecord, PaymentSignal, PaymentState,
    ReconciliationError,
};

/// A state change to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub to: PaymentState,
    pub transaction_id: Option<TransactionId>,
    pub settlement_ref: Option<String>,
    pub failure_reason: Option<String>,
}

impl Transition {
    pub fn to(state: PaymentState) -> Self {
        Self {
            to: state,
            transaction_id: None,
            settlement_ref: None,
            failure_reason: None,
        }
    }

    pub fn with_transaction(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn with_settlement_ref(mut self, settlement_ref: Option<String>) -> Self {
        self.settlement_ref = settlement_ref;
        self
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

/// Why a signal left the record untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOp {
    /// Record is terminal and the signal agrees with it.
    Terminal,
    /// Record is already `Completed` with this (or no) transaction.
    AlreadyCompleted,
    /// Approval was requested again after it was granted.
    AlreadyApproved,
    /// Recovery reported a state that is not ahead of the local one.
    NotNewer,
    /// A verdict arrived for a step the record has already moved past.
    StaleVerdict,
}

/// What the network must be asked before the signal can be decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationRequest {
    Approval,
    Completion(TransactionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Unchanged(NoOp),
    Apply(Transition),
    /// Optionally persist `advance` first, then ask the network.
    Verify {
        advance: Option<Transition>,
        request: VerificationRequest,
    },
}

/// Decides how `record` reacts to `signal`.
///
/// # Errors
///
/// - `InvalidTransition` when the signal contradicts a terminal state
/// - `CompletionUnverified` when the network could not verify a completion
pub fn decide(
    record: &PaymentRecord,
    signal: &PaymentSignal,
) -> Result<Decision, ReconciliationError> {
    let state = record.state;
    let invalid = || ReconciliationError::InvalidTransition {
        payment_id: record.payment_id.clone(),
        state,
        signal: signal.name(),
    };

    match signal {
        PaymentSignal::RequestApproval => Ok(match state {
            PaymentState::Created => Decision::Verify {
                advance: Some(Transition::to(PaymentState::ApprovalRequested)),
                request: VerificationRequest::Approval,
            },
            PaymentState::ApprovalRequested => Decision::Verify {
                advance: None,
                request: VerificationRequest::Approval,
            },
            PaymentState::Approved => Decision::Unchanged(NoOp::AlreadyApproved),
            PaymentState::Completed => Decision::Unchanged(NoOp::AlreadyCompleted),
            _ => Decision::Unchanged(NoOp::Terminal),
        }),

        PaymentSignal::ApprovalVerified(verdict) => {
            if state.rank() > PaymentState::ApprovalRequested.rank() {
                return Ok(Decision::Unchanged(NoOp::StaleVerdict));
            }
            Ok(Decision::Apply(match verdict {
                ApprovalVerdict::Approved => Transition::to(PaymentState::Approved),
                ApprovalVerdict::Rejected { reason } => {
                    Transition::to(PaymentState::Failed).with_failure_reason(reason.clone())
                }
            }))
        }

        PaymentSignal::RequestCompletion { transaction_id } => {
            if let Some(decision) = terminal_completion(record, transaction_id, &invalid)? {
                return Ok(decision);
            }
            Ok(Decision::Verify {
                advance: None,
                request: VerificationRequest::Completion(transaction_id.clone()),
            })
        }

        PaymentSignal::CompletionVerified {
            transaction_id,
            verdict,
        } => {
            if let Some(decision) = terminal_completion(record, transaction_id, &invalid)? {
                return Ok(decision);
            }
            match verdict {
                CompletionVerdict::Verified { settlement_ref } => Ok(Decision::Apply(
                    Transition::to(PaymentState::Completed)
                        .with_transaction(transaction_id.clone())
                        .with_settlement_ref(settlement_ref.clone()),
                )),
                CompletionVerdict::Unverified => Err(ReconciliationError::CompletionUnverified {
                    payment_id: record.payment_id.clone(),
                    transaction_id: transaction_id.clone(),
                }),
                CompletionVerdict::Rejected { reason } => Ok(Decision::Apply(
                    Transition::to(PaymentState::Failed).with_failure_reason(reason.clone()),
                )),
            }
        }

        PaymentSignal::Cancel { source } => match state {
            PaymentState::Completed => Err(invalid()),
            s if s.is_aborted() => Ok(Decision::Unchanged(NoOp::Terminal)),
            _ => Ok(Decision::Apply(Transition::to(source.target_state()))),
        },

        PaymentSignal::Recover {
            reported,
            transaction_id,
        } => {
            if state.is_terminal() {
                if reported.is_terminal() && reported.is_settled() != state.is_settled() {
                    return Err(invalid());
                }
                return Ok(Decision::Unchanged(if state.is_settled() {
                    NoOp::AlreadyCompleted
                } else {
                    NoOp::Terminal
                }));
            }
            if !state.can_transition_to(reported) {
                return Ok(Decision::Unchanged(NoOp::NotNewer));
            }
            let mut transition = Transition::to(*reported);
            if reported.is_settled() {
                if let Some(tx) = transaction_id {
                    transition = transition.with_transaction(tx.clone());
                }
            }
            Ok(Decision::Apply(transition))
        }
    }
}

/// Shared handling of completion signals against terminal records.
///
/// Returns `Ok(None)` when the record is not terminal and the signal should
/// proceed to verification.
fn terminal_completion(
    record: &PaymentRecord,
    transaction_id: &TransactionId,
    invalid: &dyn Fn() -> ReconciliationError,
) -> Result<Option<Decision>, ReconciliationError> {
    match record.state {
        PaymentState::Completed => match &record.transaction_id {
            Some(existing) if existing != transaction_id => Err(invalid()),
            _ => Ok(Some(Decision::Unchanged(NoOp::AlreadyCompleted))),
        },
        s if s.is_aborted() => Err(invalid()),
        _ => Ok(None),
    }
}
