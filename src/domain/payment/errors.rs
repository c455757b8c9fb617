//! Reconciliation error taxonomy.
//!
//! Retryable errors never change state. Non-retryable errors either change
//! nothing (`InvalidTransition`, `Validation`) or have already moved the
//! record to `Failed` (`ExternalVerificationFailed`).

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, TransactionId, ValidationError,
};
use thiserror::Error;

use super::PaymentState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// A signal disagrees in kind with the record's terminal state.
    #[error("Payment {payment_id} in state {state} cannot accept {signal}")]
    InvalidTransition {
        payment_id: PaymentId,
        state: PaymentState,
        signal: &'static str,
    },

    /// The network explicitly rejected the payment. The record is now `Failed`.
    #[error("Payment {payment_id} rejected by the payment network: {reason}")]
    ExternalVerificationFailed { payment_id: PaymentId, reason: String },

    /// The network could not yet confirm the transaction. The record is unchanged.
    #[error("Transaction {transaction_id} is not verified for payment {payment_id}")]
    CompletionUnverified {
        payment_id: PaymentId,
        transaction_id: TransactionId,
    },

    /// Timeout or network failure talking to the payment network.
    #[error("Payment network unavailable: {0}")]
    ExternalVerificationUnavailable(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The client's description of a payment disagrees with the network's.
    #[error("Payment {payment_id} does not match the payment network on {field}")]
    PaymentMismatch {
        payment_id: PaymentId,
        field: &'static str,
    },

    /// Another writer moved the record between our read and our write.
    #[error("Payment {payment_id} was modified concurrently")]
    ConcurrentUpdate { payment_id: PaymentId },

    /// The unit of work stopped before reporting an outcome.
    #[error("Reconciliation interrupted: {0}")]
    Interrupted(String),

    /// The signal came from a user who does not own the payment.
    #[error("Payment {payment_id} belongs to another user")]
    NotPaymentOwner { payment_id: PaymentId },

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl ReconciliationError {
    /// True if the caller may retry the same signal later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconciliationError::CompletionUnverified { .. }
                | ReconciliationError::ExternalVerificationUnavailable(_)
                | ReconciliationError::StorageUnavailable(_)
                | ReconciliationError::ConcurrentUpdate { .. }
                | ReconciliationError::Interrupted(_)
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ReconciliationError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            ReconciliationError::ExternalVerificationFailed { .. } => {
                ErrorCode::VerificationRejected
            }
            ReconciliationError::CompletionUnverified { .. }
            | ReconciliationError::ExternalVerificationUnavailable(_) => {
                ErrorCode::VerificationUnavailable
            }
            ReconciliationError::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            ReconciliationError::PaymentMismatch { .. } => ErrorCode::PaymentMismatch,
            ReconciliationError::ConcurrentUpdate { .. } => ErrorCode::ConcurrentModification,
            ReconciliationError::Interrupted(_) => ErrorCode::InternalError,
            ReconciliationError::NotPaymentOwner { .. } => ErrorCode::Forbidden,
            ReconciliationError::Validation(_) => ErrorCode::ValidationFailed,
        }
    }
}

impl From<ValidationError> for ReconciliationError {
    fn from(err: ValidationError) -> Self {
        ReconciliationError::Validation(err.to_string())
    }
}

/// Port errors reaching the coordinator are storage-side unless they are
/// validation failures.
impl From<DomainError> for ReconciliationError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                ReconciliationError::Validation(err.message)
            }
            ErrorCode::VerificationUnavailable => {
                ReconciliationError::ExternalVerificationUnavailable(err.message)
            }
            _ => ReconciliationError::StorageUnavailable(err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ReconciliationError::StorageUnavailable("down".into()).is_retryable());
        assert!(ReconciliationError::ExternalVerificationUnavailable("timeout".into()).is_retryable());
        assert!(ReconciliationError::CompletionUnverified {
            payment_id: PaymentId::new("p").unwrap(),
            transaction_id: TransactionId::new("t").unwrap(),
        }
        .is_retryable());
    }

    #[test]
    fn definitive_errors_are_not_retryable() {
        let invalid = ReconciliationError::InvalidTransition {
            payment_id: PaymentId::new("p").unwrap(),
            state: PaymentState::Cancelled,
            signal: "request_completion",
        };
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.code(), ErrorCode::InvalidStateTransition);
        assert!(!ReconciliationError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn concurrent_update_is_retryable_but_mismatch_is_not() {
        let payment_id = PaymentId::new("p").unwrap();
        assert!(ReconciliationError::ConcurrentUpdate {
            payment_id: payment_id.clone()
        }
        .is_retryable());
        let mismatch = ReconciliationError::PaymentMismatch {
            payment_id,
            field: "content",
        };
        assert!(!mismatch.is_retryable());
        assert_eq!(mismatch.code(), ErrorCode::PaymentMismatch);
    }

    #[test]
    fn database_domain_error_becomes_storage_unavailable() {
        let err: ReconciliationError =
            DomainError::new(ErrorCode::DatabaseError, "connection refused").into();
        assert_eq!(
            err,
            ReconciliationError::StorageUnavailable("connection refused".into())
        );
    }

    #[test]
    fn validation_domain_error_stays_validation() {
        let err: ReconciliationError = DomainError::validation("amount", "must be positive").into();
        assert!(matches!(err, ReconciliationError::Validation(_)));
    }
}
