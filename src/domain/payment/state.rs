//! Payment lifecycle state machine.
//!
//! States advance monotonically along a single rank axis. The four terminal
//! states share the top rank and never move again.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a payment as tracked by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Known locally, nothing asked of the network yet.
    Created,

    /// Server-side approval has been requested and not yet confirmed.
    ApprovalRequested,

    /// The network confirmed the payment is legitimately pending.
    Approved,

    /// Settlement verified. Grants entitlement.
    Completed,

    /// Cancelled by the network or the platform.
    Cancelled,

    /// Cancelled by the paying user.
    UserCancelled,

    /// Explicitly rejected by the network.
    Failed,
}

impl PaymentState {
    pub const ALL: [PaymentState; 7] = [
        PaymentState::Created,
        PaymentState::ApprovalRequested,
        PaymentState::Approved,
        PaymentState::Completed,
        PaymentState::Cancelled,
        PaymentState::UserCancelled,
        PaymentState::Failed,
    ];

    /// Position on the progress axis. Terminal states share the top rank.
    pub fn rank(&self) -> u8 {
        match self {
            PaymentState::Created => 0,
            PaymentState::ApprovalRequested => 1,
            PaymentState::Approved => 2,
            PaymentState::Completed
            | PaymentState::Cancelled
            | PaymentState::UserCancelled
            | PaymentState::Failed => 3,
        }
    }

    /// True only for `Completed`.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentState::Completed)
    }

    /// True for the terminal states that never grant entitlement.
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            PaymentState::Cancelled | PaymentState::UserCancelled | PaymentState::Failed
        )
    }

    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Created => "created",
            PaymentState::ApprovalRequested => "approval_requested",
            PaymentState::Approved => "approved",
            PaymentState::Completed => "completed",
            PaymentState::Cancelled => "cancelled",
            PaymentState::UserCancelled => "user_cancelled",
            PaymentState::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("payment_state", format!("unknown state '{}'", s))
            })
    }
}

impl StateMachine for PaymentState {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.rank() < 3 && target.rank() > self.rank()
    }

    fn valid_transitions(&self) -> Vec<Self> {
        PaymentState::ALL
            .into_iter()
            .filter(|target| self.can_transition_to(target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentState::*;

    #[test]
    fn created_can_advance_to_every_later_state() {
        assert_eq!(
            Created.valid_transitions(),
            vec![ApprovalRequested, Approved, Completed, Cancelled, UserCancelled, Failed]
        );
    }

    #[test]
    fn approved_can_only_reach_terminals() {
        assert_eq!(
            Approved.valid_transitions(),
            vec![Completed, Cancelled, UserCancelled, Failed]
        );
    }

    #[test]
    fn approved_cannot_regress_to_approval_requested() {
        let result = Approved.transition_to(ApprovalRequested);
        assert!(result.is_err());
    }

    #[test]
    fn terminal_states_are_terminal() {
        for state in [Completed, Cancelled, UserCancelled, Failed] {
            assert!(state.is_terminal(), "{:?} should be terminal", state);
        }
        for state in [Created, ApprovalRequested, Approved] {
            assert!(!state.is_terminal(), "{:?} should not be terminal", state);
        }
    }

    #[test]
    fn settled_and_aborted_partition_terminals() {
        for state in PaymentState::ALL {
            if state.is_terminal() {
                assert_ne!(state.is_settled(), state.is_aborted());
            } else {
                assert!(!state.is_settled() && !state.is_aborted());
            }
        }
    }

    #[test]
    fn string_form_parses_back() {
        for state in PaymentState::ALL {
            assert_eq!(state.as_str().parse::<PaymentState>().unwrap(), state);
        }
        assert!("settled".parse::<PaymentState>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&UserCancelled).unwrap();
        assert_eq!(json, "\"user_cancelled\"");
    }
}
