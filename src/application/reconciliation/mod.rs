//! Payment reconciliation.
//!
//! - `lock_table` - Per-payment mutual exclusion
//! - `coordinator` - The four signal operations plus creator grants
//! - `sweeper` - Background recovery of stalled payments

mod coordinator;
mod lock_table;
mod sweeper;

pub use coordinator::{
    CancelPaymentCommand, Disposition, ReconciliationCoordinator, ReconciliationOutcome,
    RecoverIncompleteCommand, RequestApprovalCommand, RequestCompletionCommand,
};
pub use lock_table::{PaymentLockGuard, PaymentLockTable};
pub use sweeper::{IncompletePaymentSweeper, SweepReport, SweeperConfig};
