//! Payment domain module.
//!
//! Tracks each payment's lifecycle as reported by the client and confirmed
//! by the payment network.
//!
//! # Module Structure
//!
//! - `state` - PaymentState state machine
//! - `record` - PaymentRecord entity
//! - `signal` - Inbound signals and network verdicts
//! - `machine` - Pure transition function
//! - `errors` - Reconciliation error taxonomy
//! - `events` - Payment domain events

mod errors;
mod events;
mod machine;
mod record;
mod signal;
mod state;

pub use errors::ReconciliationError;
pub use events::PaymentTransitioned;
pub use machine::{decide, Decision, NoOp, Transition, VerificationRequest};
pub use record::PaymentRecord;
pub use signal::{
    ApprovalVerdict, CancelSource, CompletionVerdict, PaymentSignal, RecoveryPayload,
};
pub use state::PaymentState;
