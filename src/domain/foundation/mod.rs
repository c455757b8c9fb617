//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, errors, and event infrastructure
//! that form the vocabulary of the paywall domain.

mod amount;
mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use amount::Amount;
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{
    domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent,
};
pub use ids::{ContentId, PaymentId, TransactionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
