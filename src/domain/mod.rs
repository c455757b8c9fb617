//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `payment` - Payment lifecycle state machine and reconciliation errors
//! - `entitlement` - Access grants and the access authorizer

pub mod entitlement;
pub mod foundation;
pub mod payment;
