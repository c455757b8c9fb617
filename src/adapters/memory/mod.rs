//! In-memory port implementations.
//!
//! Used by tests and by the server when no database URL is configured.
//! State lives only as long as the process.

mod content_ownership;
mod entitlement_store;
mod payment_store;

pub use content_ownership::InMemoryContentOwnership;
pub use entitlement_store::InMemoryEntitlementStore;
pub use payment_store::InMemoryPaymentStore;

use crate::domain::foundation::{DomainError, ErrorCode};

fn poisoned<T>(_: T) -> DomainError {
    DomainError::new(ErrorCode::InternalError, "in-memory store lock poisoned")
}
