//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `PaymentRecordStore` - Payment lifecycle state per payment id
//! - `EntitlementStore` - Access grants per (user, content)
//!
//! ## External Collaborators
//!
//! - `VerificationContract` - Payment network server-side verification
//! - `ContentOwnership` - "Is this user the creator" fact from the content repository
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing domain events

mod content_ownership;
mod entitlement_store;
mod event_publisher;
mod payment_record_store;
mod verification_contract;

pub use content_ownership::ContentOwnership;
pub use entitlement_store::EntitlementStore;
pub use event_publisher::EventPublisher;
pub use payment_record_store::PaymentRecordStore;
pub use verification_contract::{
    NetworkPayment, NetworkPaymentStatus, NetworkTransaction, VerificationContract,
    VerificationError,
};
