//! PostgreSQL adapters - Database implementations for the storage ports.
//!
//! - `PostgresPaymentStore` - Payment records, one row per payment
//! - `PostgresEntitlementStore` - Entitlements keyed by user and content
//! - `PostgresContentOwnership` - Creator lookups

mod content_ownership;
mod entitlement_store;
mod payment_store;

pub use content_ownership::PostgresContentOwnership;
pub use entitlement_store::PostgresEntitlementStore;
pub use payment_store::PostgresPaymentStore;
