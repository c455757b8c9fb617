//! Entitlement domain module.
//!
//! An entitlement is the durable, server-authoritative record that a user
//! may read a piece of paid content.

mod authorizer;
mod events;
mod record;

pub use authorizer::{AccessAuthorizer, AccessDecision};
pub use events::EntitlementGranted;
pub use record::EntitlementRecord;
