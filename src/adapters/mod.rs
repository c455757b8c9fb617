//! Adapters - Implementations of the ports for concrete infrastructure.
//!
//! - `events` - Event publishers
//! - `http` - axum REST API
//! - `memory` - In-memory stores for tests and development
//! - `network` - Payment network verifiers
//! - `postgres` - sqlx-backed stores

pub mod events;
pub mod http;
pub mod memory;
pub mod network;
pub mod postgres;

pub use events::{InMemoryEventBus, TracingEventPublisher};
