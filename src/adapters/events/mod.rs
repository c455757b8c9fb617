//! Event publisher adapters.
//!
//! - `InMemoryEventBus` - In-process capture of published events, for tests
//! - `TracingEventPublisher` - Writes each event to the structured log

mod in_memory;
mod tracing_publisher;

pub use in_memory::InMemoryEventBus;
pub use tracing_publisher::TracingEventPublisher;
