//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Writes go through the reconciliation coordinator; reads are plain query
//! handlers.

pub mod handlers;
pub mod reconciliation;
