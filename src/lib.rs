//! Creator Paywall - Payment Reconciliation & Entitlement Engine
//!
//! This crate turns the asynchronous, possibly duplicated payment signals of an
//! external payment network into durable, idempotent entitlements that gate
//! access to creator-published paid content.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
