//! Application handlers.
//!
//! Query handlers that read entitlement state.

pub mod access;

pub use access::{
    CheckContentAccessHandler, CheckContentAccessQuery, CheckContentAccessResult,
    ListPurchasesHandler, ListPurchasesQuery, ListPurchasesResult,
};
