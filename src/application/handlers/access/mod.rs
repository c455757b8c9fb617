//! Content access query handlers.

mod check_content_access;
mod list_purchases;

pub use check_content_access::{
    CheckContentAccessHandler, CheckContentAccessQuery, CheckContentAccessResult,
};
pub use list_purchases::{ListPurchasesHandler, ListPurchasesQuery, ListPurchasesResult};
