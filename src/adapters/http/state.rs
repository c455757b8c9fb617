//! Shared application state for HTTP handlers.

use std::sync::Arc;

use crate::application::handlers::{CheckContentAccessHandler, ListPurchasesHandler};
use crate::application::reconciliation::ReconciliationCoordinator;
use crate::domain::entitlement::AccessAuthorizer;
use crate::ports::{ContentOwnership, EntitlementStore, PaymentRecordStore};

/// Cloned for each request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ReconciliationCoordinator>,
    pub payments: Arc<dyn PaymentRecordStore>,
    pub entitlements: Arc<dyn EntitlementStore>,
    pub content_ownership: Arc<dyn ContentOwnership>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<ReconciliationCoordinator>,
        payments: Arc<dyn PaymentRecordStore>,
        entitlements: Arc<dyn EntitlementStore>,
        content_ownership: Arc<dyn ContentOwnership>,
    ) -> Self {
        Self {
            coordinator,
            payments,
            entitlements,
            content_ownership,
        }
    }

    pub fn check_content_access_handler(&self) -> CheckContentAccessHandler {
        CheckContentAccessHandler::new(
            self.content_ownership.clone(),
            AccessAuthorizer::new(self.entitlements.clone()),
        )
    }

    pub fn list_purchases_handler(&self) -> ListPurchasesHandler {
        ListPurchasesHandler::new(self.entitlements.clone())
    }
}
