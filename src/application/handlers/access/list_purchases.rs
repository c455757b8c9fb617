//! ListPurchasesHandler - Query handler for a user's entitlements.
//!
//! Server-authoritative replacement for client-side "purchased" flags.

use std::sync::Arc;

use crate::domain::entitlement::EntitlementRecord;
use crate::domain::foundation::{ContentId, DomainError, UserId};
use crate::ports::EntitlementStore;

#[derive(Debug, Clone)]
pub struct ListPurchasesQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct ListPurchasesResult {
    pub entitlements: Vec<EntitlementRecord>,
}

impl ListPurchasesResult {
    /// Content ids the user may read, in grant order.
    pub fn content_ids(&self) -> Vec<ContentId> {
        self.entitlements
            .iter()
            .map(|e| e.content_id.clone())
            .collect()
    }
}

pub struct ListPurchasesHandler {
    entitlements: Arc<dyn EntitlementStore>,
}

impl ListPurchasesHandler {
    pub fn new(entitlements: Arc<dyn EntitlementStore>) -> Self {
        Self { entitlements }
    }

    pub async fn handle(&self, query: ListPurchasesQuery) -> Result<ListPurchasesResult, DomainError> {
        let entitlements = self.entitlements.list_for_user(&query.user_id).await?;
        Ok(ListPurchasesResult { entitlements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryEntitlementStore;
    use crate::domain::foundation::{PaymentId, Timestamp};

    #[tokio::test]
    async fn lists_only_the_callers_entitlements() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        for (user, content) in [(&alice, "c1"), (&bob, "c2"), (&alice, "c3")] {
            store
                .create_if_absent(EntitlementRecord::from_payment(
                    user.clone(),
                    ContentId::new(content).unwrap(),
                    PaymentId::new(format!("p-{}", content)).unwrap(),
                    Timestamp::now(),
                ))
                .await
                .unwrap();
        }
        let handler = ListPurchasesHandler::new(store);

        let result = handler
            .handle(ListPurchasesQuery {
                user_id: alice.clone(),
            })
            .await
            .unwrap();

        let ids: Vec<String> = result.content_ids().iter().map(|c| c.to_string()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }
}
