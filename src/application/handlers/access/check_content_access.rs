//! CheckContentAccessHandler - Query handler gating full content.
//!
//! Fail-secure: if either the creator lookup or the entitlement lookup
//! fails, access is denied.

use std::sync::Arc;

use tracing::warn;

use crate::domain::entitlement::{AccessAuthorizer, AccessDecision};
use crate::domain::foundation::{ContentId, UserId};
use crate::ports::ContentOwnership;

/// Query to check whether a user may read a content item in full.
#[derive(Debug, Clone)]
pub struct CheckContentAccessQuery {
    pub user_id: UserId,
    pub content_id: ContentId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckContentAccessResult {
    pub decision: AccessDecision,
}

impl CheckContentAccessResult {
    pub fn can_access_full(&self) -> bool {
        self.decision.is_allowed()
    }
}

pub struct CheckContentAccessHandler {
    ownership: Arc<dyn ContentOwnership>,
    authorizer: AccessAuthorizer,
}

impl CheckContentAccessHandler {
    pub fn new(ownership: Arc<dyn ContentOwnership>, authorizer: AccessAuthorizer) -> Self {
        Self {
            ownership,
            authorizer,
        }
    }

    pub async fn handle(&self, query: CheckContentAccessQuery) -> CheckContentAccessResult {
        let is_creator = match self
            .ownership
            .is_creator(&query.user_id, &query.content_id)
            .await
        {
            Ok(is_creator) => is_creator,
            Err(err) => {
                warn!(
                    user_id = %query.user_id,
                    content_id = %query.content_id,
                    error = %err,
                    "Creator lookup failed, treating caller as non-creator"
                );
                false
            }
        };

        let decision = match self
            .authorizer
            .decide(&query.user_id, &query.content_id, is_creator)
            .await
        {
            Ok(decision) => decision,
            Err(err) => {
                warn!(
                    user_id = %query.user_id,
                    content_id = %query.content_id,
                    error = %err,
                    "Entitlement lookup failed, denying access"
                );
                AccessDecision::Denied
            }
        };

        CheckContentAccessResult { decision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryContentOwnership, InMemoryEntitlementStore};
    use crate::domain::entitlement::EntitlementRecord;
    use crate::domain::foundation::{DomainError, PaymentId, Timestamp};
    use crate::ports::EntitlementStore;
    use async_trait::async_trait;

    struct FailingOwnership;

    #[async_trait]
    impl ContentOwnership for FailingOwnership {
        async fn is_creator(
            &self,
            _user_id: &UserId,
            _content_id: &ContentId,
        ) -> Result<bool, DomainError> {
            Err(DomainError::storage("content service down"))
        }
    }

    fn query(user: &str) -> CheckContentAccessQuery {
        CheckContentAccessQuery {
            user_id: UserId::new(user).unwrap(),
            content_id: ContentId::new("post-1").unwrap(),
        }
    }

    #[tokio::test]
    async fn creator_may_read_own_content() {
        let ownership = InMemoryContentOwnership::new();
        ownership.publish(UserId::new("carol").unwrap(), ContentId::new("post-1").unwrap());
        let handler = CheckContentAccessHandler::new(
            Arc::new(ownership),
            AccessAuthorizer::new(Arc::new(InMemoryEntitlementStore::new())),
        );

        let result = handler.handle(query("carol")).await;

        assert_eq!(result.decision, AccessDecision::Creator);
    }

    #[tokio::test]
    async fn stranger_is_denied() {
        let handler = CheckContentAccessHandler::new(
            Arc::new(InMemoryContentOwnership::new()),
            AccessAuthorizer::new(Arc::new(InMemoryEntitlementStore::new())),
        );

        assert!(!handler.handle(query("dave")).await.can_access_full());
    }

    #[tokio::test]
    async fn owner_lookup_failure_still_honours_entitlement() {
        let entitlements = Arc::new(InMemoryEntitlementStore::new());
        entitlements
            .create_if_absent(EntitlementRecord::from_payment(
                UserId::new("erin").unwrap(),
                ContentId::new("post-1").unwrap(),
                PaymentId::new("p1").unwrap(),
                Timestamp::now(),
            ))
            .await
            .unwrap();
        let handler =
            CheckContentAccessHandler::new(Arc::new(FailingOwnership), AccessAuthorizer::new(entitlements));

        let result = handler.handle(query("erin")).await;

        assert_eq!(result.decision, AccessDecision::Entitled);
    }
}
