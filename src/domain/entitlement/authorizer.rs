//! Access authorizer for paid content.
//!
//! Answers a single question: may this user read the full content? The
//! answer depends only on creator identity and the existence of an
//! entitlement. Payment state is never consulted.
//!
//! # Design
//!
//! Fail-secure: a storage error surfaces as `Err`, and callers that cannot
//! propagate it deny access.

use std::sync::Arc;

use crate::domain::foundation::{ContentId, DomainError, UserId};
use crate::ports::EntitlementStore;
use serde::{Deserialize, Serialize};

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    /// Caller created the content.
    Creator,
    /// Caller holds an entitlement.
    Entitled,
    /// Caller must purchase first.
    Denied,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, AccessDecision::Denied)
    }
}

/// Read-only gate over the entitlement store. Lock-free.
#[derive(Clone)]
pub struct AccessAuthorizer {
    entitlements: Arc<dyn EntitlementStore>,
}

impl AccessAuthorizer {
    pub fn new(entitlements: Arc<dyn EntitlementStore>) -> Self {
        Self { entitlements }
    }

    /// Returns the reason access is (or is not) granted.
    pub async fn decide(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
        is_creator_of_content: bool,
    ) -> Result<AccessDecision, DomainError> {
        if is_creator_of_content {
            return Ok(AccessDecision::Creator);
        }
        match self.entitlements.get(user_id, content_id).await? {
            Some(_) => Ok(AccessDecision::Entitled),
            None => Ok(AccessDecision::Denied),
        }
    }

    /// True iff the user created the content or holds an entitlement.
    pub async fn can_access_full(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
        is_creator_of_content: bool,
    ) -> Result<bool, DomainError> {
        Ok(self
            .decide(user_id, content_id, is_creator_of_content)
            .await?
            .is_allowed())
    }
}
