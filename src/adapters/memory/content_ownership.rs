//! In-memory content ownership registry.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{ContentId, DomainError, UserId};
use crate::ports::ContentOwnership;

use super::poisoned;

/// Maps each content item to its creator.
#[derive(Debug, Default)]
pub struct InMemoryContentOwnership {
    creators: RwLock<HashMap<ContentId, UserId>>,
}

impl InMemoryContentOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `creator` as the author of `content_id`.
    pub fn publish(&self, creator: UserId, content_id: ContentId) {
        if let Ok(mut creators) = self.creators.write() {
            creators.insert(content_id, creator);
        }
    }
}

#[async_trait]
impl ContentOwnership for InMemoryContentOwnership {
    async fn is_creator(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<bool, DomainError> {
        let creators = self.creators.read().map_err(poisoned)?;
        Ok(creators.get(content_id) == Some(user_id))
    }
}
