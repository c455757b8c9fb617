//! In-memory entitlement store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::entitlement::EntitlementRecord;
use crate::domain::foundation::{ContentId, DomainError, UserId};
use crate::ports::EntitlementStore;

use super::poisoned;

type Key = (UserId, ContentId);

#[derive(Debug, Default)]
struct Inner {
    by_key: HashMap<Key, EntitlementRecord>,
    /// Keys in grant order.
    order: Vec<Key>,
}

/// Entitlements held in a map guarded by a single lock, so the
/// check-and-insert of `create_if_absent` is atomic.
#[derive(Debug, Default)]
pub struct InMemoryEntitlementStore {
    inner: RwLock<Inner>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn get(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .by_key
            .get(&(user_id.clone(), content_id.clone()))
            .cloned())
    }

    async fn create_if_absent(&self, record: EntitlementRecord) -> Result<bool, DomainError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let key = record.key();
        if inner.by_key.contains_key(&key) {
            return Ok(false);
        }
        inner.order.push(key.clone());
        inner.by_key.insert(key, record);
        Ok(true)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<EntitlementRecord>, DomainError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .order
            .iter()
            .filter(|(user, _)| user == user_id)
            .filter_map(|key| inner.by_key.get(key).cloned())
            .collect())
    }
}
