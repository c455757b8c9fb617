//! In-memory payment record store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::domain::payment::{PaymentRecord, PaymentState};
use crate::ports::PaymentRecordStore;

use super::poisoned;

#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    records: RwLock<HashMap<PaymentId, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PaymentRecordStore for InMemoryPaymentStore {
    async fn get(&self, payment_id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(payment_id).cloned())
    }

    async fn compare_and_save(
        &self,
        record: &PaymentRecord,
        expected: Option<PaymentState>,
    ) -> Result<bool, DomainError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let current = records.get(&record.payment_id).map(|r| r.state);
        if current != expected {
            return Ok(false);
        }
        records.insert(record.payment_id.clone(), record.clone());
        Ok(true)
    }

    async fn list_stale(
        &self,
        updated_before: Timestamp,
        limit: usize,
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut stale: Vec<PaymentRecord> = records
            .values()
            .filter(|r| r.state.rank() < 3 && r.updated_at.is_before(&updated_before))
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.updated_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>, DomainError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut mine: Vec<PaymentRecord> = records
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Amount, ContentId};

    fn record(id: &str, user: &str, state: PaymentState, updated_at: Timestamp) -> PaymentRecord {
        let mut r = PaymentRecord::new(
            PaymentId::new(id).unwrap(),
            UserId::new(user).unwrap(),
            ContentId::new("c").unwrap(),
            Amount::parse("1").unwrap(),
            "m",
            updated_at,
        );
        r.state = state;
        r
    }

    async fn insert(store: &InMemoryPaymentStore, r: PaymentRecord) {
        assert!(store.compare_and_save(&r, None).await.unwrap());
    }

    #[tokio::test]
    async fn save_replaces_record_in_expected_state() {
        let store = InMemoryPaymentStore::new();
        let now = Timestamp::now();
        insert(&store, record("p1", "u", PaymentState::Created, now)).await;

        let saved = store
            .compare_and_save(
                &record("p1", "u", PaymentState::Approved, now),
                Some(PaymentState::Created),
            )
            .await
            .unwrap();

        assert!(saved);
        let found = store.get(&PaymentId::new("p1").unwrap()).await.unwrap().unwrap();
        assert_eq!(found.state, PaymentState::Approved);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_refuses_when_state_moved_on() {
        let store = InMemoryPaymentStore::new();
        let now = Timestamp::now();
        insert(&store, record("p1", "u", PaymentState::Completed, now)).await;

        let stale_write = store
            .compare_and_save(
                &record("p1", "u", PaymentState::Cancelled, now),
                Some(PaymentState::Approved),
            )
            .await
            .unwrap();
        let duplicate_insert = store
            .compare_and_save(&record("p1", "u", PaymentState::Created, now), None)
            .await
            .unwrap();

        assert!(!stale_write);
        assert!(!duplicate_insert);
        let found = store.get(&PaymentId::new("p1").unwrap()).await.unwrap().unwrap();
        assert_eq!(found.state, PaymentState::Completed);
    }

    #[tokio::test]
    async fn list_stale_returns_old_open_records_oldest_first() {
        let store = InMemoryPaymentStore::new();
        let now = Timestamp::now();
        insert(&store, record("old", "u", PaymentState::Approved, now.minus_secs(900))).await;
        insert(&store, record("older", "u", PaymentState::Created, now.minus_secs(1800))).await;
        insert(&store, record("fresh", "u", PaymentState::Approved, now)).await;
        insert(&store, record("done", "u", PaymentState::Completed, now.minus_secs(1800))).await;

        let stale = store.list_stale(now.minus_secs(60), 10).await.unwrap();

        let ids: Vec<&str> = stale.iter().map(|r| r.payment_id.as_str()).collect();
        assert_eq!(ids, vec!["older", "old"]);
    }

    #[tokio::test]
    async fn list_for_user_filters_by_owner() {
        let store = InMemoryPaymentStore::new();
        let now = Timestamp::now();
        insert(&store, record("a", "alice", PaymentState::Created, now)).await;
        insert(&store, record("b", "bob", PaymentState::Created, now)).await;

        let mine = store.list_for_user(&UserId::new("alice").unwrap()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].payment_id.as_str(), "a");
    }
}
