//! Per-payment mutual exclusion.
//!
//! Signals for the same payment are serialized; signals for different
//! payments never wait on each other. Entries are created on demand and
//! removed when the last holder or waiter lets go, so the table only ever
//! holds keys that are in use.
//!
//! The table is per process. Across instances sharing one database, the
//! store's conditional write (`compare_and_save`) is what keeps a payment
//! from committing the same transition twice; the loser sees
//! `ConcurrentUpdate` and can retry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::PaymentId;

/// Arena of async locks keyed by payment id.
#[derive(Debug, Default)]
pub struct PaymentLockTable {
    locks: DashMap<PaymentId, Arc<Mutex<()>>>,
}

impl PaymentLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `payment_id`.
    ///
    /// The returned guard releases the lock on drop, including when the
    /// awaiting future is cancelled.
    pub async fn acquire(&self, payment_id: &PaymentId) -> PaymentLockGuard<'_> {
        // Clone the handle while holding the shard lock so a concurrent
        // release cannot evict it before we wait on it.
        let mutex = self
            .locks
            .entry(payment_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let mut pending = PaymentLockGuard {
            table: self,
            payment_id: payment_id.clone(),
            guard: None,
            handle: Some(mutex.clone()),
        };
        pending.guard = Some(mutex.lock_owned().await);
        pending
    }

    /// Number of payments currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn release(&self, payment_id: &PaymentId) {
        self.locks
            .remove_if(payment_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Scoped exclusive access to one payment.
#[derive(Debug)]
pub struct PaymentLockGuard<'a> {
    table: &'a PaymentLockTable,
    payment_id: PaymentId,
    guard: Option<OwnedMutexGuard<()>>,
    handle: Option<Arc<Mutex<()>>>,
}

impl PaymentLockGuard<'_> {
    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }
}

impl Drop for PaymentLockGuard<'_> {
    fn drop(&mut self) {
        // Both references must be gone before the table can see a count of 1.
        self.guard.take();
        self.handle.take();
        self.table.release(&self.payment_id);
    }
}
