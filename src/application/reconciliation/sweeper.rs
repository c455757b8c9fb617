//! IncompletePaymentSweeper - Background recovery for stalled payments.
//!
//! Clients disappear mid-payment: the tab closes after the user signed, the
//! completion callback never arrives. The sweeper periodically picks up
//! non-terminal payments that have not moved for a while and asks the
//! payment network where they stand.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | Time between sweeps |
//! | `stale_after` | 300s | Minimum age of a record before it is swept |
//! | `batch_size` | 50 | Max records per sweep |
//! | `concurrency` | 4 | Max network lookups in flight |
//!
//! ## Graceful Shutdown
//!
//! The sweeper listens on a watch channel and stops after the current sweep.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::payment::PaymentRecord;
use crate::ports::PaymentRecordStore;

use super::{Disposition, ReconciliationCoordinator};

/// Configuration for the sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub stale_after: Duration,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            batch_size: 50,
            concurrency: 4,
        }
    }
}

/// What a single sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub advanced: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct IncompletePaymentSweeper {
    payments: Arc<dyn PaymentRecordStore>,
    coordinator: Arc<ReconciliationCoordinator>,
    config: SweeperConfig,
}

impl IncompletePaymentSweeper {
    pub fn new(
        payments: Arc<dyn PaymentRecordStore>,
        coordinator: Arc<ReconciliationCoordinator>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            payments,
            coordinator,
            config,
        }
    }

    /// Run sweeps until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Incomplete payment sweeper stopping");
                        return;
                    }
                }
                _ = interval.tick() => {
                    if let Err(err) = self.sweep_once().await {
                        warn!(error = %err, "Incomplete payment sweep failed");
                    }
                }
            }
        }
    }

    /// Sweep one batch of stale records.
    pub async fn sweep_once(&self) -> Result<SweepReport, DomainError> {
        let cutoff = Timestamp::now().minus_secs(self.config.stale_after.as_secs());
        let stale = self
            .payments
            .list_stale(cutoff, self.config.batch_size)
            .await?;

        if stale.is_empty() {
            debug!("No stale payments to sweep");
            return Ok(SweepReport::default());
        }

        let results: Vec<SweepResult> = stream::iter(stale)
            .map(|record| self.sweep_record(record))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = SweepReport {
            examined: results.len(),
            ..SweepReport::default()
        };
        for result in results {
            match result {
                SweepResult::Advanced => report.advanced += 1,
                SweepResult::Unchanged => report.unchanged += 1,
                SweepResult::Failed => report.failed += 1,
            }
        }

        info!(
            examined = report.examined,
            advanced = report.advanced,
            failed = report.failed,
            "Incomplete payment sweep finished"
        );
        Ok(report)
    }

    async fn sweep_record(&self, record: PaymentRecord) -> SweepResult {
        match self.coordinator.refresh_from_network(&record.payment_id).await {
            Ok(outcome) => match outcome.disposition {
                Disposition::Transitioned { .. } => SweepResult::Advanced,
                Disposition::Unchanged(_) => SweepResult::Unchanged,
            },
            Err(err) => {
                warn!(
                    payment_id = %record.payment_id,
                    state = %record.state,
                    retryable = err.is_retryable(),
                    error = %err,
                    "Could not refresh stale payment"
                );
                SweepResult::Failed
            }
        }
    }
}

enum SweepResult {
    Advanced,
    Unchanged,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{InMemoryEntitlementStore, InMemoryPaymentStore};
    use crate::adapters::network::MockVerifier;
    use crate::domain::foundation::{Amount, ContentId, PaymentId, TransactionId, UserId};
    use crate::domain::payment::PaymentState;
    use crate::ports::EntitlementStore;

    fn record(id: &str, state: PaymentState, age_secs: u64) -> PaymentRecord {
        let then = Timestamp::now().minus_secs(age_secs);
        let mut record = PaymentRecord::new(
            PaymentId::new(id).unwrap(),
            UserId::new("bob").unwrap(),
            ContentId::new("post-3").unwrap(),
            Amount::parse("1").unwrap(),
            "Unlock: post-3",
            then,
        );
        record.state = state;
        record
    }

    struct Fixture {
        payments: Arc<InMemoryPaymentStore>,
        entitlements: Arc<InMemoryEntitlementStore>,
        verifier: Arc<MockVerifier>,
        sweeper: IncompletePaymentSweeper,
    }

    fn fixture() -> Fixture {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let entitlements = Arc::new(InMemoryEntitlementStore::new());
        let verifier = Arc::new(MockVerifier::new());
        let coordinator = Arc::new(ReconciliationCoordinator::new(
            payments.clone(),
            entitlements.clone(),
            verifier.clone(),
            Arc::new(InMemoryEventBus::new()),
            Duration::from_millis(200),
        ));
        let sweeper = IncompletePaymentSweeper::new(
            payments.clone(),
            coordinator,
            SweeperConfig {
                stale_after: Duration::from_secs(60),
                ..SweeperConfig::default()
            },
        );
        Fixture {
            payments,
            entitlements,
            verifier,
            sweeper,
        }
    }

    #[tokio::test]
    async fn settles_stale_payment_the_network_completed() {
        let f = fixture();
        let local = record("p1", PaymentState::Approved, 600);
        f.payments.compare_and_save(&local, None).await.unwrap();

        let mut remote = local.clone();
        remote.state = PaymentState::Completed;
        remote.transaction_id = Some(TransactionId::new("tx1").unwrap());
        f.verifier.register_payment(remote);

        let report = f.sweeper.sweep_once().await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.advanced, 1);
        let stored = f.payments.get(&local.payment_id).await.unwrap().unwrap();
        assert_eq!(stored.state, PaymentState::Completed);
        assert!(f
            .entitlements
            .get(&local.user_id, &local.content_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn skips_fresh_and_terminal_payments() {
        let f = fixture();
        f.payments
            .compare_and_save(&record("fresh", PaymentState::Approved, 5), None)
            .await
            .unwrap();
        f.payments
            .compare_and_save(&record("done", PaymentState::Cancelled, 600), None)
            .await
            .unwrap();

        let report = f.sweeper.sweep_once().await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert_eq!(f.verifier.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn network_outage_is_counted_not_fatal() {
        let f = fixture();
        let local = record("p2", PaymentState::ApprovalRequested, 600);
        f.payments.compare_and_save(&local, None).await.unwrap();
        f.verifier.register_payment(local.clone());
        f.verifier.fail_next_calls(1);

        let report = f.sweeper.sweep_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(
            f.payments.get(&local.payment_id).await.unwrap().unwrap().state,
            PaymentState::ApprovalRequested
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let f = fixture();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { f.sweeper.run(rx).await });
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
