//! Integration tests for payment reconciliation.
//!
//! Drives the coordinator end to end over the in-memory adapters:
//! 1. Purchase and cancellation flows, with access gating before and after
//! 2. Idempotence and no-regression out of terminal states
//! 3. Exactly-once entitlement under concurrent completions
//! 4. Recovery, verification timeouts, and entitlement repair
//! 5. Abandoned callers and competing service instances

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use creator_paywall::adapters::events::InMemoryEventBus;
use creator_paywall::adapters::memory::{
    InMemoryContentOwnership, InMemoryEntitlementStore, InMemoryPaymentStore,
};
use creator_paywall::adapters::network::MockVerifier;
use creator_paywall::application::handlers::{CheckContentAccessHandler, CheckContentAccessQuery};
use creator_paywall::application::reconciliation::{
    CancelPaymentCommand, Disposition, IncompletePaymentSweeper, ReconciliationCoordinator,
    ReconciliationOutcome, RecoverIncompleteCommand, RequestApprovalCommand,
    RequestCompletionCommand, SweeperConfig,
};
use creator_paywall::domain::entitlement::{AccessAuthorizer, EntitlementRecord};
use creator_paywall::domain::foundation::{
    Amount, ContentId, DomainError, PaymentId, Timestamp, TransactionId, UserId,
};
use creator_paywall::domain::payment::{
    PaymentRecord, PaymentState, ReconciliationError, RecoveryPayload,
};
use creator_paywall::ports::{EntitlementStore, PaymentRecordStore};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Entitlement store that fails its first `n` grants.
struct FlakyEntitlementStore {
    inner: InMemoryEntitlementStore,
    failures_remaining: AtomicU32,
}

impl FlakyEntitlementStore {
    fn failing(n: u32) -> Self {
        Self {
            inner: InMemoryEntitlementStore::new(),
            failures_remaining: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl EntitlementStore for FlakyEntitlementStore {
    async fn get(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        self.inner.get(user_id, content_id).await
    }

    async fn create_if_absent(&self, record: EntitlementRecord) -> Result<bool, DomainError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(DomainError::storage("entitlements table unavailable"));
        }
        self.inner.create_if_absent(record).await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<EntitlementRecord>, DomainError> {
        self.inner.list_for_user(user_id).await
    }
}

/// Entitlement store whose grants take `delay` to land.
struct SlowEntitlementStore {
    inner: InMemoryEntitlementStore,
    delay: Duration,
}

#[async_trait]
impl EntitlementStore for SlowEntitlementStore {
    async fn get(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        self.inner.get(user_id, content_id).await
    }

    async fn create_if_absent(&self, record: EntitlementRecord) -> Result<bool, DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_if_absent(record).await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<EntitlementRecord>, DomainError> {
        self.inner.list_for_user(user_id).await
    }
}

struct World {
    payments: Arc<InMemoryPaymentStore>,
    entitlements: Arc<dyn EntitlementStore>,
    ownership: Arc<InMemoryContentOwnership>,
    verifier: Arc<MockVerifier>,
    events: Arc<InMemoryEventBus>,
    coordinator: Arc<ReconciliationCoordinator>,
}

impl World {
    fn new() -> Self {
        Self::with_entitlements(Arc::new(InMemoryEntitlementStore::new()))
    }

    fn with_entitlements(entitlements: Arc<dyn EntitlementStore>) -> Self {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let verifier = Arc::new(MockVerifier::new());
        let events = Arc::new(InMemoryEventBus::new());
        let coordinator = Arc::new(ReconciliationCoordinator::new(
            payments.clone(),
            entitlements.clone(),
            verifier.clone(),
            events.clone(),
            Duration::from_millis(100),
        ));
        Self {
            payments,
            entitlements,
            ownership: Arc::new(InMemoryContentOwnership::new()),
            verifier,
            events,
            coordinator,
        }
    }

    async fn can_access(&self, user: &str, content: &str) -> bool {
        let handler = CheckContentAccessHandler::new(
            self.ownership.clone(),
            AccessAuthorizer::new(self.entitlements.clone()),
        );
        handler
            .handle(CheckContentAccessQuery {
                user_id: uid(user),
                content_id: cid(content),
            })
            .await
            .can_access_full()
    }

    /// Registers the payment on the network, then asks for its approval.
    async fn approve(
        &self,
        payment: &str,
        user: &str,
        content: &str,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        self.on_network(payment, user, content);
        self.coordinator
            .request_approval(approve(payment, user, content))
            .await
    }

    fn on_network(&self, payment: &str, user: &str, content: &str) {
        self.verifier.register_payment(PaymentRecord::new(
            pid(payment),
            uid(user),
            cid(content),
            Amount::parse("3.14").unwrap(),
            format!("Unlock: {}", content),
            Timestamp::now(),
        ));
    }

    /// A second service instance sharing this world's stores and network.
    fn second_instance(&self) -> Arc<ReconciliationCoordinator> {
        Arc::new(ReconciliationCoordinator::new(
            self.payments.clone(),
            self.entitlements.clone(),
            self.verifier.clone(),
            self.events.clone(),
            Duration::from_millis(100),
        ))
    }

    async fn stored_state(&self, payment: &str) -> Option<PaymentState> {
        self.payments
            .get(&pid(payment))
            .await
            .unwrap()
            .map(|r| r.state)
    }
}

fn pid(s: &str) -> PaymentId {
    PaymentId::new(s).unwrap()
}

fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn cid(s: &str) -> ContentId {
    ContentId::new(s).unwrap()
}

fn tx(s: &str) -> TransactionId {
    TransactionId::new(s).unwrap()
}

fn approve(payment: &str, user: &str, content: &str) -> RequestApprovalCommand {
    RequestApprovalCommand {
        payment_id: pid(payment),
        user_id: uid(user),
        content_id: cid(content),
        amount: Amount::parse("3.14").unwrap(),
    }
}

fn complete(payment: &str, user: &str, txid: &str) -> RequestCompletionCommand {
    RequestCompletionCommand {
        payment_id: pid(payment),
        transaction_id: tx(txid),
        requested_by: Some(uid(user)),
    }
}

fn recovery_payload(user: &str, content: &str, txid: Option<&str>) -> RecoveryPayload {
    RecoveryPayload {
        user_id: uid(user),
        content_id: cid(content),
        amount: Amount::parse("1").unwrap(),
        memo: format!("Unlock: {}", content),
        transaction_id: txid.map(tx),
        network_acknowledged: true,
    }
}

// =============================================================================
// Purchase flows
// =============================================================================

#[tokio::test]
async fn approve_then_complete_unlocks_content() {
    let world = World::new();
    assert!(!world.can_access("alice", "post-1").await);

    let approved = world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();
    assert_eq!(approved.record.state, PaymentState::Approved);
    assert!(!world.can_access("alice", "post-1").await);

    let completed = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await
        .unwrap();
    assert_eq!(completed.record.state, PaymentState::Completed);
    assert_eq!(completed.record.transaction_id, Some(tx("tx1")));
    assert!(completed.entitlement_granted);

    assert!(world.can_access("alice", "post-1").await);
    assert!(!world.can_access("bob", "post-1").await);
}

#[tokio::test]
async fn user_cancel_before_approval_keeps_content_locked() {
    let world = World::new();
    world.verifier.register_payment(PaymentRecord::new(
        pid("p2"),
        uid("alice"),
        cid("post-2"),
        Amount::parse("2").unwrap(),
        "Unlock: post-2",
        Timestamp::now(),
    ));

    let outcome = world
        .coordinator
        .cancel(CancelPaymentCommand {
            payment_id: pid("p2"),
            reason: Some("user_cancelled".to_string()),
            requested_by: Some(uid("alice")),
        })
        .await
        .unwrap();

    assert_eq!(outcome.record.state, PaymentState::UserCancelled);
    assert!(!world.can_access("alice", "post-2").await);
}

#[tokio::test]
async fn creator_reads_own_content_without_paying() {
    let world = World::new();
    world.ownership.publish(uid("carol"), cid("post-3"));

    assert!(world.can_access("carol", "post-3").await);
    assert!(!world.can_access("alice", "post-3").await);
}

// =============================================================================
// Idempotence and no-regression
// =============================================================================

#[tokio::test]
async fn repeated_completion_is_idempotent() {
    let world = World::new();
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();

    let first = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await
        .unwrap();
    for _ in 0..3 {
        let again = world
            .coordinator
            .request_completion(complete("p1", "alice", "tx1"))
            .await
            .unwrap();
        assert!(again.already_completed());
        assert!(!again.entitlement_granted);
        assert_eq!(again.record, first.record);
    }

    assert_eq!(world.events.events_of_type("entitlement.granted.v1").len(), 1);
    assert_eq!(world.verifier.completion_calls(), 1);
}

#[tokio::test]
async fn completion_with_a_different_transaction_is_rejected() {
    let world = World::new();
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();
    world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await
        .unwrap();

    let err = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx-other"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconciliationError::InvalidTransition { .. }));
    assert_eq!(world.stored_state("p1").await, Some(PaymentState::Completed));
}

#[tokio::test]
async fn cancelled_payment_never_completes() {
    let world = World::new();
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();
    world
        .coordinator
        .cancel(CancelPaymentCommand {
            payment_id: pid("p1"),
            reason: None,
            requested_by: Some(uid("alice")),
        })
        .await
        .unwrap();

    let completion = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await;
    let recovery = world
        .coordinator
        .recover_incomplete(RecoverIncompleteCommand {
            payment_id: pid("p1"),
            reported: PaymentState::Approved,
            payload: recovery_payload("alice", "post-1", None),
        })
        .await
        .unwrap();

    assert!(matches!(
        completion,
        Err(ReconciliationError::InvalidTransition { .. })
    ));
    assert_eq!(recovery.record.state, PaymentState::Cancelled);
    assert_eq!(world.stored_state("p1").await, Some(PaymentState::Cancelled));
    assert!(!world.can_access("alice", "post-1").await);
}

#[tokio::test]
async fn stale_recovery_report_does_not_regress_state() {
    let world = World::new();
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();

    let outcome = world
        .coordinator
        .recover_incomplete(RecoverIncompleteCommand {
            payment_id: pid("p1"),
            reported: PaymentState::Created,
            payload: recovery_payload("alice", "post-1", None),
        })
        .await
        .unwrap();

    assert!(matches!(outcome.disposition, Disposition::Unchanged(_)));
    assert_eq!(outcome.record.state, PaymentState::Approved);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_grant_exactly_once() {
    const N: usize = 16;
    let world = World::new();
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();

    let tasks: Vec<_> = (0..N)
        .map(|_| {
            let coordinator = world.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .request_completion(complete("p1", "alice", "tx1"))
                    .await
            })
        })
        .collect();

    let mut granted = 0;
    let mut already_completed = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.record.state, PaymentState::Completed);
        if outcome.entitlement_granted {
            granted += 1;
        }
        if outcome.already_completed() {
            already_completed += 1;
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(already_completed, N - 1);
    assert_eq!(world.entitlements.list_for_user(&uid("alice")).await.unwrap().len(), 1);
    assert_eq!(world.coordinator.payments_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_payments_do_not_block_each_other() {
    let world = World::new();
    for i in 0..8 {
        world.on_network(&format!("p{}", i), "alice", &format!("post-{}", i));
    }
    world.verifier.set_delay(Duration::from_millis(30));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let coordinator = world.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .request_approval(approve(&format!("p{}", i), "alice", &format!("post-{}", i)))
                    .await
            })
        })
        .collect();

    let started = std::time::Instant::now();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().record.state, PaymentState::Approved);
    }

    // Serialized, eight 30ms calls would take at least 240ms.
    assert!(started.elapsed() < Duration::from_millis(200));
}

// =============================================================================
// Recovery, timeouts, repair
// =============================================================================

#[tokio::test]
async fn recovery_of_completed_payment_grants_once() {
    let world = World::new();
    let cmd = RecoverIncompleteCommand {
        payment_id: pid("p7"),
        reported: PaymentState::Completed,
        payload: recovery_payload("alice", "post-7", Some("tx7")),
    };

    let first = world.coordinator.recover_incomplete(cmd.clone()).await.unwrap();
    let second = world.coordinator.recover_incomplete(cmd).await.unwrap();

    assert_eq!(first.record.state, PaymentState::Completed);
    assert!(first.entitlement_granted);
    assert!(!second.entitlement_granted);
    assert!(world.can_access("alice", "post-7").await);
    assert_eq!(world.verifier.completion_calls(), 0);
}

#[tokio::test]
async fn recovery_jumps_created_record_to_completed() {
    let world = World::new();
    world.verifier.fail_next_approvals(1);
    let _ = world.approve("p8", "alice", "post-8").await;
    assert_eq!(
        world.stored_state("p8").await,
        Some(PaymentState::ApprovalRequested)
    );

    let outcome = world
        .coordinator
        .recover_incomplete(RecoverIncompleteCommand {
            payment_id: pid("p8"),
            reported: PaymentState::Completed,
            payload: recovery_payload("alice", "post-8", Some("tx8")),
        })
        .await
        .unwrap();

    assert_eq!(outcome.record.state, PaymentState::Completed);
    assert!(outcome.entitlement_granted);
}

#[tokio::test]
async fn slow_network_times_out_without_state_change() {
    let world = World::new();
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();
    world.verifier.set_delay(Duration::from_millis(500));

    let err = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconciliationError::ExternalVerificationUnavailable(_)
    ));
    assert!(err.is_retryable());
    assert_eq!(world.stored_state("p1").await, Some(PaymentState::Approved));
    assert_eq!(world.coordinator.payments_in_flight(), 0);
}

#[tokio::test]
async fn lost_grant_is_repaired_on_next_completion() {
    let world = World::with_entitlements(Arc::new(FlakyEntitlementStore::failing(1)));
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();

    let err = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::StorageUnavailable(_)));
    assert_eq!(world.stored_state("p1").await, Some(PaymentState::Completed));
    assert!(!world.can_access("alice", "post-1").await);

    let retry = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await
        .unwrap();

    assert!(retry.already_completed());
    assert!(retry.entitlement_granted);
    assert!(world.can_access("alice", "post-1").await);
}

#[tokio::test]
async fn sweeper_completes_payment_abandoned_by_client() {
    let world = World::new();
    world
        .approve("p1", "alice", "post-1")
        .await
        .unwrap();

    // The client vanished after paying; the network saw the transaction.
    let mut settled = world.payments.get(&pid("p1")).await.unwrap().unwrap();
    settled.state = PaymentState::Completed;
    settled.transaction_id = Some(tx("tx1"));
    world.verifier.register_payment(settled);

    let sweeper = IncompletePaymentSweeper::new(
        world.payments.clone(),
        world.coordinator.clone(),
        SweeperConfig {
            stale_after: Duration::ZERO,
            ..SweeperConfig::default()
        },
    );
    tokio::time::sleep(Duration::from_millis(5)).await;
    let report = sweeper.sweep_once().await.unwrap();

    assert_eq!(report.advanced, 1);
    assert_eq!(world.stored_state("p1").await, Some(PaymentState::Completed));
    assert!(world.can_access("alice", "post-1").await);
}

#[tokio::test]
async fn client_report_the_network_does_not_back_grants_nothing() {
    let world = World::new();

    let err = world
        .coordinator
        .recover_reported(pid("forged"), uid("mallory"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconciliationError::ExternalVerificationFailed { .. }
    ));
    assert_eq!(world.stored_state("forged").await, None);
    assert!(world
        .entitlements
        .list_for_user(&uid("mallory"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(world.verifier.fetch_calls(), 1);
}

// =============================================================================
// Abandoned callers and competing instances
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_completion_still_grants() {
    let world = World::with_entitlements(Arc::new(SlowEntitlementStore {
        inner: InMemoryEntitlementStore::new(),
        delay: Duration::from_millis(300),
    }));
    world.approve("p1", "alice", "post-1").await.unwrap();

    // The caller gives up while the grant is still in flight.
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        world
            .coordinator
            .request_completion(complete("p1", "alice", "tx1")),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(world.stored_state("p1").await, Some(PaymentState::Completed));
    assert!(world.can_access("alice", "post-1").await);
    assert_eq!(world.events.events_of_type("entitlement.granted.v1").len(), 1);
    assert_eq!(world.coordinator.payments_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_instances_commit_completion_once() {
    let world = World::new();
    world.approve("p1", "alice", "post-1").await.unwrap();
    let transitions_before = world.events.events_of_type("payment.transitioned.v1").len();
    let other = world.second_instance();
    // Both instances read `Approved` before either verification returns.
    world.verifier.set_delay(Duration::from_millis(50));

    let here = {
        let coordinator = world.coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .request_completion(complete("p1", "alice", "tx1"))
                .await
        })
    };
    let there = tokio::spawn(async move {
        other
            .request_completion(complete("p1", "alice", "tx1"))
            .await
    });
    let results = [here.await.unwrap(), there.await.unwrap()];

    let committed = results
        .iter()
        .filter(|r| matches!(r, Ok(o) if matches!(o.disposition, Disposition::Transitioned { .. })))
        .count();
    assert_eq!(committed, 1);
    for result in &results {
        match result {
            Ok(outcome) => assert_eq!(outcome.record.state, PaymentState::Completed),
            Err(err) => assert!(matches!(err, ReconciliationError::ConcurrentUpdate { .. })),
        }
    }
    assert_eq!(
        world.events.events_of_type("payment.transitioned.v1").len(),
        transitions_before + 1
    );
    assert_eq!(world.events.events_of_type("entitlement.granted.v1").len(), 1);

    world.verifier.set_delay(Duration::ZERO);
    let retried = world
        .coordinator
        .request_completion(complete("p1", "alice", "tx1"))
        .await
        .unwrap();
    assert!(retried.already_completed());
    assert!(!retried.entitlement_granted);
}
