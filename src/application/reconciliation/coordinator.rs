//! ReconciliationCoordinator - the only mutation surface for payments.
//!
//! Every operation follows the same unit of work:
//!
//! 1. take the per-payment lock
//! 2. load the record, or seed one from the network's view
//! 3. decide with the pure state machine, asking the network when told to
//! 4. persist with a single conditional write
//! 5. grant the entitlement whenever the record is `Completed`
//!
//! Step 5 runs on every observation of a completed record, which repairs a
//! grant lost to a storage failure after the transition committed.
//!
//! The unit of work runs on its own task. Dropping the caller's future (a
//! disconnected HTTP client, an outer timeout) only stops the wait for the
//! outcome, never the work between steps 4 and 5.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn, Instrument};

use crate::domain::entitlement::{EntitlementGranted, EntitlementRecord};
use crate::domain::foundation::{
    Amount, ContentId, EventEnvelope, PaymentId, SerializableDomainEvent, Timestamp,
    TransactionId, UserId,
};
use crate::domain::payment::{
    decide, ApprovalVerdict, CancelSource, CompletionVerdict, Decision, NoOp, PaymentRecord,
    PaymentSignal, PaymentState, PaymentTransitioned, ReconciliationError, RecoveryPayload,
    Transition, VerificationRequest,
};
use crate::ports::{
    EntitlementStore, EventPublisher, PaymentRecordStore, VerificationContract, VerificationError,
};

use super::PaymentLockTable;

/// Command to request server-side approval of a payment.
///
/// `content_id` and `amount` are the client's claims. They must match the
/// network's record of the payment.
#[derive(Debug, Clone)]
pub struct RequestApprovalCommand {
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub content_id: ContentId,
    pub amount: Amount,
}

/// Command to complete a payment with a settlement transaction.
#[derive(Debug, Clone)]
pub struct RequestCompletionCommand {
    pub payment_id: PaymentId,
    pub transaction_id: TransactionId,
    /// Authenticated caller, checked against the payment owner. `None` for
    /// internal callers.
    pub requested_by: Option<UserId>,
}

/// Command to cancel a payment.
#[derive(Debug, Clone)]
pub struct CancelPaymentCommand {
    pub payment_id: PaymentId,
    pub reason: Option<String>,
    pub requested_by: Option<UserId>,
}

/// Command to re-enter a payment at the state the network reports.
///
/// `reported` and `payload` must come from the network itself, never from a
/// client. Clients go through [`ReconciliationCoordinator::recover_reported`].
#[derive(Debug, Clone)]
pub struct RecoverIncompleteCommand {
    pub payment_id: PaymentId,
    pub reported: PaymentState,
    pub payload: RecoveryPayload,
}

/// How a signal affected the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A new state was committed. `from` is `None` for a freshly seeded record.
    Transitioned {
        from: Option<PaymentState>,
        to: PaymentState,
    },
    Unchanged(NoOp),
}

/// Result of a coordinator operation.
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub record: PaymentRecord,
    pub disposition: Disposition,
    /// True only for the call that created the entitlement.
    pub entitlement_granted: bool,
}

impl ReconciliationOutcome {
    /// The record was already settled before this signal arrived.
    pub fn already_completed(&self) -> bool {
        matches!(self.disposition, Disposition::Unchanged(NoOp::AlreadyCompleted))
    }
}

/// A record loaded under the lock, remembering whether it exists in storage.
struct Loaded {
    record: PaymentRecord,
    stored: bool,
    first_state: Option<PaymentState>,
}

impl Loaded {
    fn stored(record: PaymentRecord) -> Self {
        let first_state = Some(record.state);
        Self {
            record,
            stored: true,
            first_state,
        }
    }

    fn seeded(record: PaymentRecord) -> Self {
        Self {
            record,
            stored: false,
            first_state: None,
        }
    }

    fn disposition(&self, fallback: NoOp) -> Disposition {
        match self.first_state {
            Some(from) if from == self.record.state && self.stored => {
                Disposition::Unchanged(fallback)
            }
            from => Disposition::Transitioned {
                from,
                to: self.record.state,
            },
        }
    }
}

/// Orchestrates payment signals under per-payment mutual exclusion.
///
/// Cheap to share behind an `Arc`. Each public operation runs to completion
/// on a spawned task even if the caller stops waiting.
pub struct ReconciliationCoordinator {
    inner: Arc<Reconciler>,
}

impl ReconciliationCoordinator {
    pub fn new(
        payments: Arc<dyn PaymentRecordStore>,
        entitlements: Arc<dyn EntitlementStore>,
        verifier: Arc<dyn VerificationContract>,
        event_publisher: Arc<dyn EventPublisher>,
        verification_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Reconciler {
                payments,
                entitlements,
                verifier,
                event_publisher,
                locks: PaymentLockTable::new(),
                verification_timeout,
            }),
        }
    }

    /// Number of payments currently being reconciled.
    pub fn payments_in_flight(&self) -> usize {
        self.inner.locks.len()
    }

    /// Ask the network to approve a payment the client just created.
    pub async fn request_approval(
        &self,
        cmd: RequestApprovalCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        self.run(move |r| async move { r.request_approval(cmd).await })
            .await
    }

    /// Complete a payment once the network confirms the transaction.
    pub async fn request_completion(
        &self,
        cmd: RequestCompletionCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        self.run(move |r| async move { r.request_completion(cmd).await })
            .await
    }

    /// Cancel a payment. A reason of `user_cancelled` marks it as user-initiated.
    pub async fn cancel(
        &self,
        cmd: CancelPaymentCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        self.run(move |r| async move { r.cancel(cmd).await }).await
    }

    /// Re-enter a payment at the state the network reports.
    ///
    /// The reported state is trusted without another verification call. An
    /// unseen payment is seeded directly in that state.
    pub async fn recover_incomplete(
        &self,
        cmd: RecoverIncompleteCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        self.run(move |r| async move { r.recover_incomplete(cmd).await })
            .await
    }

    /// Recovers a payment a client reported as incomplete.
    ///
    /// Only the payment id is taken from the client. State, owner, content,
    /// and transaction come from the network's own view, and the owner must
    /// be `requested_by`.
    pub async fn recover_reported(
        &self,
        payment_id: PaymentId,
        requested_by: UserId,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        self.run(move |r| async move {
            r.recover_from_network(&payment_id, Some(&requested_by))
                .await
        })
        .await
    }

    /// Pulls the network's current view of a payment and recovers from it.
    ///
    /// Used by the incomplete payment sweeper for records that stopped
    /// receiving client signals.
    pub async fn refresh_from_network(
        &self,
        payment_id: &PaymentId,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let payment_id = payment_id.clone();
        self.run(move |r| async move { r.recover_from_network(&payment_id, None).await })
            .await
    }

    /// Grant the creator of a content item access to it.
    ///
    /// Returns `true` if the entitlement was created by this call.
    pub async fn grant_creator_access(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<bool, ReconciliationError> {
        let record =
            EntitlementRecord::for_creator(user_id.clone(), content_id.clone(), Timestamp::now());
        self.run(move |r| async move { r.grant(record).await }).await
    }

    async fn run<F, Fut, T>(&self, work: F) -> Result<T, ReconciliationError>
    where
        F: FnOnce(Arc<Reconciler>) -> Fut,
        Fut: Future<Output = Result<T, ReconciliationError>> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::spawn(work(self.inner.clone()).in_current_span());
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!(error = %err, "Reconciliation task cancelled by the runtime");
                Err(ReconciliationError::Interrupted(err.to_string()))
            }
        }
    }
}

/// The unit of work behind [`ReconciliationCoordinator`].
struct Reconciler {
    payments: Arc<dyn PaymentRecordStore>,
    entitlements: Arc<dyn EntitlementStore>,
    verifier: Arc<dyn VerificationContract>,
    event_publisher: Arc<dyn EventPublisher>,
    locks: PaymentLockTable,
    verification_timeout: Duration,
}

impl Reconciler {
    #[instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, user_id = %cmd.user_id))]
    async fn request_approval(
        &self,
        cmd: RequestApprovalCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let _guard = self.locks.acquire(&cmd.payment_id).await;

        let loaded = match self.payments.get(&cmd.payment_id).await? {
            Some(record) => {
                ensure_owner(&record, Some(&cmd.user_id))?;
                Loaded::stored(record)
            }
            None => {
                // Seed from the network's record, never from the client's claims.
                let network = self
                    .verify(&cmd.payment_id, self.verifier.fetch_payment(&cmd.payment_id))
                    .await?;
                let (_, payload) = network.to_recovery()?;
                ensure_claims_match(&cmd, &payload)?;
                Loaded::seeded(PaymentRecord::new(
                    cmd.payment_id.clone(),
                    payload.user_id,
                    payload.content_id,
                    payload.amount,
                    payload.memo,
                    Timestamp::now(),
                ))
            }
        };

        self.process(loaded, PaymentSignal::RequestApproval).await
    }

    #[instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, txid = %cmd.transaction_id))]
    async fn request_completion(
        &self,
        cmd: RequestCompletionCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let _guard = self.locks.acquire(&cmd.payment_id).await;

        let loaded = self.load_or_fetch(&cmd.payment_id).await?;
        ensure_owner(&loaded.record, cmd.requested_by.as_ref())?;

        self.process(
            loaded,
            PaymentSignal::RequestCompletion {
                transaction_id: cmd.transaction_id,
            },
        )
        .await
    }

    #[instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id))]
    async fn cancel(
        &self,
        cmd: CancelPaymentCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let _guard = self.locks.acquire(&cmd.payment_id).await;

        let loaded = self.load_or_fetch(&cmd.payment_id).await?;
        ensure_owner(&loaded.record, cmd.requested_by.as_ref())?;

        let source = CancelSource::from_reason(cmd.reason.as_deref());
        self.process(loaded, PaymentSignal::Cancel { source }).await
    }

    #[instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, reported = %cmd.reported))]
    async fn recover_incomplete(
        &self,
        cmd: RecoverIncompleteCommand,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let _guard = self.locks.acquire(&cmd.payment_id).await;
        let payload = &cmd.payload;

        let outcome = match self.payments.get(&cmd.payment_id).await? {
            Some(record) => {
                ensure_owner(&record, Some(&payload.user_id))?;
                self.process(
                    Loaded::stored(record),
                    PaymentSignal::Recover {
                        reported: cmd.reported,
                        transaction_id: payload.transaction_id.clone(),
                    },
                )
                .await?
            }
            None => {
                let now = Timestamp::now();
                let created = PaymentRecord::new(
                    cmd.payment_id.clone(),
                    payload.user_id.clone(),
                    payload.content_id.clone(),
                    payload.amount,
                    payload.memo.clone(),
                    now,
                );
                let mut transition = Transition::to(cmd.reported);
                if cmd.reported.is_settled() {
                    if let Some(tx) = &payload.transaction_id {
                        transition = transition.with_transaction(tx.clone());
                    }
                }
                let mut loaded = Loaded::seeded(created);
                if cmd.reported != PaymentState::Created {
                    loaded.record = loaded.record.with_transition(&transition, now);
                }
                self.persist(&mut loaded, None).await?;
                info!(payment_id = %cmd.payment_id, state = %loaded.record.state, "Payment seeded from recovery");
                self.finish(loaded, NoOp::NotNewer).await?
            }
        };

        if outcome.record.state.is_settled() && !payload.network_acknowledged {
            if let Some(tx) = outcome.record.transaction_id.clone() {
                self.acknowledge_completion(&cmd.payment_id, &tx).await;
            }
        }

        Ok(outcome)
    }

    #[instrument(skip(self, requested_by), fields(payment_id = %payment_id))]
    async fn recover_from_network(
        &self,
        payment_id: &PaymentId,
        requested_by: Option<&UserId>,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let network = self
            .verify(payment_id, self.verifier.fetch_payment(payment_id))
            .await?;
        let (reported, payload) = network.to_recovery()?;

        if let Some(user) = requested_by {
            if *user != payload.user_id {
                warn!(payment_id = %payment_id, requested_by = %user, "Recovery requested by non-owner");
                return Err(ReconciliationError::NotPaymentOwner {
                    payment_id: payment_id.clone(),
                });
            }
        }

        self.recover_incomplete(RecoverIncompleteCommand {
            payment_id: payment_id.clone(),
            reported,
            payload,
        })
        .await
    }

    // ------------------------------------------------------------------

    async fn load_or_fetch(&self, payment_id: &PaymentId) -> Result<Loaded, ReconciliationError> {
        if let Some(record) = self.payments.get(payment_id).await? {
            return Ok(Loaded::stored(record));
        }

        debug!(payment_id = %payment_id, "Unseen payment, fetching network view");
        let network = self
            .verify(payment_id, self.verifier.fetch_payment(payment_id))
            .await?;
        let (_, payload) = network.to_recovery()?;

        Ok(Loaded::seeded(PaymentRecord::new(
            payment_id.clone(),
            payload.user_id,
            payload.content_id,
            payload.amount,
            payload.memo,
            Timestamp::now(),
        )))
    }

    /// Runs a signal through the state machine, following at most one
    /// verification round trip.
    async fn process(
        &self,
        mut loaded: Loaded,
        signal: PaymentSignal,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let payment_id = loaded.record.payment_id.clone();

        let decision = match decide(&loaded.record, &signal) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(payment_id = %payment_id, state = %loaded.record.state, signal = signal.name(), error = %err, "Signal rejected");
                return Err(err);
            }
        };

        let verdict_signal = match decision {
            Decision::Unchanged(noop) => {
                debug!(payment_id = %payment_id, state = %loaded.record.state, ?noop, "Signal is a no-op");
                if !loaded.stored {
                    self.persist(&mut loaded, None).await?;
                }
                return self.finish(loaded, noop).await;
            }
            Decision::Apply(transition) => {
                // A recovery only records what the network already decided.
                let rejection = !matches!(signal, PaymentSignal::Recover { .. });
                return self.commit(loaded, &transition, rejection).await;
            }
            Decision::Verify { advance, request } => {
                if let Some(transition) = advance {
                    self.apply(&mut loaded, &transition).await?;
                }
                match request {
                    // A payment the network no longer knows is a rejection.
                    VerificationRequest::Approval => {
                        let verdict = match self
                            .verify(&payment_id, self.verifier.confirm_approval(&payment_id))
                            .await
                        {
                            Err(ReconciliationError::ExternalVerificationFailed {
                                reason, ..
                            }) => ApprovalVerdict::Rejected { reason },
                            other => other?,
                        };
                        PaymentSignal::ApprovalVerified(verdict)
                    }
                    VerificationRequest::Completion(transaction_id) => {
                        let verdict = match self
                            .verify(
                                &payment_id,
                                self.verifier.confirm_completion(&payment_id, &transaction_id),
                            )
                            .await
                        {
                            Err(ReconciliationError::ExternalVerificationFailed {
                                reason, ..
                            }) => CompletionVerdict::Rejected { reason },
                            other => other?,
                        };
                        PaymentSignal::CompletionVerified {
                            transaction_id,
                            verdict,
                        }
                    }
                }
            }
        };

        match decide(&loaded.record, &verdict_signal) {
            Ok(Decision::Apply(transition)) => self.commit(loaded, &transition, true).await,
            Ok(Decision::Unchanged(noop)) => {
                if !loaded.stored {
                    self.persist(&mut loaded, None).await?;
                }
                self.finish(loaded, noop).await
            }
            Ok(Decision::Verify { .. }) => self.finish(loaded, NoOp::StaleVerdict).await,
            Err(err) => {
                warn!(payment_id = %payment_id, state = %loaded.record.state, error = %err, "Verification did not settle payment");
                Err(err)
            }
        }
    }

    /// Applies, persists, and finishes. With `rejection` set, a transition
    /// into `Failed` is reported as `ExternalVerificationFailed` after it is
    /// committed.
    async fn commit(
        &self,
        mut loaded: Loaded,
        transition: &Transition,
        rejection: bool,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        self.apply(&mut loaded, transition).await?;

        if rejection && transition.to == PaymentState::Failed {
            return Err(ReconciliationError::ExternalVerificationFailed {
                payment_id: loaded.record.payment_id.clone(),
                reason: transition
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "rejected".to_string()),
            });
        }

        self.finish(loaded, NoOp::NotNewer).await
    }

    async fn apply(
        &self,
        loaded: &mut Loaded,
        transition: &Transition,
    ) -> Result<(), ReconciliationError> {
        let previous = loaded.record.state;
        let from = loaded.stored.then_some(previous);
        let next = loaded.record.with_transition(transition, Timestamp::now());
        let before = std::mem::replace(&mut loaded.record, next);
        if let Err(err) = self.persist(loaded, from).await {
            loaded.record = before;
            return Err(err);
        }

        info!(
            payment_id = %loaded.record.payment_id,
            from = %previous,
            to = %loaded.record.state,
            "Payment transitioned"
        );
        Ok(())
    }

    /// The single commit point: writes only if storage still holds `from`.
    /// Publishes a transition event on success.
    async fn persist(
        &self,
        loaded: &mut Loaded,
        from: Option<PaymentState>,
    ) -> Result<(), ReconciliationError> {
        let saved = match self.payments.compare_and_save(&loaded.record, from).await {
            Ok(saved) => saved,
            Err(err) => {
                warn!(payment_id = %loaded.record.payment_id, error = %err, "Failed to persist payment record");
                return Err(err.into());
            }
        };
        if !saved {
            warn!(
                payment_id = %loaded.record.payment_id,
                expected = ?from,
                "Payment record changed underneath us, not overwriting"
            );
            return Err(ReconciliationError::ConcurrentUpdate {
                payment_id: loaded.record.payment_id.clone(),
            });
        }
        loaded.stored = true;

        let event = PaymentTransitioned::new(from, &loaded.record);
        self.publish(event.to_envelope()).await;
        Ok(())
    }

    /// Grants the entitlement for a completed record and builds the outcome.
    async fn finish(
        &self,
        loaded: Loaded,
        noop: NoOp,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let entitlement_granted = if loaded.record.grants_entitlement() {
            let record = &loaded.record;
            self.grant(EntitlementRecord::from_payment(
                record.user_id.clone(),
                record.content_id.clone(),
                record.payment_id.clone(),
                Timestamp::now(),
            ))
            .await?
        } else {
            false
        };

        Ok(ReconciliationOutcome {
            disposition: loaded.disposition(noop),
            record: loaded.record,
            entitlement_granted,
        })
    }

    async fn grant(&self, record: EntitlementRecord) -> Result<bool, ReconciliationError> {
        let created = match self.entitlements.create_if_absent(record.clone()).await {
            Ok(created) => created,
            Err(err) => {
                warn!(
                    user_id = %record.user_id,
                    content_id = %record.content_id,
                    error = %err,
                    "Entitlement grant failed, will retry on next observation"
                );
                return Err(ReconciliationError::StorageUnavailable(err.message));
            }
        };

        if created {
            info!(
                user_id = %record.user_id,
                content_id = %record.content_id,
                source_payment_id = ?record.source_payment_id,
                "Entitlement granted"
            );
            self.publish(EntitlementGranted::new(&record).to_envelope())
                .await;
        }
        Ok(created)
    }

    /// Bounds a network call by the verification timeout.
    async fn verify<T>(
        &self,
        payment_id: &PaymentId,
        call: impl Future<Output = Result<T, VerificationError>>,
    ) -> Result<T, ReconciliationError> {
        match tokio::time::timeout(self.verification_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(VerificationError::UnknownPayment(id))) => {
                warn!(payment_id = %id, "Payment unknown to the payment network");
                Err(ReconciliationError::ExternalVerificationFailed {
                    payment_id: id,
                    reason: "unknown to the payment network".to_string(),
                })
            }
            Ok(Err(err)) => {
                warn!(payment_id = %payment_id, error = %err, "Payment network call failed");
                Err(ReconciliationError::ExternalVerificationUnavailable(
                    err.to_string(),
                ))
            }
            Err(_) => {
                warn!(
                    payment_id = %payment_id,
                    timeout_ms = self.verification_timeout.as_millis() as u64,
                    "Payment network call timed out"
                );
                Err(ReconciliationError::ExternalVerificationUnavailable(
                    format!(
                        "no response within {}ms",
                        self.verification_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    /// Tells the network we saw the settlement. Best effort.
    async fn acknowledge_completion(&self, payment_id: &PaymentId, transaction_id: &TransactionId) {
        let call = self.verifier.confirm_completion(payment_id, transaction_id);
        if let Err(err) = self.verify(payment_id, call).await {
            warn!(payment_id = %payment_id, error = %err, "Could not acknowledge completion to the payment network");
        }
    }

    async fn publish(&self, envelope: Result<EventEnvelope, serde_json::Error>) {
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "Failed to serialize domain event");
                return;
            }
        };
        let event_type = envelope.event_type.clone();
        if let Err(err) = self.event_publisher.publish(envelope).await {
            warn!(event_type = %event_type, error = %err, "Failed to publish domain event");
        }
    }
}

/// Checks the client's approval claims against the network's record.
fn ensure_claims_match(
    cmd: &RequestApprovalCommand,
    network: &RecoveryPayload,
) -> Result<(), ReconciliationError> {
    if network.user_id != cmd.user_id {
        warn!(payment_id = %cmd.payment_id, requested_by = %cmd.user_id, "Approval requested by non-owner");
        return Err(ReconciliationError::NotPaymentOwner {
            payment_id: cmd.payment_id.clone(),
        });
    }
    let field = if network.content_id != cmd.content_id {
        "content"
    } else if network.amount != cmd.amount {
        "amount"
    } else {
        return Ok(());
    };
    warn!(payment_id = %cmd.payment_id, field, "Approval claims disagree with the payment network");
    Err(ReconciliationError::PaymentMismatch {
        payment_id: cmd.payment_id.clone(),
        field,
    })
}

fn ensure_owner(
    record: &PaymentRecord,
    requested_by: Option<&UserId>,
) -> Result<(), ReconciliationError> {
    match requested_by {
        Some(user) if *user != record.user_id => {
            warn!(payment_id = %record.payment_id, requested_by = %user, "Signal from non-owner rejected");
            Err(ReconciliationError::NotPaymentOwner {
                payment_id: record.payment_id.clone(),
            })
        }
        _ => Ok(()),
    }
}
