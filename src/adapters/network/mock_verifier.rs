//! Scriptable verification contract for tests.
//!
//! Approves and verifies everything by default. Tests script verdicts,
//! transient failures, and latency, then inspect call counts.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{PaymentId, TransactionId};
use crate::domain::payment::{ApprovalVerdict, CompletionVerdict, PaymentRecord};
use crate::ports::{NetworkPayment, VerificationContract, VerificationError};

#[derive(Debug)]
struct State {
    approval: ApprovalVerdict,
    completion: CompletionVerdict,
    failures_remaining: u32,
    approval_failures_remaining: u32,
    delay: Option<Duration>,
    payments: HashMap<PaymentId, NetworkPayment>,
    approval_calls: u32,
    completion_calls: u32,
    fetch_calls: u32,
}

#[derive(Debug)]
pub struct MockVerifier {
    state: Mutex<State>,
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVerifier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                approval: ApprovalVerdict::Approved,
                completion: CompletionVerdict::Verified {
                    settlement_ref: Some("ledger-ref".to_string()),
                },
                failures_remaining: 0,
                approval_failures_remaining: 0,
                delay: None,
                payments: HashMap::new(),
                approval_calls: 0,
                completion_calls: 0,
                fetch_calls: 0,
            }),
        }
    }

    pub fn set_approval_verdict(&self, verdict: ApprovalVerdict) {
        self.lock().approval = verdict;
    }

    pub fn set_completion_verdict(&self, verdict: CompletionVerdict) {
        self.lock().completion = verdict;
    }

    /// The next `n` calls of any kind fail with `Unavailable`.
    pub fn fail_next_calls(&self, n: u32) {
        self.lock().failures_remaining = n;
    }

    /// The next `n` approval calls fail with `Unavailable`. Fetches still answer.
    pub fn fail_next_approvals(&self, n: u32) {
        self.lock().approval_failures_remaining = n;
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Makes `fetch_payment` describe `record` as the network would.
    pub fn register_payment(&self, record: PaymentRecord) {
        let payment = NetworkPayment::from_record(&record);
        self.lock().payments.insert(record.payment_id, payment);
    }

    /// Makes `fetch_payment` return `payment` verbatim.
    pub fn register_network_payment(&self, payment_id: PaymentId, payment: NetworkPayment) {
        self.lock().payments.insert(payment_id, payment);
    }

    pub fn approval_calls(&self) -> u32 {
        self.lock().approval_calls
    }

    pub fn completion_calls(&self) -> u32 {
        self.lock().completion_calls
    }

    pub fn fetch_calls(&self) -> u32 {
        self.lock().fetch_calls
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies the scripted delay and failure budget shared by every call.
    async fn before_call(&self) -> Result<(), VerificationError> {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(VerificationError::Unavailable(
                "scripted network failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VerificationContract for MockVerifier {
    async fn confirm_approval(
        &self,
        _payment_id: &PaymentId,
    ) -> Result<ApprovalVerdict, VerificationError> {
        self.lock().approval_calls += 1;
        self.before_call().await?;
        let mut state = self.lock();
        if state.approval_failures_remaining > 0 {
            state.approval_failures_remaining -= 1;
            return Err(VerificationError::Unavailable(
                "scripted approval failure".to_string(),
            ));
        }
        Ok(state.approval.clone())
    }

    async fn confirm_completion(
        &self,
        _payment_id: &PaymentId,
        _transaction_id: &TransactionId,
    ) -> Result<CompletionVerdict, VerificationError> {
        self.lock().completion_calls += 1;
        self.before_call().await?;
        Ok(self.lock().completion.clone())
    }

    async fn fetch_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<NetworkPayment, VerificationError> {
        self.lock().fetch_calls += 1;
        self.before_call().await?;
        self.lock()
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| VerificationError::UnknownPayment(payment_id.clone()))
    }
}
