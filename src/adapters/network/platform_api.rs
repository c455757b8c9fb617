//! Payment network server API adapter.
//!
//! Implements `VerificationContract` over the network's REST API:
//!
//! - `POST {base}/v2/payments/{id}/approve`
//! - `POST {base}/v2/payments/{id}/complete` with body `{"txid": ...}`
//! - `GET  {base}/v2/payments/{id}`
//!
//! Every endpoint answers with the payment as the network now sees it, and
//! verdicts are read from that view. Requests authenticate with
//! `Authorization: Key <api key>`.
//!
//! # Configuration
//!
//! ```ignore
//! let config = PlatformApiConfig::new(api_key).with_base_url("https://api.minepi.com");
//! let verifier = PlatformApiVerifier::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::foundation::{PaymentId, TransactionId};
use crate::domain::payment::{ApprovalVerdict, CompletionVerdict};
use crate::ports::{NetworkPayment, VerificationContract, VerificationError};

/// Configuration for the platform API client.
#[derive(Debug, Clone)]
pub struct PlatformApiConfig {
    api_key: SecretString,
    pub base_url: String,
    /// Per-request HTTP timeout. The coordinator applies its own bound on top.
    pub request_timeout: Duration,
}

impl PlatformApiConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: "https://api.minepi.com".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    txid: &'a str,
}

pub struct PlatformApiVerifier {
    config: PlatformApiConfig,
    client: Client,
}

impl PlatformApiVerifier {
    pub fn new(config: PlatformApiConfig) -> Result<Self, VerificationError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| VerificationError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn payment_url(&self, payment_id: &PaymentId, action: Option<&str>) -> String {
        match action {
            Some(action) => format!(
                "{}/v2/payments/{}/{}",
                self.config.base_url, payment_id, action
            ),
            None => format!("{}/v2/payments/{}", self.config.base_url, payment_id),
        }
    }

    fn authorization(&self) -> String {
        format!("Key {}", self.config.api_key.expose_secret())
    }

    /// Reads a payment body, mapping transport and status failures.
    ///
    /// `Ok(None)` means the network refused the action for a payment it does
    /// know; the caller falls back to the current view.
    async fn read_payment(
        &self,
        payment_id: &PaymentId,
        response: Result<Response, reqwest::Error>,
    ) -> Result<Option<NetworkPayment>, VerificationError> {
        let response = response.map_err(|e| {
            if e.is_timeout() {
                VerificationError::Unavailable("request timed out".to_string())
            } else if e.is_connect() {
                VerificationError::Unavailable(format!("Connection failed: {}", e))
            } else {
                VerificationError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let payment = response
                .json::<NetworkPayment>()
                .await
                .map_err(|e| VerificationError::Malformed(e.to_string()))?;
            return Ok(Some(payment));
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(VerificationError::UnknownPayment(payment_id.clone())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(status = %status, "Payment network rejected our credentials");
                Err(VerificationError::Unavailable(format!(
                    "authentication failed ({})",
                    status
                )))
            }
            s if s.is_client_error() => {
                debug!(payment_id = %payment_id, status = %s, body = %body, "Action refused, reading current view");
                Ok(None)
            }
            s => Err(VerificationError::Unavailable(format!(
                "Server error {}: {}",
                s, body
            ))),
        }
    }
}

#[async_trait]
impl VerificationContract for PlatformApiVerifier {
    async fn confirm_approval(
        &self,
        payment_id: &PaymentId,
    ) -> Result<ApprovalVerdict, VerificationError> {
        let response = self
            .client
            .post(self.payment_url(payment_id, Some("approve")))
            .header("Authorization", self.authorization())
            .send()
            .await;

        let payment = match self.read_payment(payment_id, response).await? {
            Some(payment) => payment,
            None => self.fetch_payment(payment_id).await?,
        };
        approval_verdict(&payment)
    }

    async fn confirm_completion(
        &self,
        payment_id: &PaymentId,
        transaction_id: &TransactionId,
    ) -> Result<CompletionVerdict, VerificationError> {
        let response = self
            .client
            .post(self.payment_url(payment_id, Some("complete")))
            .header("Authorization", self.authorization())
            .json(&CompleteRequest {
                txid: transaction_id.as_str(),
            })
            .send()
            .await;

        let payment = match self.read_payment(payment_id, response).await? {
            Some(payment) => payment,
            None => self.fetch_payment(payment_id).await?,
        };
        Ok(completion_verdict(&payment, transaction_id))
    }

    async fn fetch_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<NetworkPayment, VerificationError> {
        let response = self
            .client
            .get(self.payment_url(payment_id, None))
            .header("Authorization", self.authorization())
            .send()
            .await;

        self.read_payment(payment_id, response).await?.ok_or_else(|| {
            VerificationError::Malformed(format!("payment {} could not be read", payment_id))
        })
    }
}

/// Approval verdict from the network view after an approve call.
///
/// A payment that is neither cancelled nor approved has not been processed
/// yet, which is transient.
fn approval_verdict(payment: &NetworkPayment) -> Result<ApprovalVerdict, VerificationError> {
    let status = &payment.status;
    if status.cancelled || status.user_cancelled {
        Ok(ApprovalVerdict::Rejected {
            reason: "cancelled on the payment network".to_string(),
        })
    } else if status.developer_approved {
        Ok(ApprovalVerdict::Approved)
    } else {
        Err(VerificationError::Unavailable(
            "approval not yet recorded by the payment network".to_string(),
        ))
    }
}

/// Completion verdict for `transaction_id` from the network view.
///
/// Only a cancelled payment is a rejection. A missing, unverified, or
/// different transaction is not yet verified.
fn completion_verdict(payment: &NetworkPayment, transaction_id: &TransactionId) -> CompletionVerdict {
    let status = &payment.status;
    if status.cancelled || status.user_cancelled {
        return CompletionVerdict::Rejected {
            reason: "cancelled on the payment network".to_string(),
        };
    }

    match &payment.transaction {
        Some(tx) if tx.txid == transaction_id.as_str() => {
            if status.developer_completed || status.transaction_verified || tx.verified {
                CompletionVerdict::Verified {
                    settlement_ref: tx.link.clone(),
                }
            } else {
                CompletionVerdict::Unverified
            }
        }
        Some(tx) => {
            warn!(
                payment_id = %payment.identifier,
                expected = %transaction_id,
                actual = %tx.txid,
                "Transaction does not match the one bound by the payment network"
            );
            CompletionVerdict::Unverified
        }
        None => CompletionVerdict::Unverified,
    }
}
