//! HTTP handlers for payment endpoints.
//!
//! Each handler validates the body into a coordinator command, tags it with
//! the authenticated caller, and maps the outcome to a response DTO.

use axum::extract::{Json, State};
use axum::response::IntoResponse;

use crate::application::handlers::ListPurchasesQuery;
use crate::application::reconciliation::{
    CancelPaymentCommand, RequestApprovalCommand, RequestCompletionCommand,
};
use crate::domain::foundation::{Amount, ContentId, PaymentId, TransactionId};

use super::super::{ApiError, AppState, AuthenticatedUser};
use super::dto::{
    ApprovePaymentRequest, CancelledPaymentRequest, CompletePaymentRequest,
    IncompletePaymentRequest, PaymentListResponse, PaymentSignalResponse, PaymentView,
    PurchaseView, PurchasesResponse,
};

/// POST /api/payments/approve
pub async fn approve_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ApprovePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = RequestApprovalCommand {
        payment_id: PaymentId::new(request.payment_id)?,
        user_id: user.user_id,
        content_id: ContentId::new(request.content_id)?,
        amount: Amount::from_f64(request.amount)?,
    };

    let outcome = state.coordinator.request_approval(cmd).await?;
    Ok(Json(PaymentSignalResponse::from(outcome)))
}

/// POST /api/payments/complete
pub async fn complete_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CompletePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = RequestCompletionCommand {
        payment_id: PaymentId::new(request.payment_id)?,
        transaction_id: TransactionId::new(request.txid)?,
        requested_by: Some(user.user_id),
    };

    let outcome = state.coordinator.request_completion(cmd).await?;
    Ok(Json(PaymentSignalResponse::from(outcome)))
}

/// POST /api/payments/cancelled_payment
pub async fn cancelled_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CancelledPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = CancelPaymentCommand {
        payment_id: PaymentId::new(request.payment_id)?,
        reason: request.reason,
        requested_by: Some(user.user_id),
    };

    let outcome = state.coordinator.cancel(cmd).await?;
    Ok(Json(PaymentSignalResponse::from(outcome)))
}

/// POST /api/payments/incomplete
///
/// Recovers the reported payment from the network's own record of it. The
/// network must list the caller as the payer.
pub async fn incomplete_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<IncompletePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id = PaymentId::new(request.payment.identifier)?;

    let outcome = state
        .coordinator
        .recover_reported(payment_id, user.user_id)
        .await?;
    Ok(Json(PaymentSignalResponse::from(outcome)))
}

/// GET /api/payments
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.payments.list_for_user(&user.user_id).await?;
    Ok(Json(PaymentListResponse {
        payments: records.iter().map(PaymentView::from).collect(),
    }))
}

/// GET /api/payments/purchases
pub async fn list_purchases(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .list_purchases_handler()
        .handle(ListPurchasesQuery {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(PurchasesResponse {
        purchases: result.entitlements.iter().map(PurchaseView::from).collect(),
    }))
}
