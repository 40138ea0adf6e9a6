// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::{Extension, State}, Json};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use appointment_cell::services::reservation::ReservationService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateOrderRequest, PaymentError, SettlementOutcome, VerifyPaymentRequest};
use crate::services::settlement::SettlementService;

fn map_error(e: PaymentError) -> AppError {
    match e {
        PaymentError::NotConfigured => {
            AppError::ExternalService("Payment gateway is not configured".to_string())
        }
        PaymentError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        PaymentError::AppointmentNotPayable { status } => AppError::Conflict(format!(
            "Appointment is not payable in status {}",
            status
        )),
        PaymentError::OrderNotFound => AppError::NotFound("Payment order not found".to_string()),
        PaymentError::OrderAlreadySettled => {
            AppError::Conflict("Payment order already settled".to_string())
        }
        PaymentError::SignatureMismatch => {
            AppError::BadRequest("Payment could not be confirmed".to_string())
        }
        PaymentError::GatewayError(msg) => AppError::ExternalService(msg),
        PaymentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Start a checkout: create a gateway order tied to the appointment.
#[axum::debug_handler]
pub async fn create_payment_order(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Only the appointment's patient (or an admin) may start a payment.
    let reservations = ReservationService::new(&state);
    let appointment = reservations
        .get_appointment(request.appointment_id, token)
        .await
        .map_err(|_| AppError::NotFound("Appointment not found".to_string()))?;

    let is_owner = appointment.patient_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to pay for this appointment".to_string(),
        ));
    }

    let settlement = SettlementService::new(&state).map_err(map_error)?;
    let receipt = settlement
        .create_order(request.appointment_id, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "order_id": receipt.order_id,
        "amount": receipt.amount,
        "currency": receipt.currency,
    })))
}

/// Gateway callback verification. Unauthenticated: the signature is the
/// authentication. A cryptographic mismatch is an expected outcome
/// (`verified: false`), not a transport error, so the caller can offer
/// a retry.
#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let settlement = SettlementService::new(&state).map_err(map_error)?;

    match settlement.verify_payment(request).await {
        Ok(SettlementOutcome::Settled { appointment_id }) => Ok(Json(json!({
            "success": true,
            "verified": true,
            "settled": true,
            "appointment_id": appointment_id,
        }))),
        Ok(SettlementOutcome::NeedsReconciliation { appointment_id }) => Ok(Json(json!({
            "success": true,
            "verified": true,
            "settled": false,
            "needs_reconciliation": true,
            "appointment_id": appointment_id,
        }))),
        Err(PaymentError::SignatureMismatch) => Ok(Json(json!({
            "success": false,
            "verified": false,
        }))),
        Err(e) => Err(map_error(e)),
    }
}
