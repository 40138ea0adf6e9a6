// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, CancelAppointmentRequest, CancelledBy, ReserveSlotRequest, SlotQuery,
    SuspendPartyRequest,
};
use crate::services::cascade::SuspensionCascadeService;
use crate::services::reservation::ReservationService;
use crate::services::slots::SlotCatalogService;

fn map_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        AppointmentError::DoctorNotBookable => {
            AppError::Validation("Doctor is not accepting bookings".to_string())
        }
        AppointmentError::PatientNotActive => {
            AppError::Validation("Patient account is not active".to_string())
        }
        AppointmentError::SlotTaken => {
            AppError::Conflict("Slot already booked - please choose another slot".to_string())
        }
        AppointmentError::SlotUnavailable(msg) => {
            AppError::Validation(format!("Slot not bookable: {}", msg))
        }
        AppointmentError::InvalidTransition { current } => AppError::Conflict(format!(
            "Appointment cannot be modified in status {}",
            current
        )),
        AppointmentError::ValidationError(msg) => AppError::Validation(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// SLOT CATALOG
// ==============================================================================

#[axum::debug_handler]
pub async fn list_open_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let catalog = SlotCatalogService::new(&state);

    let slots = catalog
        .available_slots(doctor_id, query.from_date, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "slots": slots,
    })))
}

// ==============================================================================
// RESERVATION
// ==============================================================================

#[axum::debug_handler]
pub async fn reserve_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReserveSlotRequest>,
) -> Result<Json<Value>, AppError> {
    // Patients book for themselves; admins may book on their behalf.
    let is_patient = request.patient_id.to_string() == user.id;
    if !is_patient && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to book appointment for this patient".to_string(),
        ));
    }

    let reservations = ReservationService::new(&state);
    let appointment = reservations
        .reserve(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let reservations = ReservationService::new(&state);
    let appointment = reservations
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_error)?;

    let is_participant = appointment.patient_id.to_string() == user.id
        || appointment.doctor_id.to_string() == user.id;
    if !is_participant && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let reservations = ReservationService::new(&state);

    let appointment = reservations
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_error)?;

    // Self-cancel is restricted to the appointment's own patient.
    let is_owner = appointment.patient_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to cancel this appointment".to_string(),
        ));
    }

    let cancelled_by = if is_owner {
        CancelledBy::Patient
    } else {
        CancelledBy::Admin
    };

    let cancelled = reservations
        .cancel(appointment_id, cancelled_by, request.reason, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let reservations = ReservationService::new(&state);

    let appointment = reservations
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_error)?;

    // Completion is recorded by the treating doctor or an admin.
    let is_treating_doctor =
        user.is_doctor() && appointment.doctor_id.to_string() == user.id;
    if !is_treating_doctor && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to complete this appointment".to_string(),
        ));
    }

    let completed = reservations
        .complete(appointment_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": completed,
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if patient_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's appointments".to_string(),
        ));
    }

    let reservations = ReservationService::new(&state);
    let appointments = reservations
        .list_for_patient(patient_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if doctor_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's appointments".to_string(),
        ));
    }

    let reservations = ReservationService::new(&state);
    let appointments = reservations
        .list_for_doctor(doctor_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
    })))
}

// ==============================================================================
// SUSPENSION CASCADE
// ==============================================================================

#[axum::debug_handler]
pub async fn run_suspension_cascade(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SuspendPartyRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can run a suspension cascade".to_string(),
        ));
    }

    let cascade = SuspensionCascadeService::new(&state);
    let outcome = cascade
        .on_suspend(request.party, request.party_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "cancelled_count": outcome.cancelled_count,
        "failed_count": outcome.failed_count,
    })))
}
