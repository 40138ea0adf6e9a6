// libs/appointment-cell/src/services/reservation.rs
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::models::NotificationEvent;
use notification_cell::services::sender::NotificationService;
use profile_cell::services::profiles::ProfileService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CancelledBy, ClassifiedAppointment,
    ReserveSlotRequest, slot_time_format,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slots;

/// Owns every ledger mutation: atomic reservation, the idempotent
/// cancel transition shared by self-cancel, the suspension cascade and
/// the external payment-timeout reaper, and one-way completion.
pub struct ReservationService {
    supabase: Arc<SupabaseClient>,
    profiles: ProfileService,
    lifecycle: AppointmentLifecycleService,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
}

impl ReservationService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            profiles: ProfileService::new(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycleService::new(),
            notifications: NotificationService::new(config),
            supabase,
            clock,
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    /// Atomically claim a slot. The availability check is re-run at
    /// write time against the doctor's grid and the clock; taken-ness is
    /// decided by the storage constraint on (doctor, date, time) scoped
    /// to non-cancelled rows, so two racing requests serialize into one
    /// success and one `SlotTaken`.
    pub async fn reserve(
        &self,
        request: ReserveSlotRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Reserving slot ({}, {}) for doctor {} and patient {}",
            request.slot_date,
            slot_time_format::label(&request.slot_time),
            request.doctor_id,
            request.patient_id
        );

        let patient = self
            .profiles
            .get_patient(request.patient_id, auth_token)
            .await?;
        if !patient.active {
            return Err(AppointmentError::PatientNotActive);
        }

        let doctor = self
            .profiles
            .get_doctor(request.doctor_id, auth_token)
            .await?;
        if !doctor.is_bookable() {
            return Err(AppointmentError::DoctorNotBookable);
        }

        slots::assert_bookable(
            &doctor,
            request.slot_date,
            request.slot_time,
            self.clock.now().naive_utc(),
        )?;

        // Fee snapshot is taken server-side at this instant; later fee
        // changes never reach this appointment.
        let body = json!({
            "doctor_id": request.doctor_id,
            "patient_id": request.patient_id,
            "slot_date": request.slot_date,
            "slot_time": slot_time_format::label(&request.slot_time),
            "fee_at_booking_minor": doctor.consultation_fee_minor,
            "status": AppointmentStatus::Upcoming.to_string(),
            "payment_status": "none",
            "patient_name_for_visit": request.patient_name_for_visit,
            "symptoms": request.symptoms,
            "reasons": request.reasons,
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    warn!(
                        "Slot race lost for doctor {} at ({}, {})",
                        request.doctor_id,
                        request.slot_date,
                        slot_time_format::label(&request.slot_time)
                    );
                    AppointmentError::SlotTaken
                } else {
                    AppointmentError::DatabaseError(e.to_string())
                }
            })?;

        let appointment = Self::parse_single(rows)?;

        // Fire-and-forget; a failed notification never unwinds the booking.
        self.notifications
            .notify(NotificationEvent::AppointmentBooked {
                appointment_id: appointment.id,
                recipient: appointment.patient_id,
            })
            .await;

        info!("Appointment {} reserved", appointment.id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            return Err(AppointmentError::NotFound);
        }
        Self::parse_single(rows)
    }

    /// The single cancel transition. Conditional on `status=upcoming` so
    /// it is atomic against concurrent completion or a racing cascade;
    /// cancelling an already-cancelled appointment is a no-op success so
    /// retries are harmless.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        cancelled_by: CancelledBy,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {} by {}", appointment_id, cancelled_by);

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id,
            AppointmentStatus::Upcoming
        );
        let body = json!({
            "status": AppointmentStatus::Cancelled.to_string(),
            "cancelled_by": cancelled_by.to_string(),
            "cancellation_reason": reason,
            "updated_at": self.clock.now(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            // Nothing matched: the appointment is missing or already
            // terminal. Re-read to tell which.
            let current = self.get_appointment(appointment_id, auth_token).await?;
            return match current.status {
                AppointmentStatus::Cancelled => {
                    debug!("Appointment {} already cancelled", appointment_id);
                    Ok(current)
                }
                status => {
                    self.lifecycle
                        .validate_transition(&status, &AppointmentStatus::Cancelled)?;
                    Err(AppointmentError::DatabaseError(
                        "cancellation did not apply".to_string(),
                    ))
                }
            };
        }

        let appointment = Self::parse_single(rows)?;

        self.notifications
            .notify(NotificationEvent::AppointmentCancelled {
                appointment_id: appointment.id,
                recipient: appointment.patient_id,
                cancelled_by: cancelled_by.to_string(),
            })
            .await;

        info!("Appointment {} cancelled by {}", appointment_id, cancelled_by);
        Ok(appointment)
    }

    /// One-way completion, driven by the external visit-completion
    /// workflow. Never inferred from the date passing.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Completing appointment {}", appointment_id);

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id,
            AppointmentStatus::Upcoming
        );
        let body = json!({
            "status": AppointmentStatus::Completed.to_string(),
            "updated_at": self.clock.now(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            let current = self.get_appointment(appointment_id, auth_token).await?;
            self.lifecycle
                .validate_transition(&current.status, &AppointmentStatus::Completed)?;
            return Err(AppointmentError::DatabaseError(
                "completion did not apply".to_string(),
            ));
        }

        let appointment = Self::parse_single(rows)?;
        info!("Appointment {} completed", appointment_id);
        Ok(appointment)
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ClassifiedAppointment>, AppointmentError> {
        self.list_by("patient_id", patient_id, auth_token).await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ClassifiedAppointment>, AppointmentError> {
        self.list_by("doctor_id", doctor_id, auth_token).await
    }

    async fn list_by(
        &self,
        column: &str,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ClassifiedAppointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&order=slot_date.asc",
            column, id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let now = self.clock.now();
        let mut entries: Vec<ClassifiedAppointment> = rows
            .into_iter()
            .map(|row| {
                let appointment: Appointment = serde_json::from_value(row).map_err(|e| {
                    AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })?;
                let classification = appointment.classification(now);
                Ok(ClassifiedAppointment {
                    appointment,
                    classification,
                })
            })
            .collect::<Result<_, AppointmentError>>()?;

        // The PostgREST order clause handles the date; slot labels do
        // not sort lexically, so order within a day here.
        entries.sort_by_key(|entry| (entry.appointment.slot_date, entry.appointment.slot_time));
        Ok(entries)
    }

    fn parse_single(rows: Vec<Value>) -> Result<Appointment, AppointmentError> {
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("empty result set".to_string()))?;
        serde_json::from_value(row).map_err(|e| {
            AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
        })
    }
}
