// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub slot_date: NaiveDate,
    #[serde(with = "slot_time_format")]
    pub slot_time: NaiveTime,
    /// Fee snapshotted at creation, in the smallest currency unit.
    /// Immutable afterwards even if the doctor's current fee changes.
    pub fee_at_booking_minor: i64,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub patient_name_for_visit: String,
    pub symptoms: Option<String>,
    pub reasons: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_start(&self) -> NaiveDateTime {
        self.slot_date.and_time(self.slot_time)
    }

    /// Classify for listings: `status` is authoritative, the slot date
    /// only orders appointments that are still `upcoming`. A completed
    /// visit with a future date is a past visit.
    pub fn classification(&self, now: DateTime<Utc>) -> VisitClass {
        match self.status {
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => VisitClass::Past,
            AppointmentStatus::Upcoming => {
                if self.slot_start() >= now.naive_utc() {
                    VisitClass::Upcoming
                } else {
                    VisitClass::Past
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Upcoming => write!(f, "upcoming"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Payment state is additive to `status`: `paid` never replaces
/// `upcoming`, and a cancelled appointment is never marked paid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    None,
    Pending,
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::None => write!(f, "none"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Admin,
    System,
}

impl fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelledBy::Patient => write!(f, "patient"),
            CancelledBy::Admin => write!(f, "admin"),
            CancelledBy::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitClass {
    Upcoming,
    Past,
}

/// Slot labels travel as "10:00 AM" strings, matching what the booking
/// wizard renders.
pub mod slot_time_format {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const LABEL: &str = "%I:%M %p";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(LABEL).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, LABEL).map_err(serde::de::Error::custom)
    }

    pub fn label(time: &NaiveTime) -> String {
        time.format(LABEL).to_string()
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSlotRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub slot_date: NaiveDate,
    #[serde(with = "slot_time_format")]
    pub slot_time: NaiveTime,
    pub patient_name_for_visit: String,
    // Free-text triage fields, opaque to the core.
    pub symptoms: Option<String>,
    pub reasons: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendPartyRequest {
    pub party: PartyKind,
    pub party_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Doctor,
    Patient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub cancelled_count: u32,
    pub failed_count: u32,
}

/// One bookable (date, time) pair, ordered chronologically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSlot {
    pub slot_date: NaiveDate,
    #[serde(with = "slot_time_format")]
    pub slot_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub from_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub classification: VisitClass,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    /// Bounded slot-generation horizon, in days from the query date.
    pub horizon_days: i64,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self { horizon_days: 30 }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor is not accepting bookings")]
    DoctorNotBookable,

    #[error("Patient account is not active")]
    PatientNotActive,

    /// The slot race was lost: retryable with a different slot.
    #[error("Slot already reserved")]
    SlotTaken,

    /// The request never matched a bookable slot (off-grid, disabled
    /// weekday, or in the past). Not retryable as-is.
    #[error("Slot not bookable: {0}")]
    SlotUnavailable(String),

    #[error("Appointment cannot be modified in status {current}")]
    InvalidTransition { current: AppointmentStatus },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<profile_cell::models::ProfileError> for AppointmentError {
    fn from(err: profile_cell::models::ProfileError) -> Self {
        use profile_cell::models::ProfileError;
        match err {
            ProfileError::DoctorNotFound => AppointmentError::DoctorNotFound,
            ProfileError::PatientNotFound => AppointmentError::PatientNotFound,
            ProfileError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn appointment(status: AppointmentStatus, date: NaiveDate) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            slot_date: date,
            slot_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            fee_at_booking_minor: 1000,
            status,
            payment_status: PaymentStatus::None,
            patient_name_for_visit: "Test Patient".to_string(),
            symptoms: None,
            reasons: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn slot_time_label_round_trips() {
        let slot = OpenSlot {
            slot_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            slot_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&slot).unwrap();
        assert_eq!(value["slot_time"], "09:00 AM");

        let back: OpenSlot = serde_json::from_value(value).unwrap();
        assert_eq!(back, slot);
    }

    #[test]
    fn afternoon_labels_use_pm() {
        let time = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        assert_eq!(slot_time_format::label(&time), "02:30 PM");
    }

    #[test]
    fn completed_with_future_date_classifies_as_past() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap();
        let future = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let appt = appointment(AppointmentStatus::Completed, future);
        assert_eq!(appt.classification(now), VisitClass::Past);
    }

    #[test]
    fn upcoming_classification_tiebreaks_on_date() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap();

        let ahead = appointment(
            AppointmentStatus::Upcoming,
            NaiveDate::from_ymd_opt(2025, 1, 11).unwrap(),
        );
        assert_eq!(ahead.classification(now), VisitClass::Upcoming);

        let behind = appointment(
            AppointmentStatus::Upcoming,
            NaiveDate::from_ymd_opt(2025, 1, 9).unwrap(),
        );
        assert_eq!(behind.classification(now), VisitClass::Past);
    }
}
