// libs/profile-cell/src/models.rs
use std::collections::BTreeMap;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// PARTY MODELS (read-only: owned by the profile subsystem)
// ==============================================================================

/// A doctor as the booking core sees one. `approved` is the admin
/// vetting flag, `active` is the not-suspended flag; a doctor is
/// bookable only when both hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: String,
    pub approved: bool,
    pub active: bool,
    pub consultation_fee_minor: i64,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    pub working_hours: WorkingHours,
}

fn default_slot_minutes() -> u32 {
    60
}

impl Doctor {
    pub fn is_bookable(&self) -> bool {
        self.approved && self.active
    }

    pub fn window_for(&self, weekday: Weekday) -> Option<&WorkingWindow> {
        self.working_hours.get(&DayOfWeek::from(weekday))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub active: bool,
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

pub type WorkingHours = BTreeMap<DayOfWeek, WorkingWindow>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// One weekday's bookable window, e.g. 09:00-17:00.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub enabled: bool,
    #[serde(with = "hhmm_format")]
    pub start: NaiveTime,
    #[serde(with = "hhmm_format")]
    pub end: NaiveTime,
}

/// Wall-clock times are stored as "HH:MM" ("HH:MM:SS" also accepted).
pub mod hhmm_format {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use serde_json::json;

    fn doctor_json() -> serde_json::Value {
        json!({
            "id": "7e6b9a4e-8a1a-4f2e-9d1c-0f4a0f9b2c11",
            "full_name": "Dr. Asha Rao",
            "specialization": "General Medicine",
            "approved": true,
            "active": true,
            "consultation_fee_minor": 50000,
            "working_hours": {
                "monday": { "enabled": true, "start": "09:00", "end": "11:00" },
                "sunday": { "enabled": false, "start": "09:00", "end": "11:00" }
            }
        })
    }

    #[test]
    fn doctor_row_round_trips_with_defaulted_granularity() {
        let doctor: Doctor = serde_json::from_value(doctor_json()).unwrap();
        assert_eq!(doctor.slot_minutes, 60);
        assert!(doctor.is_bookable());

        let monday = doctor.window_for(Weekday::Mon).unwrap();
        assert!(monday.enabled);
        assert_eq!(monday.start.format("%H:%M").to_string(), "09:00");

        let sunday = doctor.window_for(Weekday::Sun).unwrap();
        assert!(!sunday.enabled);
        assert!(doctor.window_for(Weekday::Tue).is_none());
    }

    #[test]
    fn suspended_doctor_is_not_bookable() {
        let mut row = doctor_json();
        row["active"] = json!(false);
        let doctor: Doctor = serde_json::from_value(row).unwrap();
        assert!(!doctor.is_bookable());
    }

    #[test]
    fn window_accepts_seconds_suffix() {
        let window: WorkingWindow = serde_json::from_value(json!({
            "enabled": true, "start": "09:00:00", "end": "17:30:00"
        }))
        .unwrap();
        assert_eq!(window.end.format("%H:%M").to_string(), "17:30");
    }
}
