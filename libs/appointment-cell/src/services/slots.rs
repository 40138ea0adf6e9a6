// libs/appointment-cell/src/services/slots.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use profile_cell::models::Doctor;
use profile_cell::services::profiles::ProfileService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{slot_time_format, AppointmentError, OpenSlot, SchedulingRules};

/// Computes the bookable (date, time) pairs for a doctor: a pure read
/// over working hours and the existing ledger. Every decision is
/// re-derived from the durable store at request time; nothing is cached
/// in-process.
pub struct SlotCatalogService {
    supabase: Arc<SupabaseClient>,
    profiles: ProfileService,
    clock: Arc<dyn Clock>,
    rules: SchedulingRules,
}

impl SlotCatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            profiles: ProfileService::new(Arc::clone(&supabase)),
            supabase,
            clock,
            rules: SchedulingRules::default(),
        }
    }

    /// All open slots for a doctor from `from_date` (default: today)
    /// over the bounded horizon, chronologically ordered. Suspended or
    /// unapproved doctors yield an empty list, not an error.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        from_date: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<OpenSlot>, AppointmentError> {
        let doctor = self.profiles.get_doctor(doctor_id, auth_token).await?;

        if !doctor.is_bookable() {
            debug!("Doctor {} is not bookable, returning no slots", doctor_id);
            return Ok(vec![]);
        }

        let now = self.clock.now().naive_utc();
        let window_start = from_date.unwrap_or_else(|| now.date());
        let window_end = window_start + ChronoDuration::days(self.rules.horizon_days - 1);

        let taken = self
            .taken_slots(doctor_id, window_start, window_end, auth_token)
            .await?;

        let mut slots = expand_grid(&doctor, window_start, self.rules.horizon_days, now);
        slots.retain(|slot| !taken.contains(&(slot.slot_date, slot.slot_time)));
        slots.sort_by_key(|slot| (slot.slot_date, slot.slot_time));

        debug!("Found {} open slots for doctor {}", slots.len(), doctor_id);
        Ok(slots)
    }

    /// (date, time) pairs already held by a non-cancelled appointment.
    /// Cancelled rows free their slot.
    async fn taken_slots(
        &self,
        doctor_id: Uuid,
        window_start: NaiveDate,
        window_end: NaiveDate,
        auth_token: &str,
    ) -> Result<HashSet<(NaiveDate, NaiveTime)>, AppointmentError> {
        #[derive(Deserialize)]
        struct TakenSlot {
            slot_date: NaiveDate,
            #[serde(with = "slot_time_format")]
            slot_time: NaiveTime,
        }

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.(upcoming,completed)&slot_date=gte.{}&slot_date=lte.{}&select=slot_date,slot_time",
            doctor_id, window_start, window_end
        );

        let rows: Vec<TakenSlot> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.slot_date, row.slot_time))
            .collect())
    }
}

/// Expand a doctor's working hours into discrete slots for each day of
/// the horizon, dropping anything strictly before `now` (a slot at
/// exactly "now" is still bookable).
pub fn expand_grid(
    doctor: &Doctor,
    window_start: NaiveDate,
    horizon_days: i64,
    now: NaiveDateTime,
) -> Vec<OpenSlot> {
    let mut slots = Vec::new();
    if doctor.slot_minutes == 0 {
        return slots;
    }
    let step = ChronoDuration::minutes(doctor.slot_minutes as i64);

    for offset in 0..horizon_days {
        let date = window_start + ChronoDuration::days(offset);
        let window = match doctor.window_for(date.weekday()) {
            Some(window) if window.enabled => window,
            _ => continue,
        };

        let mut start = window.start;
        loop {
            let (end, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 || end > window.end {
                break;
            }
            if date.and_time(start) >= now {
                slots.push(OpenSlot {
                    slot_date: date,
                    slot_time: start,
                });
            }
            start = end;
        }
    }

    slots
}

/// Write-time re-check for a reservation request: the requested pair
/// must lie on the doctor's grid and must not be in the past. Taken-ness
/// is not decided here; the storage constraint is the arbiter for that.
pub fn assert_bookable(
    doctor: &Doctor,
    slot_date: NaiveDate,
    slot_time: NaiveTime,
    now: NaiveDateTime,
) -> Result<(), AppointmentError> {
    if doctor.slot_minutes == 0 {
        return Err(AppointmentError::SlotUnavailable(
            "doctor has no slot granularity configured".to_string(),
        ));
    }

    let window = doctor
        .window_for(slot_date.weekday())
        .filter(|window| window.enabled)
        .ok_or_else(|| {
            AppointmentError::SlotUnavailable(format!(
                "doctor does not work on {}",
                slot_date.weekday()
            ))
        })?;

    let step = ChronoDuration::minutes(doctor.slot_minutes as i64);
    let (slot_end, wrapped) = slot_time.overflowing_add_signed(step);
    if wrapped != 0 || slot_time < window.start || slot_end > window.end {
        return Err(AppointmentError::SlotUnavailable(
            "requested time is outside working hours".to_string(),
        ));
    }

    let offset = slot_time - window.start;
    if offset.num_minutes() % doctor.slot_minutes as i64 != 0 {
        return Err(AppointmentError::SlotUnavailable(
            "requested time is not on the slot grid".to_string(),
        ));
    }

    if slot_date.and_time(slot_time) < now {
        return Err(AppointmentError::SlotUnavailable(
            "requested slot is in the past".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use profile_cell::models::{DayOfWeek, WorkingWindow};
    use serde_json::json;

    fn doctor_with_monday_window(start: &str, end: &str, slot_minutes: u32) -> Doctor {
        let doctor: Doctor = serde_json::from_value(json!({
            "id": "7e6b9a4e-8a1a-4f2e-9d1c-0f4a0f9b2c11",
            "full_name": "Dr. Asha Rao",
            "specialization": "General Medicine",
            "approved": true,
            "active": true,
            "consultation_fee_minor": 50000,
            "slot_minutes": slot_minutes,
            "working_hours": {
                "monday": { "enabled": true, "start": start, "end": end }
            }
        }))
        .unwrap();
        doctor
    }

    // 2025-01-06 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    fn early(date: NaiveDate) -> NaiveDateTime {
        date.and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn two_hour_window_yields_two_hourly_slots() {
        let doctor = doctor_with_monday_window("09:00", "11:00", 60);
        let slots = expand_grid(&doctor, monday(), 1, early(monday()));

        let labels: Vec<String> = slots
            .iter()
            .map(|s| slot_time_format::label(&s.slot_time))
            .collect();
        assert_eq!(labels, vec!["09:00 AM", "10:00 AM"]);
    }

    #[test]
    fn disabled_and_missing_weekdays_yield_nothing() {
        let doctor = doctor_with_monday_window("09:00", "11:00", 60);
        // Tuesday has no window at all.
        let tuesday = monday() + ChronoDuration::days(1);
        assert!(expand_grid(&doctor, tuesday, 1, early(tuesday)).is_empty());
    }

    #[test]
    fn horizon_covers_repeating_weekdays() {
        let doctor = doctor_with_monday_window("09:00", "10:00", 60);
        // 14-day horizon from a Monday spans exactly two Mondays.
        let slots = expand_grid(&doctor, monday(), 14, early(monday()));
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].slot_date, monday());
        assert_eq!(slots[1].slot_date, monday() + ChronoDuration::days(7));
    }

    #[test]
    fn past_slots_are_dropped_but_now_is_kept() {
        let doctor = doctor_with_monday_window("09:00", "12:00", 60);
        let now = monday().and_hms_opt(10, 0, 0).unwrap();
        let slots = expand_grid(&doctor, monday(), 1, now);

        let labels: Vec<String> = slots
            .iter()
            .map(|s| slot_time_format::label(&s.slot_time))
            .collect();
        // 09:00 is gone; the 10:00 boundary slot is inclusive of "now".
        assert_eq!(labels, vec!["10:00 AM", "11:00 AM"]);
    }

    #[test]
    fn half_hour_granularity_is_honoured() {
        let doctor = doctor_with_monday_window("09:00", "10:30", 30);
        let slots = expand_grid(&doctor, monday(), 1, early(monday()));
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn bookable_check_accepts_grid_slot() {
        let doctor = doctor_with_monday_window("09:00", "11:00", 60);
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(assert_bookable(&doctor, monday(), ten, early(monday())).is_ok());
    }

    #[test]
    fn bookable_check_rejects_off_grid_and_past() {
        let doctor = doctor_with_monday_window("09:00", "11:00", 60);

        let off_grid = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_matches!(
            assert_bookable(&doctor, monday(), off_grid, early(monday())),
            Err(AppointmentError::SlotUnavailable(_))
        );

        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let later = monday().and_hms_opt(10, 30, 0).unwrap();
        assert_matches!(
            assert_bookable(&doctor, monday(), ten, later),
            Err(AppointmentError::SlotUnavailable(_))
        );

        let sunday = monday() - ChronoDuration::days(1);
        assert_matches!(
            assert_bookable(&doctor, sunday, ten, early(sunday)),
            Err(AppointmentError::SlotUnavailable(_))
        );
    }

    #[test]
    fn slot_must_fit_inside_the_window() {
        let doctor = doctor_with_monday_window("09:00", "11:00", 60);
        // 10:30 would end at 11:30, past the window end.
        let half_past = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        assert_matches!(
            assert_bookable(&doctor, monday(), half_past, early(monday())),
            Err(AppointmentError::SlotUnavailable(_))
        );
    }
}
