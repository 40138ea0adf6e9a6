// libs/profile-cell/src/services/profiles.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, Patient, ProfileError};

/// Read-only client for the profile subsystem's tables. The booking
/// core never mutates doctors or patients.
pub struct ProfileService {
    supabase: Arc<SupabaseClient>,
}

impl ProfileService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, ProfileError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(ProfileError::DoctorNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| ProfileError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    pub async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, ProfileError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(ProfileError::PatientNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| ProfileError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }
}
