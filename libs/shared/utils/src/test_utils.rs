use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::clock::Clock;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub payment_gateway_url: String,
    pub payment_key_id: String,
    pub payment_key_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            payment_gateway_url: "http://localhost:54322".to_string(),
            payment_key_id: "test_key_id".to_string(),
            payment_key_secret: "test_key_secret".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            payment_gateway_url: self.payment_gateway_url.clone(),
            payment_key_id: self.payment_key_id.clone(),
            payment_key_secret: self.payment_key_secret.clone(),
            payment_currency: "INR".to_string(),
            notification_webhook_url: String::new(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(id: &str, email: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({ "alg": "HS256", "typ": "JWT" });
        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Deterministic clock for tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Canned PostgREST rows matching the storage schema the cells expect.
pub struct MockPostgrest;

impl MockPostgrest {
    pub fn full_week_hours() -> Value {
        let window = json!({ "enabled": true, "start": "09:00", "end": "17:00" });
        json!({
            "monday": window.clone(),
            "tuesday": window.clone(),
            "wednesday": window.clone(),
            "thursday": window.clone(),
            "friday": window.clone(),
            "saturday": window.clone(),
            "sunday": window,
        })
    }

    pub fn doctor_row(id: &str, fee_minor: i64) -> Value {
        Self::doctor_row_with_hours(id, fee_minor, Self::full_week_hours())
    }

    pub fn doctor_row_with_hours(id: &str, fee_minor: i64, working_hours: Value) -> Value {
        json!({
            "id": id,
            "full_name": "Dr. Test",
            "specialization": "General Medicine",
            "approved": true,
            "active": true,
            "consultation_fee_minor": fee_minor,
            "slot_minutes": 60,
            "working_hours": working_hours,
        })
    }

    pub fn suspended_doctor_row(id: &str, fee_minor: i64) -> Value {
        let mut row = Self::doctor_row(id, fee_minor);
        row["active"] = json!(false);
        row
    }

    pub fn patient_row(id: &str) -> Value {
        json!({
            "id": id,
            "full_name": "Test Patient",
            "active": true,
        })
    }

    pub fn suspended_patient_row(id: &str) -> Value {
        let mut row = Self::patient_row(id);
        row["active"] = json!(false);
        row
    }

    pub fn appointment_row(
        id: &str,
        doctor_id: &str,
        patient_id: &str,
        slot_date: &str,
        slot_time: &str,
        status: &str,
        payment_status: &str,
        fee_minor: i64,
    ) -> Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "slot_date": slot_date,
            "slot_time": slot_time,
            "fee_at_booking_minor": fee_minor,
            "status": status,
            "payment_status": payment_status,
            "patient_name_for_visit": "Test Patient",
            "symptoms": null,
            "reasons": null,
            "cancelled_by": null,
            "cancellation_reason": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
        })
    }

    pub fn payment_order_row(
        order_id: &str,
        appointment_id: &str,
        amount_minor: i64,
        status: &str,
    ) -> Value {
        json!({
            "order_id": order_id,
            "appointment_id": appointment_id,
            "amount_minor": amount_minor,
            "currency": "INR",
            "status": status,
            "payment_id": null,
            "created_at": "2025-01-01T00:00:00Z",
            "settled_at": null,
        })
    }
}
