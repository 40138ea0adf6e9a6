// libs/payment-cell/src/services/settlement.rs
use std::sync::Arc;

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus, PaymentStatus};
use notification_cell::models::NotificationEvent;
use notification_cell::services::sender::NotificationService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    PaymentError, PaymentOrder, PaymentOrderReceipt, PaymentOrderStatus, SettlementOutcome,
    VerifyPaymentRequest,
};
use crate::services::gateway::GatewayClient;

type HmacSha256 = Hmac<Sha256>;

/// Order creation and callback settlement for one appointment at a
/// time. Orders are consumed exactly once; a cancelled appointment is
/// never marked paid (it is flagged for reconciliation instead).
pub struct SettlementService {
    supabase: Arc<SupabaseClient>,
    gateway: GatewayClient,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
    key_secret: String,
    currency: String,
}

impl SettlementService {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PaymentError> {
        Ok(Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            gateway: GatewayClient::new(config)?,
            notifications: NotificationService::new(config),
            clock,
            key_secret: config.payment_key_secret.clone(),
            currency: config.payment_currency.clone(),
        })
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    /// Create (or re-create, for retry-after-abandon) a gateway order
    /// for an upcoming appointment. The amount comes from the fee
    /// snapshot taken at booking, never from the client.
    pub async fn create_order(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<PaymentOrderReceipt, PaymentError> {
        info!("Creating payment order for appointment {}", appointment_id);

        let appointment = self.fetch_appointment(appointment_id, Some(auth_token)).await?;

        if appointment.status != AppointmentStatus::Upcoming {
            return Err(PaymentError::AppointmentNotPayable {
                status: appointment.status,
            });
        }
        if appointment.payment_status == PaymentStatus::Paid {
            return Err(PaymentError::AppointmentNotPayable {
                status: appointment.status,
            });
        }

        let order = self
            .gateway
            .create_order(
                appointment.fee_at_booking_minor,
                &self.currency,
                &appointment_id.to_string(),
            )
            .await?;

        let order_row = json!({
            "order_id": order.id,
            "appointment_id": appointment_id,
            "amount_minor": appointment.fee_at_booking_minor,
            "currency": self.currency,
            "status": PaymentOrderStatus::Created.to_string(),
            "created_at": self.clock.now(),
        });

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/payment_orders",
                Some(auth_token),
                Some(order_row),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        // Flip the appointment to pending, but only while it is still
        // upcoming; a cancel racing this call wins.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id,
            AppointmentStatus::Upcoming
        );
        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "payment_status": PaymentStatus::Pending.to_string() })),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            warn!(
                "Appointment {} left upcoming while order {} was created; callback will reconcile",
                appointment_id, order.id
            );
        }

        info!(
            "Payment order {} created for appointment {} (amount {})",
            order.id, appointment_id, appointment.fee_at_booking_minor
        );

        Ok(PaymentOrderReceipt {
            order_id: order.id,
            amount: appointment.fee_at_booking_minor,
            currency: self.currency.clone(),
        })
    }

    /// Verify a gateway callback. The signature must match the stored
    /// order; the order is consumed exactly once; the paid flag is only
    /// set while the appointment is still upcoming.
    pub async fn verify_payment(
        &self,
        request: VerifyPaymentRequest,
    ) -> Result<SettlementOutcome, PaymentError> {
        debug!("Verifying payment for order {}", request.order_id);

        // The stored order is the anchor: a signature over ids that
        // match no stored order is rejected before any crypto outcome
        // can be trusted.
        let order = self.fetch_order(&request.order_id).await?;

        if !verify_signature(
            &self.key_secret,
            &request.order_id,
            &request.payment_id,
            &request.signature,
        ) {
            warn!(
                "Payment signature mismatch for order {} - possible tamper attempt",
                request.order_id
            );
            return Err(PaymentError::SignatureMismatch);
        }

        // Consume the order: conditional on `created` so a replayed
        // callback matches zero rows.
        let consume_path = format!(
            "/rest/v1/payment_orders?order_id=eq.{}&status=eq.{}",
            request.order_id,
            PaymentOrderStatus::Created
        );
        let consumed: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &consume_path,
                None,
                Some(json!({
                    "status": PaymentOrderStatus::Settled.to_string(),
                    "payment_id": request.payment_id,
                    "settled_at": self.clock.now(),
                })),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if consumed.is_empty() {
            warn!(
                "Replayed payment callback for already-consumed order {}",
                request.order_id
            );
            return Err(PaymentError::OrderAlreadySettled);
        }

        // Mark the appointment paid, but only while it is still
        // upcoming; a cancellation that raced the callback sends the
        // order to manual reconciliation instead.
        let paid_path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            order.appointment_id,
            AppointmentStatus::Upcoming
        );
        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &paid_path,
                None,
                Some(json!({ "payment_status": PaymentStatus::Paid.to_string() })),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            warn!(
                "Appointment {} no longer upcoming; flagging order {} for reconciliation",
                order.appointment_id, request.order_id
            );

            let flag_path = format!(
                "/rest/v1/payment_orders?order_id=eq.{}",
                request.order_id
            );
            let _: Vec<Value> = self
                .supabase
                .request_with_headers(
                    Method::PATCH,
                    &flag_path,
                    None,
                    Some(json!({
                        "status": PaymentOrderStatus::NeedsReconciliation.to_string(),
                    })),
                    Some(Self::representation_headers()),
                )
                .await
                .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

            self.notifications
                .notify(NotificationEvent::PaymentNeedsReconciliation {
                    appointment_id: order.appointment_id,
                    order_id: request.order_id.clone(),
                })
                .await;

            return Ok(SettlementOutcome::NeedsReconciliation {
                appointment_id: order.appointment_id,
            });
        }

        let paid: Appointment = updated
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                PaymentError::DatabaseError(format!("Failed to parse appointment: {}", e))
            })?
            .ok_or_else(|| PaymentError::DatabaseError("empty result set".to_string()))?;

        self.notifications
            .notify(NotificationEvent::PaymentConfirmed {
                appointment_id: order.appointment_id,
                order_id: request.order_id.clone(),
                recipient: paid.patient_id,
            })
            .await;

        info!(
            "Payment settled for appointment {} via order {}",
            order.appointment_id, request.order_id
        );

        Ok(SettlementOutcome::Settled {
            appointment_id: order.appointment_id,
        })
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, PaymentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(PaymentError::AppointmentNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn fetch_order(&self, order_id: &str) -> Result<PaymentOrder, PaymentError> {
        let path = format!("/rest/v1/payment_orders?order_id=eq.{}", order_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(PaymentError::OrderNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse order: {}", e)))
    }
}

/// Recompute the expected HMAC-SHA256 over "{order_id}|{payment_id}"
/// and compare against the hex-encoded supplied signature.
/// `Mac::verify_slice` is constant-time, so tampered signatures cannot
/// be probed byte by byte.
pub fn verify_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    supplied_hex: &str,
) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());

    let supplied = match hex::decode(supplied_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    mac.verify_slice(&supplied).is_ok()
}

/// Produce the signature the gateway would send for a callback. Used by
/// tests; the server itself only ever verifies.
pub fn sign_callback(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
