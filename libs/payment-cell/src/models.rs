// libs/payment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use appointment_cell::models::AppointmentStatus;

// ==============================================================================
// SETTLEMENT MODELS
// ==============================================================================

/// One payment attempt, keyed by the gateway-issued order id and tied
/// 1:1 to the appointment it settles. Consumed exactly once by a
/// successful verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: String,
    pub appointment_id: Uuid,
    /// Always equals the appointment's fee snapshot, in the smallest
    /// currency unit.
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentOrderStatus,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOrderStatus {
    Created,
    Settled,
    NeedsReconciliation,
}

impl fmt::Display for PaymentOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentOrderStatus::Created => write!(f, "created"),
            PaymentOrderStatus::Settled => write!(f, "settled"),
            PaymentOrderStatus::NeedsReconciliation => write!(f, "needs_reconciliation"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub appointment_id: Uuid,
}

/// What the client needs to start the gateway checkout. The amount is
/// derived from the fee snapshot, never from client input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrderReceipt {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    /// Hex-encoded HMAC-SHA256 over "{order_id}|{payment_id}".
    pub signature: String,
}

/// Outcome of a cryptographically successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The appointment was still upcoming and is now marked paid.
    Settled { appointment_id: Uuid },
    /// The appointment was no longer upcoming (e.g. a suspension raced
    /// the callback); the order is flagged for manual reconciliation
    /// instead of silently marking a cancelled appointment paid.
    NeedsReconciliation { appointment_id: Uuid },
}

// ==============================================================================
// GATEWAY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Appointment is not payable in status {status}")]
    AppointmentNotPayable { status: AppointmentStatus },

    #[error("Payment order not found")]
    OrderNotFound,

    #[error("Payment order already settled")]
    OrderAlreadySettled,

    #[error("Payment signature mismatch")]
    SignatureMismatch,

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
