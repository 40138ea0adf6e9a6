// libs/notification-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events forwarded to the notification collaborator. Delivery is
/// fire-and-forget: a lost event never rolls back a ledger mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    AppointmentBooked {
        appointment_id: Uuid,
        recipient: Uuid,
    },
    AppointmentCancelled {
        appointment_id: Uuid,
        recipient: Uuid,
        cancelled_by: String,
    },
    PaymentConfirmed {
        appointment_id: Uuid,
        order_id: String,
        recipient: Uuid,
    },
    PaymentNeedsReconciliation {
        appointment_id: Uuid,
        order_id: String,
    },
}
