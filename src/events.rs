//! Domain event payloads exchanged with the rest of the platform over the
//! message broker.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub struct BookingRequestedEvent {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub deposit_required: f32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub payment_transaction_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PaymentCompletedEvent {
    pub payment_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PaymentFailedEvent {
    pub payment_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GuestCheckedInEvent {
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub attendee_id: Uuid,
    pub checked_in_by: Uuid,
}
