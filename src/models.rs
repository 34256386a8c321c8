use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Events and venues (read-only catalog for this service)

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventEntity {
    pub id: Uuid,
    pub venue_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: String,
    pub table_booking_mode: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::venue_tables)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VenueTableEntity {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub zone: Option<String>,
    pub name: String,
    pub capacity: i32,
    pub minimum_spend: f32,
    pub deposit_amount: f32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::event_table_availability)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventTableAvailabilityEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub is_available: Option<bool>,
    pub minimum_spend: Option<f32>,
    pub deposit_amount: Option<f32>,
    pub capacity: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::booking_links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingLinkEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub table_id: Option<Uuid>,
    pub code: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::promoters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PromoterEntity {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::venue_payment_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VenuePaymentSettingsEntity {
    pub venue_id: Uuid,
    pub provider: String,
    pub api_key: Option<String>,
    pub is_enabled: bool,
    pub payment_expiry_hours: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Bookings

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::table_bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TableBookingEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub attendee_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_whatsapp: String,
    pub party_size: i32,
    pub special_requests: Option<String>,
    pub promoter_id: Option<Uuid>,
    pub referral_code: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub minimum_spend: f32,
    pub deposit_required: f32,
    pub payment_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::table_bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateTableBookingEntity {
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub attendee_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_whatsapp: String,
    pub party_size: i32,
    pub special_requests: Option<String>,
    pub promoter_id: Option<Uuid>,
    pub referral_code: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub minimum_spend: f32,
    pub deposit_required: f32,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::payment_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentTransactionEntity {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub amount: f32,
    pub currency: String,
    pub invoice_number: String,
    pub payment_url: Option<String>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::payment_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreatePaymentTransactionEntity {
    pub venue_id: Uuid,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub amount: f32,
    pub currency: String,
    pub invoice_number: String,
    pub payment_url: Option<String>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
}

// Party guests

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::table_party_guests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TablePartyGuestEntity {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub attendee_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub is_host: bool,
    pub status: String,
    pub invite_token: String,
    pub qr_token: Option<String>,
    pub checked_in: bool,
    pub invited_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::table_party_guests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateTablePartyGuestEntity {
    pub booking_id: Uuid,
    pub attendee_id: Option<Uuid>,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub is_host: bool,
    pub status: String,
    pub invite_token: String,
    pub joined_at: Option<DateTime<Utc>>,
}

// Attendees and registrations

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::attendees)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttendeeEntity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub user_id: Option<Uuid>,
    pub xp_points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::attendees)]
pub struct CreateAttendeeEntity {
    pub email: String,
    pub name: String,
    pub user_id: Option<Uuid>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::registrations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RegistrationEntity {
    pub id: Uuid,
    pub attendee_id: Uuid,
    pub event_id: Uuid,
    pub source: String,
    pub status: String,
    pub registered_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::registrations)]
pub struct CreateRegistrationEntity {
    pub attendee_id: Uuid,
    pub event_id: Uuid,
    pub source: String,
    pub status: String,
}

// Check-ins

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::checkins)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CheckinEntity {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub checked_in_by: Uuid,
    pub checked_in_at: DateTime<Utc>,
    pub undone_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::checkins)]
pub struct CreateCheckinEntity {
    pub registration_id: Uuid,
    pub checked_in_by: Uuid,
}

// Staff access

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::venue_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VenueMemberEntity {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// Side-effect ledgers

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::xp_transactions)]
pub struct CreateXpTransactionEntity {
    pub attendee_id: Uuid,
    pub amount: i32,
    pub reason: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::activity_log)]
pub struct CreateActivityLogEntity {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub metadata: Option<serde_json::Value>,
}
