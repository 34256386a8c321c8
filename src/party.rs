//! Party reconciliation engine.
//!
//! A confirmed table booking owns a party: one host plus invited guests.
//! The host row is materialized lazily on read (or on payment
//! confirmation), linked to an attendee and a registration, and handed a
//! signed QR pass. The whole routine is idempotent and safe to re-run on
//! every render.

use anyhow::{Context, Result};
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::app_error::AppError,
    models::{
        AttendeeEntity, CreateAttendeeEntity, CreateRegistrationEntity,
        CreateTablePartyGuestEntity, RegistrationEntity, TableBookingEntity,
        TablePartyGuestEntity,
    },
    passes::PassCodec,
    schema::{attendees, registrations, table_party_guests},
};

#[derive(Serialize, ToSchema, Debug)]
pub struct PartyHostView {
    pub id: Uuid,
    pub name: String,
    pub pass_url: Option<String>,
    pub checked_in: bool,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct PartyGuestView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: String,
    pub checked_in: bool,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct PartyView {
    pub host: PartyHostView,
    pub guests: Vec<PartyGuestView>,
    pub invite_url: String,
    pub total_joined: i64,
    pub party_size: i32,
}

#[derive(Serialize, ToSchema, Debug, PartialEq, Eq)]
pub struct GuestSummary {
    pub total: i64,
    pub invited: i64,
    pub joined: i64,
    pub checked_in: i64,
}

/// How the host row is obtained for a booking's party.
#[derive(Debug, PartialEq, Eq)]
enum HostResolution {
    Existing(Uuid),
    /// A guest row already carries the booker's email; promote it.
    Upgrade(Uuid),
    Create,
}

fn plan_host(booking_guest_email: &str, guests: &[TablePartyGuestEntity]) -> HostResolution {
    if let Some(host) = guests.iter().find(|guest| guest.is_host) {
        return HostResolution::Existing(host.id);
    }
    match guests
        .iter()
        .find(|guest| guest.guest_email.eq_ignore_ascii_case(booking_guest_email))
    {
        Some(guest) => HostResolution::Upgrade(guest.id),
        None => HostResolution::Create,
    }
}

pub fn summarize(guests: &[TablePartyGuestEntity]) -> GuestSummary {
    GuestSummary {
        total: guests.len() as i64,
        invited: guests.iter().filter(|g| g.status == "invited").count() as i64,
        joined: guests.iter().filter(|g| g.status == "joined").count() as i64,
        checked_in: guests.iter().filter(|g| g.checked_in).count() as i64,
    }
}

/// Host authorization for guest-list mutation. The email query parameter
/// is accepted as-is to keep shared booking links working.
pub fn authorize_host(
    caller_email: Option<&str>,
    booking: &TableBookingEntity,
    host: Option<&TablePartyGuestEntity>,
) -> Result<(), AppError> {
    let Some(email) = caller_email.map(str::trim).filter(|email| !email.is_empty()) else {
        return Err(AppError::Unauthorized);
    };
    if email.eq_ignore_ascii_case(&booking.guest_email) {
        return Ok(());
    }
    if let Some(host) = host {
        if email.eq_ignore_ascii_case(&host.guest_email) {
            return Ok(());
        }
    }
    Err(AppError::Forbidden(
        "Only the booking host can manage the guest list".into(),
    ))
}

pub fn new_invite_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn join_url(base_url: &str, invite_token: &str) -> String {
    format!("{}/party/join/{}", base_url, invite_token)
}

fn pass_url(base_url: &str, host_id: Uuid) -> String {
    format!("{}/party/pass/{}", base_url, host_id)
}

/// Materializes (or refreshes) the party for a booking. Returns `None`
/// until the booking is confirmed or paid.
pub async fn materialize_party(
    conn: &mut AsyncPgConnection,
    passes: &PassCodec,
    base_url: &str,
    booking: &TableBookingEntity,
) -> Result<Option<PartyView>> {
    if booking.status != "confirmed" && booking.payment_status != "paid" {
        return Ok(None);
    }

    let guests: Vec<TablePartyGuestEntity> = table_party_guests::table
        .filter(table_party_guests::booking_id.eq(booking.id))
        .filter(table_party_guests::status.ne("removed"))
        .order_by((
            table_party_guests::is_host.desc(),
            table_party_guests::created_at.asc(),
        ))
        .get_results(conn)
        .await
        .context("Failed to load party guests")?;

    let host_id = match plan_host(&booking.guest_email, &guests) {
        HostResolution::Existing(id) => id,
        HostResolution::Upgrade(id) => {
            let existing = guests
                .iter()
                .find(|guest| guest.id == id)
                .and_then(|guest| guest.joined_at);
            diesel::update(table_party_guests::table.find(id))
                .set((
                    table_party_guests::is_host.eq(true),
                    table_party_guests::status.eq("joined"),
                    table_party_guests::joined_at.eq(existing.unwrap_or_else(Utc::now)),
                    table_party_guests::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
                .await
                .context("Failed to promote guest to host")?;
            id
        }
        HostResolution::Create => {
            let host: TablePartyGuestEntity = diesel::insert_into(table_party_guests::table)
                .values(CreateTablePartyGuestEntity {
                    booking_id: booking.id,
                    attendee_id: booking.attendee_id,
                    guest_name: booking.guest_name.clone(),
                    guest_email: booking.guest_email.to_lowercase(),
                    guest_phone: Some(booking.guest_whatsapp.clone()),
                    is_host: true,
                    status: "joined".into(),
                    invite_token: new_invite_token(),
                    joined_at: Some(Utc::now()),
                })
                .returning(TablePartyGuestEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to create host guest")?;
            host.id
        }
    };

    // Host linking runs on every pass: attendee, registration, pass token.
    let host: TablePartyGuestEntity = table_party_guests::table
        .find(host_id)
        .get_result(conn)
        .await
        .context("Failed to reload host guest")?;

    let attendee =
        find_or_create_attendee(conn, &host.guest_email, &booking.guest_name).await?;
    let registration =
        find_or_create_registration(conn, attendee.id, booking.event_id).await?;

    if host.qr_token.is_none() || host.attendee_id.is_none() {
        let qr_token = match &host.qr_token {
            Some(token) => Some(token.clone()),
            None => match passes.mint(registration.id, booking.event_id, attendee.id) {
                Ok(token) => Some(token),
                Err(err) => {
                    tracing::warn!("Failed to mint pass for host {}: {err}", host.id);
                    None
                }
            },
        };
        diesel::update(table_party_guests::table.find(host.id))
            .set((
                table_party_guests::attendee_id.eq(attendee.id),
                table_party_guests::qr_token.eq(qr_token),
                table_party_guests::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await
            .context("Failed to link host guest")?;
    }

    // Re-fetch so the view reflects persisted state, not in-memory guesses.
    let host: TablePartyGuestEntity = table_party_guests::table
        .find(host_id)
        .get_result(conn)
        .await
        .context("Failed to reload host guest")?;

    // The host counts as joined even when it was created or promoted on
    // this very pass and the fetched list predates the write.
    let total_joined = guests
        .iter()
        .filter(|guest| guest.id != host.id && guest.status == "joined")
        .count() as i64
        + 1;

    let guest_views = guests
        .iter()
        .filter(|guest| guest.id != host.id)
        .map(|guest| PartyGuestView {
            id: guest.id,
            name: guest.guest_name.clone(),
            email: guest.guest_email.clone(),
            status: guest.status.clone(),
            checked_in: guest.checked_in,
        })
        .collect();

    Ok(Some(PartyView {
        host: PartyHostView {
            id: host.id,
            name: host.guest_name.clone(),
            pass_url: host.qr_token.as_ref().map(|_| pass_url(base_url, host.id)),
            checked_in: host.checked_in,
        },
        guests: guest_views,
        invite_url: join_url(base_url, &host.invite_token),
        total_joined,
        party_size: booking.party_size,
    }))
}

pub struct AddGuestOutcome {
    pub guest: TablePartyGuestEntity,
    pub join_url: String,
    pub reinstated: bool,
}

/// Adds (or reinstates) a guest on a confirmed booking's party. No email
/// is sent; hosts share the returned join link themselves.
pub async fn add_guest(
    conn: &mut AsyncPgConnection,
    base_url: &str,
    booking: &TableBookingEntity,
    guest_name: &str,
    guest_email: &str,
    guest_phone: Option<String>,
) -> Result<AddGuestOutcome, AppError> {
    if booking.status != "confirmed" && booking.payment_status != "paid" {
        return Err(AppError::InvalidState(
            "Guests can only be added once the booking is confirmed".into(),
        ));
    }
    if !fast_chemail::is_valid_email(guest_email) {
        return Err(AppError::Validation(
            "guest_email is not a valid email address".into(),
        ));
    }
    let email = guest_email.trim().to_lowercase();

    let matches: Vec<TablePartyGuestEntity> = table_party_guests::table
        .filter(table_party_guests::booking_id.eq(booking.id))
        .filter(table_party_guests::guest_email.eq(&email))
        .get_results(conn)
        .await
        .context("Failed to look up existing guests")?;

    if matches.iter().any(|guest| guest.status != "removed") {
        return Err(AppError::Conflict(format!(
            "{} is already on the guest list",
            email
        )));
    }

    if let Some(removed) = matches.iter().find(|guest| guest.status == "removed") {
        // Reinstate instead of growing a duplicate row.
        let guest: TablePartyGuestEntity =
            diesel::update(table_party_guests::table.find(removed.id))
                .set((
                    table_party_guests::status.eq("invited"),
                    table_party_guests::invited_at.eq(diesel::dsl::now),
                    table_party_guests::updated_at.eq(diesel::dsl::now),
                ))
                .returning(TablePartyGuestEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to reinstate removed guest")?;
        return Ok(AddGuestOutcome {
            join_url: join_url(base_url, &guest.invite_token),
            guest,
            reinstated: true,
        });
    }

    // Best-effort attendee linkage; absent is fine, they may sign up later.
    let attendee_id: Option<Uuid> = attendees::table
        .filter(attendees::email.eq(&email))
        .select(attendees::id)
        .first(conn)
        .await
        .optional()
        .context("Failed to look up attendee for new guest")?;

    let guest: TablePartyGuestEntity = diesel::insert_into(table_party_guests::table)
        .values(CreateTablePartyGuestEntity {
            booking_id: booking.id,
            attendee_id,
            guest_name: guest_name.trim().to_string(),
            guest_email: email,
            guest_phone,
            is_host: false,
            status: "invited".into(),
            invite_token: new_invite_token(),
            joined_at: None,
        })
        .returning(TablePartyGuestEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to add guest")?;

    Ok(AddGuestOutcome {
        join_url: join_url(base_url, &guest.invite_token),
        guest,
        reinstated: false,
    })
}

/// Soft-removes a guest and cancels their event registration. The host
/// row can never be removed.
pub async fn remove_guest(
    conn: &mut AsyncPgConnection,
    booking: &TableBookingEntity,
    guest_id: Uuid,
) -> Result<TablePartyGuestEntity, AppError> {
    let guest: TablePartyGuestEntity = table_party_guests::table
        .find(guest_id)
        .filter(table_party_guests::booking_id.eq(booking.id))
        .get_result(conn)
        .await
        .map_err(AppError::from)?;

    if guest.is_host {
        return Err(AppError::Validation(
            "The host cannot be removed from the party".into(),
        ));
    }
    if guest.status == "removed" {
        return Ok(guest);
    }

    let guest: TablePartyGuestEntity = diesel::update(table_party_guests::table.find(guest.id))
        .set((
            table_party_guests::status.eq("removed"),
            table_party_guests::updated_at.eq(diesel::dsl::now),
        ))
        .returning(TablePartyGuestEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to remove guest")?;

    if let Some(attendee_id) = guest.attendee_id {
        diesel::update(
            registrations::table
                .filter(registrations::attendee_id.eq(attendee_id))
                .filter(registrations::event_id.eq(booking.event_id)),
        )
        .set(registrations::status.eq("cancelled"))
        .execute(conn)
        .await
        .context("Failed to cancel removed guest's registration")?;
    }

    Ok(guest)
}

pub async fn load_roster(
    conn: &mut AsyncPgConnection,
    booking_id: Uuid,
) -> Result<Vec<TablePartyGuestEntity>> {
    table_party_guests::table
        .filter(table_party_guests::booking_id.eq(booking_id))
        .filter(table_party_guests::status.ne("removed"))
        .order_by((
            table_party_guests::is_host.desc(),
            table_party_guests::created_at.asc(),
        ))
        .get_results(conn)
        .await
        .context("Failed to load party roster")
}

pub async fn find_host(
    conn: &mut AsyncPgConnection,
    booking_id: Uuid,
) -> Result<Option<TablePartyGuestEntity>> {
    table_party_guests::table
        .filter(table_party_guests::booking_id.eq(booking_id))
        .filter(table_party_guests::is_host.eq(true))
        .filter(table_party_guests::status.ne("removed"))
        .first(conn)
        .await
        .optional()
        .context("Failed to look up party host")
}

async fn find_or_create_attendee(
    conn: &mut AsyncPgConnection,
    email: &str,
    name: &str,
) -> Result<AttendeeEntity> {
    let email = email.trim().to_lowercase();
    let existing: Option<AttendeeEntity> = attendees::table
        .filter(attendees::email.eq(&email))
        .first(conn)
        .await
        .optional()
        .context("Failed to look up attendee")?;
    if let Some(attendee) = existing {
        return Ok(attendee);
    }

    diesel::insert_into(attendees::table)
        .values(CreateAttendeeEntity {
            email,
            name: name.to_string(),
            user_id: None,
        })
        .returning(AttendeeEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create attendee")
}

async fn find_or_create_registration(
    conn: &mut AsyncPgConnection,
    attendee_id: Uuid,
    event_id: Uuid,
) -> Result<RegistrationEntity> {
    let existing: Option<RegistrationEntity> = registrations::table
        .filter(registrations::attendee_id.eq(attendee_id))
        .filter(registrations::event_id.eq(event_id))
        .first(conn)
        .await
        .optional()
        .context("Failed to look up registration")?;
    if let Some(registration) = existing {
        return Ok(registration);
    }

    diesel::insert_into(registrations::table)
        .values(CreateRegistrationEntity {
            attendee_id,
            event_id,
            source: "table_booking".into(),
            status: "active".into(),
        })
        .returning(RegistrationEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create registration")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn guest(email: &str, is_host: bool, status: &str, checked_in: bool) -> TablePartyGuestEntity {
        TablePartyGuestEntity {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            attendee_id: None,
            guest_name: "Guest".into(),
            guest_email: email.into(),
            guest_phone: None,
            is_host,
            status: status.into(),
            invite_token: "tok".into(),
            qr_token: None,
            checked_in,
            invited_at: Utc::now(),
            joined_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn booking(guest_email: &str) -> TableBookingEntity {
        TableBookingEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            table_id: Uuid::new_v4(),
            attendee_id: None,
            guest_name: "Host".into(),
            guest_email: guest_email.into(),
            guest_whatsapp: "+10000000".into(),
            party_size: 8,
            special_requests: None,
            promoter_id: None,
            referral_code: None,
            status: "confirmed".into(),
            payment_status: "paid".into(),
            minimum_spend: 500.0,
            deposit_required: 50.0,
            payment_transaction_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn plan_keeps_an_existing_host() {
        let host = guest("host@x.com", true, "joined", false);
        let host_id = host.id;
        let guests = vec![host, guest("a@x.com", false, "invited", false)];
        assert_eq!(plan_host("host@x.com", &guests), HostResolution::Existing(host_id));
    }

    #[test]
    fn plan_promotes_a_matching_guest_row() {
        let matching = guest("Host@X.com", false, "invited", false);
        let matching_id = matching.id;
        let guests = vec![guest("a@x.com", false, "invited", false), matching];
        assert_eq!(plan_host("host@x.com", &guests), HostResolution::Upgrade(matching_id));
    }

    #[test]
    fn plan_creates_when_nothing_matches() {
        let guests = vec![guest("a@x.com", false, "invited", false)];
        assert_eq!(plan_host("host@x.com", &guests), HostResolution::Create);
        assert_eq!(plan_host("host@x.com", &[]), HostResolution::Create);
    }

    #[test]
    fn summary_counts_the_filtered_roster() {
        let guests = vec![
            guest("host@x.com", true, "joined", true),
            guest("a@x.com", false, "invited", false),
            guest("b@x.com", false, "joined", false),
        ];
        assert_eq!(
            summarize(&guests),
            GuestSummary {
                total: 3,
                invited: 1,
                joined: 2,
                checked_in: 1,
            }
        );
    }

    #[test]
    fn host_auth_accepts_booking_email_case_insensitively() {
        let booking = booking("host@x.com");
        assert!(authorize_host(Some("HOST@X.COM"), &booking, None).is_ok());
    }

    #[test]
    fn host_auth_accepts_the_host_guest_email() {
        let booking = booking("host@x.com");
        let host = guest("other-host@x.com", true, "joined", false);
        assert!(authorize_host(Some("other-host@x.com"), &booking, Some(&host)).is_ok());
    }

    #[test]
    fn host_auth_rejects_strangers_and_anonymous() {
        let booking = booking("host@x.com");
        assert!(matches!(
            authorize_host(Some("stranger@x.com"), &booking, None),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_host(None, &booking, None),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            authorize_host(Some("  "), &booking, None),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn invite_tokens_are_long_and_unique() {
        let one = new_invite_token();
        let two = new_invite_token();
        assert_eq!(one.len(), 32);
        assert_ne!(one, two);
    }
}
