use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    api, availability,
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, Identity},
        outbox,
    },
    events::BookingRequestedEvent,
    models::{
        BookingLinkEntity, CreateTableBookingEntity, EventEntity, EventTableAvailabilityEntity,
        PaymentTransactionEntity, TableBookingEntity, VenueTableEntity,
    },
    party,
    payments::{self, PaymentInfo},
    schema::{
        attendees, booking_links, event_table_availability, events, payment_transactions,
        promoters, table_bookings, venue_tables,
    },
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/bookings",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(submit_booking))
            .routes(utoipa_axum::routes!(get_booking))
            .route_layer(axum::middleware::from_fn(middleware::identity)),
    )
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitBookingReq {
    pub event_id: Uuid,
    pub table_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_whatsapp: Option<String>,
    pub special_requests: Option<String>,
    pub ref_code: Option<String>,
    pub link_code: Option<String>,
}

struct ValidBookingInput {
    table_id: Uuid,
    guest_name: String,
    guest_email: String,
    guest_whatsapp: String,
}

fn validate(req: &SubmitBookingReq) -> Result<ValidBookingInput, AppError> {
    let table_id = req
        .table_id
        .ok_or_else(|| AppError::Validation("table_id is required".into()))?;
    let guest_name = required(&req.guest_name, "guest_name")?;
    let guest_email = required(&req.guest_email, "guest_email")?.to_lowercase();
    let guest_whatsapp = required(&req.guest_whatsapp, "guest_whatsapp")?;
    if !fast_chemail::is_valid_email(&guest_email) {
        return Err(AppError::Validation(
            "guest_email is not a valid email address".into(),
        ));
    }
    Ok(ValidBookingInput {
        table_id,
        guest_name,
        guest_email,
        guest_whatsapp,
    })
}

fn required(value: &Option<String>, field: &str) -> Result<String, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

/// Admission policy for a booking request. A valid direct link bypasses
/// the event's booking mode entirely.
fn check_admission(
    booking_mode: &str,
    ref_code: Option<&str>,
    link: Option<&BookingLinkEntity>,
    table_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if let Some(link) = link {
        if !link.is_active {
            return Err(AppError::Gone("This booking link is no longer active".into()));
        }
        if link.expires_at.is_some_and(|expiry| expiry <= now) {
            return Err(AppError::Gone("This booking link has expired".into()));
        }
        if let Some(pinned) = link.table_id {
            if pinned != table_id {
                return Err(AppError::InvalidState(
                    "This booking link is for a different table".into(),
                ));
            }
        }
        return Ok(());
    }

    match booking_mode {
        "disabled" => Err(AppError::InvalidState(
            "Table booking is not available for this event".into(),
        )),
        "promoter_only" if ref_code.is_none_or(|code| code.trim().is_empty()) => {
            Err(AppError::InvalidState(
                "Table bookings for this event require a promoter link".into(),
            ))
        }
        _ => Ok(()),
    }
}

fn duplicate_message(prior_status: &str) -> String {
    if prior_status == "confirmed" {
        "This table is already booked and confirmed for this email".into()
    } else {
        "A booking request for this table is already pending for this email".into()
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubmitBookingRes {
    pub booking: TableBookingEntity,
    pub event: EventEntity,
    pub payment: Option<PaymentInfo>,
}

/// Submit a table booking request for an event.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Bookings"],
    request_body = SubmitBookingReq,
    responses(
        (status = 200, description = "Booking request created", body = StdResponse<SubmitBookingRes, String>),
        (status = 400, description = "Invalid request or event state"),
        (status = 404, description = "Event or table not found"),
        (status = 410, description = "Booking link expired")
    )
)]
async fn submit_booking(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<SubmitBookingReq>,
) -> Result<impl IntoResponse, AppError> {
    let input = validate(&body)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let event: EventEntity = events::table
        .find(body.event_id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;
    if event.status != "published" {
        return Err(AppError::InvalidState(
            "This event is not open for bookings".into(),
        ));
    }

    let link = match body.link_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let link: Option<BookingLinkEntity> = booking_links::table
                .filter(booking_links::code.eq(code))
                .filter(booking_links::event_id.eq(event.id))
                .first(conn)
                .await
                .optional()
                .context("Failed to resolve booking link")?;
            Some(link.ok_or_else(|| {
                AppError::Gone("This booking link is no longer valid".into())
            })?)
        }
        None => None,
    };
    check_admission(
        &event.table_booking_mode,
        body.ref_code.as_deref(),
        link.as_ref(),
        input.table_id,
        Utc::now(),
    )?;

    let table: VenueTableEntity = venue_tables::table
        .find(input.table_id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;
    if event.venue_id != Some(table.venue_id) {
        return Err(AppError::InvalidState(
            "This table does not belong to the event's venue".into(),
        ));
    }
    if !table.is_active {
        return Err(AppError::InvalidState("This table is not available".into()));
    }

    let override_row: Option<EventTableAvailabilityEntity> = event_table_availability::table
        .filter(event_table_availability::event_id.eq(event.id))
        .filter(event_table_availability::table_id.eq(table.id))
        .first(conn)
        .await
        .optional()
        .context("Failed to load table availability override")?;
    let resolved = availability::resolve(&table, override_row.as_ref());
    if !resolved.is_available {
        return Err(AppError::InvalidState(
            "This table is not available for this event".into(),
        ));
    }

    let (promoter_id, referral_code) =
        resolve_promoter(conn, body.ref_code.as_deref()).await?;
    let attendee_id = resolve_attendee(conn, &identity, &input.guest_email).await?;

    // Best-effort duplicate guard; check-in is the only race-hard path.
    let prior: Option<TableBookingEntity> = table_bookings::table
        .filter(table_bookings::event_id.eq(event.id))
        .filter(table_bookings::table_id.eq(table.id))
        .filter(table_bookings::guest_email.eq(&input.guest_email))
        .filter(table_bookings::status.eq_any(["pending", "confirmed"]))
        .first(conn)
        .await
        .optional()
        .context("Failed to check for duplicate bookings")?;
    if let Some(prior) = prior {
        return Err(AppError::Conflict(duplicate_message(&prior.status)));
    }

    let deposit_required = resolved.deposit > 0.0;
    let booking: TableBookingEntity = diesel::insert_into(table_bookings::table)
        .values(CreateTableBookingEntity {
            event_id: event.id,
            table_id: table.id,
            attendee_id,
            guest_name: input.guest_name.clone(),
            guest_email: input.guest_email.clone(),
            guest_whatsapp: input.guest_whatsapp.clone(),
            party_size: resolved.party_size,
            special_requests: body.special_requests.clone(),
            promoter_id,
            referral_code,
            status: "pending".into(),
            payment_status: if deposit_required {
                "pending".into()
            } else {
                "not_required".into()
            },
            minimum_spend: resolved.minimum_spend,
            deposit_required: resolved.deposit,
        })
        .returning(TableBookingEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create booking")?;

    if let Err(err) = api::emails::send_template(
        state.http_client.clone(),
        "table-booking-requested",
        &booking.guest_email,
        booking.attendee_id,
        json!({
            "guest_name": booking.guest_name,
            "event_name": event.name,
            "table_name": table.name,
            "party_size": booking.party_size,
            "deposit": booking.deposit_required,
        }),
    )
    .await
    {
        warn!("Booking request email failed for {}: {err:#}", booking.id);
    }

    let payment = if deposit_required {
        payments::open_session(&state, conn, &booking, &event, resolved.deposit)
            .await
            .unwrap_or_else(|err| {
                warn!(
                    "Failed to open payment session for booking {}: {err:#}",
                    booking.id
                );
                None
            })
    } else {
        None
    };

    if let Err(err) = outbox::publish(
        conn,
        "bookings.booking_requested".into(),
        BookingRequestedEvent {
            booking_id: booking.id,
            event_id: event.id,
            table_id: table.id,
            deposit_required: booking.deposit_required,
        },
    )
    .await
    {
        warn!("Failed to stage booking_requested event: {err:#}");
    }

    // The payment bridge links the transaction onto the booking row.
    let booking = if payment.is_some() {
        table_bookings::table
            .find(booking.id)
            .get_result(conn)
            .await
            .context("Failed to reload booking")?
    } else {
        booking
    };

    let message = if deposit_required {
        "Booking request received. Complete the deposit payment to secure your table."
    } else {
        "Booking request received. The venue will confirm your table shortly."
    };

    Ok(StdResponse {
        data: Some(SubmitBookingRes {
            booking,
            event,
            payment,
        }),
        message: Some(message),
    })
}

async fn resolve_promoter(
    conn: &mut diesel_async::AsyncPgConnection,
    ref_code: Option<&str>,
) -> Result<(Option<Uuid>, Option<String>), AppError> {
    let Some(code) = ref_code.map(str::trim).filter(|code| !code.is_empty()) else {
        return Ok((None, None));
    };

    if let Ok(id) = Uuid::parse_str(code) {
        let by_id: Option<Uuid> = promoters::table
            .find(id)
            .select(promoters::id)
            .first(conn)
            .await
            .optional()
            .context("Failed to resolve promoter by id")?;
        if let Some(promoter_id) = by_id {
            return Ok((Some(promoter_id), Some(code.to_string())));
        }

        let by_user: Option<Uuid> = promoters::table
            .filter(promoters::user_id.eq(id))
            .select(promoters::id)
            .first(conn)
            .await
            .optional()
            .context("Failed to resolve promoter by user")?;
        if let Some(promoter_id) = by_user {
            return Ok((Some(promoter_id), Some(code.to_string())));
        }
    }

    // Unknown codes are stored verbatim; attribution is best-effort.
    Ok((None, Some(code.to_string())))
}

async fn resolve_attendee(
    conn: &mut diesel_async::AsyncPgConnection,
    identity: &Identity,
    guest_email: &str,
) -> Result<Option<Uuid>, AppError> {
    if let Some(user) = &identity.0 {
        let linked: Option<Uuid> = attendees::table
            .filter(attendees::user_id.eq(user.id))
            .select(attendees::id)
            .first(conn)
            .await
            .optional()
            .context("Failed to resolve attendee by user")?;
        if linked.is_some() {
            return Ok(linked);
        }
    }

    attendees::table
        .filter(attendees::email.eq(guest_email))
        .select(attendees::id)
        .first(conn)
        .await
        .optional()
        .context("Failed to resolve attendee by email")
        .map_err(AppError::from)
}

#[derive(Serialize, ToSchema)]
pub struct BookingPaymentView {
    pub status: String,
    pub payment_url: Option<String>,
    pub amount: f32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Read-side payment expiry: a pending session past its deadline renders
/// as expired and loses its payment URL. No background sweep exists.
fn payment_view(transaction: &PaymentTransactionEntity, now: DateTime<Utc>) -> BookingPaymentView {
    let expired = transaction.status == "pending"
        && transaction.expires_at.is_some_and(|deadline| deadline <= now);
    BookingPaymentView {
        status: if expired {
            "expired".into()
        } else {
            transaction.status.clone()
        },
        payment_url: if !expired && transaction.status == "pending" {
            transaction.payment_url.clone()
        } else {
            None
        },
        amount: transaction.amount,
        expires_at: transaction.expires_at,
    }
}

#[derive(Serialize, ToSchema)]
pub struct GetBookingRes {
    pub booking: TableBookingEntity,
    pub event: EventEntity,
    pub party: Option<party::PartyView>,
    pub payment: Option<BookingPaymentView>,
}

/// Fetch a booking with its party roster and payment state.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Bookings"],
    params(
        ("id" = Uuid, Path, description = "Booking ID to fetch")
    ),
    responses(
        (status = 200, description = "Get booking successfully", body = StdResponse<GetBookingRes, String>),
        (status = 404, description = "Booking not found")
    )
)]
async fn get_booking(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let booking: TableBookingEntity = table_bookings::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    let event: EventEntity = events::table
        .find(booking.event_id)
        .get_result(conn)
        .await
        .context("Failed to load event for booking")?;

    // Read-time reconciliation keeps the roster and pass current.
    let party = party::materialize_party(
        conn,
        &state.passes,
        &state.config.urls.app_base_url,
        &booking,
    )
    .await
    .context("Failed to materialize party")?;

    let payment = match booking.payment_transaction_id {
        Some(transaction_id) => payment_transactions::table
            .find(transaction_id)
            .get_result::<PaymentTransactionEntity>(conn)
            .await
            .optional()
            .context("Failed to load payment transaction")?
            .map(|transaction| payment_view(&transaction, Utc::now())),
        None => None,
    };

    Ok(StdResponse {
        data: Some(GetBookingRes {
            booking,
            event,
            party,
            payment,
        }),
        message: Some("Get booking successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
        table_id: Option<Uuid>,
    ) -> BookingLinkEntity {
        BookingLinkEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            table_id,
            code: "party-time".into(),
            is_active,
            expires_at,
            created_at: Utc::now(),
        }
    }

    fn req(table_id: Option<Uuid>) -> SubmitBookingReq {
        SubmitBookingReq {
            event_id: Uuid::new_v4(),
            table_id,
            guest_name: Some("Ada".into()),
            guest_email: Some("Ada@Example.com".into()),
            guest_whatsapp: Some("+34600000000".into()),
            special_requests: None,
            ref_code: None,
            link_code: None,
        }
    }

    #[test]
    fn validation_requires_all_guest_fields() {
        assert!(matches!(
            validate(&req(None)),
            Err(AppError::Validation(_))
        ));

        let mut missing_email = req(Some(Uuid::new_v4()));
        missing_email.guest_email = Some("   ".into());
        assert!(matches!(
            validate(&missing_email),
            Err(AppError::Validation(_))
        ));

        let mut bad_email = req(Some(Uuid::new_v4()));
        bad_email.guest_email = Some("not-an-email".into());
        assert!(matches!(validate(&bad_email), Err(AppError::Validation(_))));
    }

    #[test]
    fn validation_normalizes_the_email() {
        let input = validate(&req(Some(Uuid::new_v4()))).unwrap();
        assert_eq!(input.guest_email, "ada@example.com");
    }

    #[test]
    fn disabled_mode_rejects_without_a_link() {
        let err = check_admission("disabled", None, None, Uuid::new_v4(), Utc::now());
        assert!(matches!(err, Err(AppError::InvalidState(_))));
    }

    #[test]
    fn promoter_only_requires_a_ref_code() {
        let table_id = Uuid::new_v4();
        assert!(matches!(
            check_admission("promoter_only", None, None, table_id, Utc::now()),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            check_admission("promoter_only", Some("  "), None, table_id, Utc::now()),
            Err(AppError::InvalidState(_))
        ));
        assert!(check_admission("promoter_only", Some("abc"), None, table_id, Utc::now()).is_ok());
    }

    #[test]
    fn valid_link_bypasses_the_booking_mode() {
        let table_id = Uuid::new_v4();
        let link = link(true, None, None);
        assert!(check_admission("disabled", None, Some(&link), table_id, Utc::now()).is_ok());
    }

    #[test]
    fn dead_links_are_gone() {
        let table_id = Uuid::new_v4();
        let inactive = link(false, None, None);
        assert!(matches!(
            check_admission("open", None, Some(&inactive), table_id, Utc::now()),
            Err(AppError::Gone(_))
        ));

        let expired = link(true, Some(Utc::now() - chrono::Duration::hours(1)), None);
        assert!(matches!(
            check_admission("open", None, Some(&expired), table_id, Utc::now()),
            Err(AppError::Gone(_))
        ));
    }

    #[test]
    fn pinned_link_must_match_the_table() {
        let table_id = Uuid::new_v4();
        let pinned = link(true, None, Some(Uuid::new_v4()));
        assert!(matches!(
            check_admission("open", None, Some(&pinned), table_id, Utc::now()),
            Err(AppError::InvalidState(_))
        ));

        let matching = link(true, None, Some(table_id));
        assert!(check_admission("open", None, Some(&matching), table_id, Utc::now()).is_ok());
    }

    #[test]
    fn duplicate_wording_depends_on_prior_status() {
        assert!(duplicate_message("confirmed").contains("confirmed"));
        assert!(duplicate_message("pending").contains("pending"));
        assert_ne!(duplicate_message("confirmed"), duplicate_message("pending"));
    }

    fn transaction(
        status: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> PaymentTransactionEntity {
        PaymentTransactionEntity {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            reference_type: "table_booking".into(),
            reference_id: Uuid::new_v4(),
            amount: 50.0,
            currency: "EUR".into(),
            invoice_number: "TB-TEST".into(),
            payment_url: Some("https://pay.example/x".into()),
            status: status.into(),
            expires_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_payment_keeps_its_url_until_the_deadline() {
        let now = Utc::now();
        let live = payment_view(&transaction("pending", Some(now + chrono::Duration::hours(1))), now);
        assert_eq!(live.status, "pending");
        assert!(live.payment_url.is_some());
    }

    #[test]
    fn stale_pending_payment_renders_expired_without_a_url() {
        let now = Utc::now();
        let stale = payment_view(&transaction("pending", Some(now - chrono::Duration::hours(1))), now);
        assert_eq!(stale.status, "expired");
        assert!(stale.payment_url.is_none());
    }

    #[test]
    fn settled_payment_is_passed_through() {
        let paid = payment_view(&transaction("paid", None), Utc::now());
        assert_eq!(paid.status, "paid");
        assert!(paid.payment_url.is_none());
    }
}
