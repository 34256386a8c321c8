use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::QueryDsl;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    api,
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, Identity},
    },
    models::{EventEntity, TableBookingEntity, TablePartyGuestEntity},
    party,
    schema::{events, table_bookings},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/bookings",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_guests))
            .routes(utoipa_axum::routes!(add_guest))
            .routes(utoipa_axum::routes!(remove_guest))
            .route_layer(axum::middleware::from_fn(middleware::identity)),
    )
}

/// Host authorization input. The email parameter exists so shared booking
/// links keep working for hosts without an account.
#[derive(Deserialize, IntoParams)]
pub struct GuestQuery {
    pub email: Option<String>,
    pub guest_id: Option<Uuid>,
}

fn caller_email<'a>(identity: &'a Identity, query: &'a GuestQuery) -> Option<&'a str> {
    identity
        .0
        .as_ref()
        .map(|user| user.email.as_str())
        .or(query.email.as_deref())
}

async fn load_authorized_booking(
    conn: &mut diesel_async::AsyncPgConnection,
    booking_id: Uuid,
    identity: &Identity,
    query: &GuestQuery,
) -> Result<TableBookingEntity, AppError> {
    let booking: TableBookingEntity = table_bookings::table
        .find(booking_id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    let host = party::find_host(conn, booking.id).await?;
    party::authorize_host(caller_email(identity, query), &booking, host.as_ref())?;
    Ok(booking)
}

#[derive(Serialize, ToSchema)]
pub struct ListGuestsRes {
    pub guests: Vec<TablePartyGuestEntity>,
    pub summary: party::GuestSummary,
}

/// List the party roster for a booking.
#[utoipa::path(
    get,
    path = "/{id}/guests",
    tags = ["Party"],
    params(
        ("id" = Uuid, Path, description = "Booking ID"),
        GuestQuery
    ),
    responses(
        (status = 200, description = "Party roster", body = StdResponse<ListGuestsRes, String>),
        (status = 401, description = "No caller identity"),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Booking not found")
    )
)]
async fn list_guests(
    Path(id): Path<Uuid>,
    Query(query): Query<GuestQuery>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let booking = load_authorized_booking(conn, id, &identity, &query).await?;
    let guests = party::load_roster(conn, booking.id).await?;
    let summary = party::summarize(&guests);

    Ok(StdResponse {
        data: Some(ListGuestsRes { guests, summary }),
        message: Some("Get party roster successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
pub struct AddGuestReq {
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AddGuestRes {
    pub guest: TablePartyGuestEntity,
    pub join_url: String,
}

/// Add a guest to the party. Returns a shareable join link; no email is
/// sent on the guest's behalf.
#[utoipa::path(
    post,
    path = "/{id}/guests",
    tags = ["Party"],
    params(
        ("id" = Uuid, Path, description = "Booking ID"),
        GuestQuery
    ),
    request_body = AddGuestReq,
    responses(
        (status = 200, description = "Guest added", body = StdResponse<AddGuestRes, String>),
        (status = 400, description = "Invalid guest or booking state"),
        (status = 401, description = "No caller identity"),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Booking not found")
    )
)]
async fn add_guest(
    Path(id): Path<Uuid>,
    Query(query): Query<GuestQuery>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<AddGuestReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let booking = load_authorized_booking(conn, id, &identity, &query).await?;

    let guest_name = body
        .guest_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Validation("guest_name is required".into()))?;
    let guest_email = body
        .guest_email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::Validation("guest_email is required".into()))?;

    let outcome = party::add_guest(
        conn,
        &state.config.urls.app_base_url,
        &booking,
        guest_name,
        guest_email,
        body.guest_phone.clone(),
    )
    .await?;

    let message = if outcome.reinstated {
        "Guest re-invited to the party"
    } else {
        "Guest added to the party"
    };

    Ok(StdResponse {
        data: Some(AddGuestRes {
            guest: outcome.guest,
            join_url: outcome.join_url,
        }),
        message: Some(message),
    })
}

/// Remove a guest from the party. The host row is immutable.
#[utoipa::path(
    delete,
    path = "/{id}/guests",
    tags = ["Party"],
    params(
        ("id" = Uuid, Path, description = "Booking ID"),
        GuestQuery
    ),
    responses(
        (status = 200, description = "Guest removed", body = StdResponse<TablePartyGuestEntity, String>),
        (status = 400, description = "Target is the host or request invalid"),
        (status = 401, description = "No caller identity"),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Booking or guest not found")
    )
)]
async fn remove_guest(
    Path(id): Path<Uuid>,
    Query(query): Query<GuestQuery>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let booking = load_authorized_booking(conn, id, &identity, &query).await?;
    let guest_id = query
        .guest_id
        .ok_or_else(|| AppError::Validation("guest_id is required".into()))?;

    let removed = party::remove_guest(conn, &booking, guest_id).await?;

    // Best-effort notification; the removal stands either way.
    let event: Result<EventEntity, _> = events::table.find(booking.event_id).get_result(conn).await;
    if let Ok(event) = event {
        if let Err(err) = api::emails::send_template(
            state.http_client.clone(),
            "party-guest-removed",
            &removed.guest_email,
            removed.attendee_id,
            json!({
                "guest_name": removed.guest_name,
                "event_name": event.name,
                "host_name": booking.guest_name,
            }),
        )
        .await
        {
            warn!(
                "Removal email failed for guest {} on booking {}: {err:#}",
                removed.id, booking.id
            );
        }
    }

    Ok(StdResponse {
        data: Some(removed),
        message: Some("Guest removed from the party"),
    })
}
