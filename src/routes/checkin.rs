use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    result::DatabaseErrorKind,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CurrentUser},
    },
    effects,
    models::{
        AttendeeEntity, CheckinEntity, CreateCheckinEntity, EventEntity, RegistrationEntity,
    },
    passes::PassCodec,
    schema::{
        attendees, checkins, event_door_staff, events, registrations, table_bookings,
        table_party_guests, venue_members,
    },
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/events",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(check_in))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Deserialize, ToSchema)]
pub struct CheckinReq {
    pub qr_token: Option<String>,
    pub registration_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckinRes {
    pub checkin: CheckinEntity,
    pub duplicate: bool,
    pub attendee: AttendeeEntity,
}

/// Resolves the registration to check in from exactly one of the two
/// accepted credentials.
fn resolve_registration_id(
    passes: &PassCodec,
    event: &EventEntity,
    body: &CheckinReq,
) -> Result<Uuid, AppError> {
    match (&body.qr_token, body.registration_id) {
        (Some(_), Some(_)) => Err(AppError::Validation(
            "Provide either qr_token or registration_id, not both".into(),
        )),
        (None, None) => Err(AppError::Validation(
            "Provide qr_token or registration_id".into(),
        )),
        (Some(token), None) => {
            let claims = passes
                .verify(token)
                .map_err(|err| AppError::Validation(format!("Pass rejected: {err}")))?;
            if claims.event_id != event.id {
                return Err(AppError::InvalidState(
                    "This pass belongs to a different event".into(),
                ));
            }
            Ok(claims.registration_id)
        }
        (None, Some(id)) => Ok(id),
    }
}

/// Door authorization, first match wins: platform roles, then venue or
/// organizer linkage, then an explicit per-event assignment.
async fn authorize(
    conn: &mut diesel_async::AsyncPgConnection,
    user: &CurrentUser,
    event: &EventEntity,
) -> Result<(), AppError> {
    if user.role == "superadmin" || user.role == "door_staff" {
        return Ok(());
    }

    if user.role == "venue_admin" || user.role == "event_organizer" {
        if event.created_by == Some(user.id) {
            return Ok(());
        }
        if let Some(venue_id) = event.venue_id {
            let membership: i64 = venue_members::table
                .filter(venue_members::venue_id.eq(venue_id))
                .filter(venue_members::user_id.eq(user.id))
                .filter(venue_members::is_active.eq(true))
                .count()
                .get_result(conn)
                .await
                .context("Failed to check venue membership")?;
            if membership > 0 {
                return Ok(());
            }
        }
    }

    let assigned: i64 = event_door_staff::table
        .filter(event_door_staff::event_id.eq(event.id))
        .filter(event_door_staff::user_id.eq(user.id))
        .filter(event_door_staff::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check door staff assignment")?;
    if assigned > 0 {
        return Ok(());
    }

    Err(AppError::Forbidden(
        "You are not allowed to check guests in to this event".into(),
    ))
}

/// Check a guest in by QR pass or registration id. Idempotent: repeated
/// or concurrent scans of the same registration return the original
/// check-in with `duplicate: true` and trigger no side effects.
#[utoipa::path(
    post,
    path = "/{id}/checkin",
    tags = ["Check-in"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Event ID")
    ),
    request_body = CheckinReq,
    responses(
        (status = 200, description = "Checked in, or already checked in", body = StdResponse<CheckinRes, String>),
        (status = 400, description = "Invalid pass or request"),
        (status = 401, description = "No identity"),
        (status = 403, description = "Not authorized for this event"),
        (status = 404, description = "Event or registration not found")
    )
)]
async fn check_in(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CheckinReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let event: EventEntity = events::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;

    authorize(conn, &user, &event).await?;

    let registration_id = resolve_registration_id(&state.passes, &event, &body)?;

    let registration: RegistrationEntity = registrations::table
        .find(registration_id)
        .get_result(conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        })?;
    if registration.event_id != event.id {
        return Err(AppError::InvalidState(
            "Registration does not belong to this event".into(),
        ));
    }

    let attendee: AttendeeEntity = attendees::table
        .find(registration.attendee_id)
        .get_result(conn)
        .await
        .context("Failed to load attendee")?;

    // Fast path: already checked in.
    let existing: Option<CheckinEntity> = checkins::table
        .filter(checkins::registration_id.eq(registration.id))
        .first(conn)
        .await
        .optional()
        .context("Failed to look up existing check-in")?;
    if let Some(existing) = existing {
        return Ok(StdResponse {
            data: Some(CheckinRes {
                checkin: existing,
                duplicate: true,
                attendee,
            }),
            message: Some("Guest is already checked in"),
        });
    }

    let inserted: Result<CheckinEntity, DieselError> = diesel::insert_into(checkins::table)
        .values(CreateCheckinEntity {
            registration_id: registration.id,
            checked_in_by: user.id,
        })
        .returning(CheckinEntity::as_returning())
        .get_result(conn)
        .await;

    let checkin = match inserted {
        Ok(checkin) => checkin,
        // Lost the race to a concurrent scan; the winner's row is the result.
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            let winner: CheckinEntity = checkins::table
                .filter(checkins::registration_id.eq(registration.id))
                .first(conn)
                .await
                .context("Failed to load winning check-in")?;
            return Ok(StdResponse {
                data: Some(CheckinRes {
                    checkin: winner,
                    duplicate: true,
                    attendee,
                }),
                message: Some("Guest is already checked in"),
            });
        }
        Err(err) => return Err(AppError::Other(err.into())),
    };

    // First-time bookkeeping on the registration and the party roster.
    diesel::update(registrations::table.find(registration.id))
        .set(registrations::checked_in_at.eq(checkin.checked_in_at))
        .execute(conn)
        .await
        .context("Failed to stamp registration check-in time")?;

    let event_booking_ids = table_bookings::table
        .filter(table_bookings::event_id.eq(event.id))
        .select(table_bookings::id);
    diesel::update(
        table_party_guests::table
            .filter(table_party_guests::attendee_id.eq(attendee.id))
            .filter(table_party_guests::booking_id.eq_any(event_booking_ids)),
    )
    .set((
        table_party_guests::checked_in.eq(true),
        table_party_guests::updated_at.eq(diesel::dsl::now),
    ))
    .execute(conn)
    .await
    .context("Failed to flag party guest as checked in")?;

    effects::run_post_checkin(
        &state,
        &effects::CheckinContext {
            event: &event,
            registration: &registration,
            attendee: &attendee,
            checkin: &checkin,
            checked_in_by: user.id,
        },
    )
    .await;

    Ok(StdResponse {
        data: Some(CheckinRes {
            checkin,
            duplicate: false,
            attendee,
        }),
        message: Some("Checked in successfully"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::core::config::PassConfig;

    use super::*;

    fn codec() -> PassCodec {
        PassCodec::new(&PassConfig {
            secret: "test-secret".into(),
            ttl_hours: 72,
        })
    }

    fn event(id: Uuid) -> EventEntity {
        EventEntity {
            id,
            venue_id: Some(Uuid::new_v4()),
            created_by: None,
            name: "Opening Night".into(),
            starts_at: Utc::now(),
            ends_at: Utc::now(),
            status: "published".into(),
            table_booking_mode: "open".into(),
            currency: "EUR".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_zero_or_two_credentials() {
        let passes = codec();
        let event = event(Uuid::new_v4());

        let neither = CheckinReq {
            qr_token: None,
            registration_id: None,
        };
        assert!(matches!(
            resolve_registration_id(&passes, &event, &neither),
            Err(AppError::Validation(_))
        ));

        let both = CheckinReq {
            qr_token: Some("x".into()),
            registration_id: Some(Uuid::new_v4()),
        };
        assert!(matches!(
            resolve_registration_id(&passes, &event, &both),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn raw_registration_id_passes_through() {
        let passes = codec();
        let event = event(Uuid::new_v4());
        let registration_id = Uuid::new_v4();
        let body = CheckinReq {
            qr_token: None,
            registration_id: Some(registration_id),
        };
        assert_eq!(
            resolve_registration_id(&passes, &event, &body).unwrap(),
            registration_id
        );
    }

    #[test]
    fn valid_pass_resolves_its_registration() {
        let passes = codec();
        let event_id = Uuid::new_v4();
        let registration_id = Uuid::new_v4();
        let token = passes
            .mint(registration_id, event_id, Uuid::new_v4())
            .unwrap();

        let body = CheckinReq {
            qr_token: Some(token),
            registration_id: None,
        };
        assert_eq!(
            resolve_registration_id(&passes, &event(event_id), &body).unwrap(),
            registration_id
        );
    }

    #[test]
    fn pass_for_another_event_is_rejected() {
        let passes = codec();
        let token = passes
            .mint(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        let body = CheckinReq {
            qr_token: Some(token),
            registration_id: None,
        };
        assert!(matches!(
            resolve_registration_id(&passes, &event(Uuid::new_v4()), &body),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn tampered_pass_is_rejected() {
        let passes = codec();
        let event = event(Uuid::new_v4());
        let body = CheckinReq {
            qr_token: Some("definitely-not-a-pass".into()),
            registration_id: None,
        };
        assert!(matches!(
            resolve_registration_id(&passes, &event, &body),
            Err(AppError::Validation(_))
        ));
    }
}
