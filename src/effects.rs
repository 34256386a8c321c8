//! Post-commit side effects of a first-time check-in.
//!
//! Each effect is isolated: a failure is logged and never aborts the
//! check-in, rolls anything back, or blocks the remaining effects.
//! Duplicates never reach this module.

use anyhow::{Context, Result};
use diesel::{
    ExpressionMethods, NullableExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
};
use diesel_async::RunQueryDsl;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::{
    api,
    core::{app_state::AppState, outbox},
    events::GuestCheckedInEvent,
    models::{
        AttendeeEntity, CheckinEntity, CreateActivityLogEntity, CreateXpTransactionEntity,
        EventEntity, PromoterEntity, RegistrationEntity, TableBookingEntity,
    },
    schema::{
        activity_log, checkins, promoters, registrations, table_bookings, table_party_guests,
        xp_transactions,
    },
};

pub struct CheckinContext<'a> {
    pub event: &'a EventEntity,
    pub registration: &'a RegistrationEntity,
    pub attendee: &'a AttendeeEntity,
    pub checkin: &'a CheckinEntity,
    pub checked_in_by: Uuid,
}

pub async fn run_post_checkin(state: &AppState, ctx: &CheckinContext<'_>) {
    if let Err(err) = log_activity(state, ctx).await {
        warn!("Check-in activity log failed: {err:#}");
    }
    if let Err(err) = award_xp(state, ctx).await {
        warn!("Check-in XP award failed: {err:#}");
    }
    if let Err(err) = notify_promoter_bonus(state, ctx).await {
        warn!("Promoter bonus check failed: {err:#}");
    }
    if let Err(err) = emit_outbox(state, ctx).await {
        warn!("Check-in outbox emit failed: {err:#}");
    }
    if let Err(err) = track_analytics(state, ctx).await {
        warn!("Check-in analytics failed: {err:#}");
    }
}

async fn log_activity(state: &AppState, ctx: &CheckinContext<'_>) -> Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    diesel::insert_into(activity_log::table)
        .values(CreateActivityLogEntity {
            user_id: Some(ctx.checked_in_by),
            action: "event_checkin".into(),
            metadata: Some(json!({
                "event_id": ctx.event.id,
                "registration_id": ctx.registration.id,
                "attendee_id": ctx.attendee.id,
            })),
        })
        .execute(conn)
        .await
        .context("Failed to insert activity log entry")?;
    Ok(())
}

async fn award_xp(state: &AppState, ctx: &CheckinContext<'_>) -> Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    let amount = state.config.checkin.xp_award;

    let awarded = diesel::sql_query("SELECT award_attendee_xp($1, $2)")
        .bind::<diesel::sql_types::Uuid, _>(ctx.attendee.id)
        .bind::<diesel::sql_types::Integer, _>(amount)
        .execute(conn)
        .await;

    if let Err(err) = awarded {
        // Databases that predate the function still get a ledger entry.
        warn!("award_attendee_xp unavailable, falling back to ledger insert: {err}");
        diesel::insert_into(xp_transactions::table)
            .values(CreateXpTransactionEntity {
                attendee_id: ctx.attendee.id,
                amount,
                reason: "event_checkin".into(),
            })
            .execute(conn)
            .await
            .context("Failed to insert XP ledger entry")?;
    }
    Ok(())
}

pub(crate) fn bonus_reached(count: i64, threshold: i64) -> bool {
    threshold > 0 && count == threshold
}

async fn notify_promoter_bonus(state: &AppState, ctx: &CheckinContext<'_>) -> Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    // Which booking brought this attendee in, and through which promoter?
    let booking: Option<TableBookingEntity> = table_bookings::table
        .inner_join(table_party_guests::table)
        .filter(table_party_guests::attendee_id.eq(ctx.attendee.id))
        .filter(table_bookings::event_id.eq(ctx.event.id))
        .filter(table_bookings::promoter_id.is_not_null())
        .select(TableBookingEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up attributed booking")?;
    let Some(promoter_id) = booking.and_then(|booking| booking.promoter_id) else {
        return Ok(());
    };

    let attributed_attendees = table_party_guests::table
        .inner_join(table_bookings::table)
        .filter(table_bookings::promoter_id.eq(promoter_id))
        .filter(table_bookings::event_id.eq(ctx.event.id))
        .filter(table_party_guests::attendee_id.is_not_null())
        .select(table_party_guests::attendee_id.assume_not_null());

    let count: i64 = checkins::table
        .inner_join(registrations::table)
        .filter(registrations::event_id.eq(ctx.event.id))
        .filter(registrations::attendee_id.eq_any(attributed_attendees))
        .filter(checkins::undone_at.is_null())
        .count()
        .get_result(conn)
        .await
        .context("Failed to count attributed check-ins")?;

    let threshold = state.config.checkin.promoter_bonus_threshold;
    if !bonus_reached(count, threshold) {
        return Ok(());
    }

    let promoter: PromoterEntity = promoters::table
        .find(promoter_id)
        .get_result(conn)
        .await
        .context("Failed to load promoter")?;
    let Some(user_id) = promoter.user_id else {
        return Ok(());
    };

    api::notifications::notify(
        state.http_client.clone(),
        &api::notifications::Notification {
            user_id,
            kind: "promoter_bonus_progress".into(),
            title: "Bonus progress".into(),
            message: format!(
                "{} of your guests have checked in to {}",
                count, ctx.event.name
            ),
            link: Some(format!(
                "{}/promoter/events/{}",
                state.config.urls.app_base_url, ctx.event.id
            )),
            metadata: Some(json!({ "event_id": ctx.event.id, "checkins": count })),
        },
    )
    .await
}

async fn emit_outbox(state: &AppState, ctx: &CheckinContext<'_>) -> Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    outbox::publish(
        conn,
        "checkins.guest_checked_in".into(),
        GuestCheckedInEvent {
            registration_id: ctx.registration.id,
            event_id: ctx.event.id,
            attendee_id: ctx.attendee.id,
            checked_in_by: ctx.checked_in_by,
        },
    )
    .await
}

async fn track_analytics(state: &AppState, ctx: &CheckinContext<'_>) -> Result<()> {
    api::analytics::track(
        state.http_client.clone(),
        "event_checkin",
        json!({
            "event_id": ctx.event.id,
            "attendee_id": ctx.attendee.id,
            "checked_in_by": ctx.checked_in_by,
            "checked_in_at": ctx.checkin.checked_in_at,
        }),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonus_fires_exactly_on_the_threshold() {
        assert!(!bonus_reached(9, 10));
        assert!(bonus_reached(10, 10));
        // Crossing happened earlier; do not renotify.
        assert!(!bonus_reached(11, 10));
    }

    #[test]
    fn bonus_never_fires_when_disabled() {
        assert!(!bonus_reached(0, 0));
        assert!(!bonus_reached(5, 0));
    }
}
