use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl, prelude::{Insertable, Queryable}};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use lapin::{BasicProperties, Channel, options::BasicPublishOptions};
use serde::Serialize;

use crate::{core::app_state::AppState, schema::outbox};

#[derive(Insertable, Debug)]
#[diesel(table_name = outbox)]
struct NewOutboxEntry {
    event_type: String,
    payload: String,
    status: String,
}

#[derive(Queryable, Debug)]
struct OutboxEntry {
    id: i32,
    event_type: String,
    payload: String,
    #[allow(dead_code)]
    status: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

/// Stages a domain event in the outbox table. The relay task ships
/// pending entries to the message broker.
pub async fn publish<E: Serialize>(
    conn: &mut AsyncPgConnection,
    event_type: String,
    event: E,
) -> Result<()> {
    let payload = serde_json::to_string(&event).context("Failed to serialize outbox payload")?;
    diesel::insert_into(outbox::table)
        .values(NewOutboxEntry {
            event_type,
            payload,
            status: "PENDING".into(),
        })
        .execute(conn)
        .await
        .context("Failed to stage outbox entry")?;
    Ok(())
}

/// Ships pending outbox entries to the broker, oldest first. Runs for the
/// lifetime of the process; a failed pass is retried on the next tick.
pub async fn run_relay(state: Arc<AppState>, channel: Channel, exchange: String) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        if let Err(err) = relay_pending(&state, &channel, &exchange).await {
            tracing::warn!("Outbox relay pass failed: {err:#}");
        }
    }
}

async fn relay_pending(state: &AppState, channel: &Channel, exchange: &str) -> Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pending: Vec<OutboxEntry> = outbox::table
        .filter(outbox::status.eq("PENDING"))
        .order_by(outbox::created_at.asc())
        .limit(50)
        .get_results(conn)
        .await
        .context("Failed to load pending outbox entries")?;

    for entry in pending {
        channel
            .basic_publish(
                exchange,
                &entry.event_type,
                BasicPublishOptions::default(),
                entry.payload.as_bytes(),
                BasicProperties::default(),
            )
            .await
            .with_context(|| format!("Failed to publish outbox entry #{}", entry.id))?
            .await
            .with_context(|| format!("Broker did not confirm outbox entry #{}", entry.id))?;

        diesel::update(outbox::table.find(entry.id))
            .set((
                outbox::status.eq("SENT"),
                outbox::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await
            .with_context(|| format!("Failed to mark outbox entry #{} as sent", entry.id))?;
    }

    Ok(())
}
