use std::sync::Arc;

use anyhow::Result;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use futures::future::BoxFuture;
use lapin::{message::Delivery, options::BasicAckOptions};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    api,
    core::{aliases::DieselError, app_state::AppState, outbox},
    events::{BookingConfirmedEvent, PaymentCompletedEvent, PaymentFailedEvent},
    models::{PaymentTransactionEntity, TableBookingEntity},
    party,
    schema::{payment_transactions, table_bookings},
};

/// A deposit was paid: settle the transaction, confirm the booking and
/// reconcile its party so passes are ready before the host opens the page.
pub fn payment_completed(
    delivery: Delivery,
    state: Arc<AppState>,
) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let conn = &mut state.db_pool.get().await?;
        let payload: PaymentCompletedEvent = serde_json::from_str(str::from_utf8(&delivery.data)?)?;
        info!("Received event: {:?}", payload);

        let settled = diesel::update(
            payment_transactions::table
                .find(payload.payment_id)
                .filter(payment_transactions::status.eq("pending")),
        )
        .set((
            payment_transactions::status.eq("paid"),
            payment_transactions::updated_at.eq(diesel::dsl::now),
        ))
        .returning(PaymentTransactionEntity::as_returning())
        .get_result(conn)
        .await;

        let transaction = match settled {
            Ok(transaction) => transaction,
            Err(DieselError::NotFound) => {
                info!("Payment {} already settled, skipping", payload.payment_id);
                delivery.ack(BasicAckOptions::default()).await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let confirmed = diesel::update(table_bookings::table.find(transaction.reference_id))
            .set((
                table_bookings::status.eq("confirmed"),
                table_bookings::payment_status.eq("paid"),
                table_bookings::updated_at.eq(diesel::dsl::now),
            ))
            .returning(TableBookingEntity::as_returning())
            .get_result(conn)
            .await;

        let booking: TableBookingEntity = match confirmed {
            Ok(booking) => booking,
            Err(DieselError::NotFound) => {
                warn!(
                    "Payment {} references missing booking {}",
                    transaction.id, transaction.reference_id
                );
                delivery.ack(BasicAckOptions::default()).await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if let Err(err) = party::materialize_party(
            conn,
            &state.passes,
            &state.config.urls.app_base_url,
            &booking,
        )
        .await
        {
            warn!(
                "Party reconciliation failed for booking {}: {err:#}",
                booking.id
            );
        }

        if let Err(err) = api::emails::send_template(
            state.http_client.clone(),
            "table-booking-confirmed",
            &booking.guest_email,
            booking.attendee_id,
            json!({
                "guest_name": booking.guest_name,
                "booking_id": booking.id,
                "deposit": transaction.amount,
            }),
        )
        .await
        {
            warn!("Confirmation email failed for booking {}: {err:#}", booking.id);
        }

        outbox::publish(
            conn,
            "bookings.booking_confirmed".into(),
            BookingConfirmedEvent {
                booking_id: booking.id,
                event_id: booking.event_id,
                payment_transaction_id: transaction.id,
            },
        )
        .await?;

        info!(
            "Booking {} confirmed after payment {}",
            booking.id, transaction.id
        );

        delivery.ack(BasicAckOptions::default()).await?;

        Ok(())
    })
}

/// A deposit attempt failed: flag the transaction and booking. The booking
/// stays pending and payable through a fresh session.
pub fn payment_failed(delivery: Delivery, state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let conn = &mut state.db_pool.get().await?;
        let payload: PaymentFailedEvent = serde_json::from_str(str::from_utf8(&delivery.data)?)?;
        info!("Received event: {:?}", payload);

        let failed = diesel::update(
            payment_transactions::table
                .find(payload.payment_id)
                .filter(payment_transactions::status.eq("pending")),
        )
        .set((
            payment_transactions::status.eq("failed"),
            payment_transactions::updated_at.eq(diesel::dsl::now),
        ))
        .returning(PaymentTransactionEntity::as_returning())
        .get_result(conn)
        .await;

        match failed {
            Ok(transaction) => {
                diesel::update(table_bookings::table.find(transaction.reference_id))
                    .filter(table_bookings::payment_status.eq("pending"))
                    .set((
                        table_bookings::payment_status.eq("failed"),
                        table_bookings::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await?;

                info!(
                    "Payment {} failed for booking {}",
                    transaction.id, transaction.reference_id
                );
            }
            Err(DieselError::NotFound) => {
                info!("Payment {} already settled, skipping", payload.payment_id);
            }
            Err(err) => return Err(err.into()),
        }

        delivery.ack(BasicAckOptions::default()).await?;

        Ok(())
    })
}
