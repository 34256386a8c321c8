//! Payment session bridge.
//!
//! Opens a gateway checkout session for a booking deposit and tracks the
//! local payment-transaction record. A missing or broken gateway never
//! fails the parent booking; the table stays reserved and payable later.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    api::payment_gateway::{self, CheckoutCustomer, CheckoutLineItem, CheckoutRequest},
    core::app_state::AppState,
    models::{
        CreatePaymentTransactionEntity, EventEntity, PaymentTransactionEntity,
        TableBookingEntity, VenuePaymentSettingsEntity,
    },
    schema::{payment_transactions, table_bookings, venue_payment_settings},
};

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct PaymentInfo {
    pub payment_url: String,
    pub invoice_number: String,
    pub amount: f32,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
}

/// Opens a checkout session for a booking deposit. Returns `None` when the
/// venue has no usable gateway configuration or the gateway declines.
pub async fn open_session(
    state: &AppState,
    conn: &mut AsyncPgConnection,
    booking: &TableBookingEntity,
    event: &EventEntity,
    amount: f32,
) -> Result<Option<PaymentInfo>> {
    let Some(venue_id) = event.venue_id else {
        return Ok(None);
    };

    let settings: Option<VenuePaymentSettingsEntity> = venue_payment_settings::table
        .find(venue_id)
        .get_result(conn)
        .await
        .optional()
        .context("Failed to load venue payment settings")?;
    let Some(settings) = settings else {
        return Ok(None);
    };
    if !settings.is_enabled {
        return Ok(None);
    }
    let Some(api_key) = settings.api_key.filter(|key| !key.is_empty()) else {
        return Ok(None);
    };

    let invoice_number = invoice_number(booking.id);
    let base = &state.config.urls.app_base_url;
    let request = CheckoutRequest {
        amount,
        currency: event.currency.clone(),
        invoice_number: invoice_number.clone(),
        success_url: format!("{}/bookings/{}?payment=success", base, booking.id),
        cancel_url: format!("{}/bookings/{}?payment=cancelled", base, booking.id),
        line_items: vec![CheckoutLineItem {
            label: format!("Table deposit for {}", event.name),
            amount,
            quantity: 1,
        }],
        customer: CheckoutCustomer {
            name: booking.guest_name.clone(),
            email: booking.guest_email.clone(),
            phone: Some(booking.guest_whatsapp.clone()),
        },
    };

    let session = match payment_gateway::create_checkout(
        state.http_client.clone(),
        &api_key,
        &request,
    )
    .await
    {
        Ok(response) if response.success => response,
        Ok(_) => {
            tracing::warn!("Payment gateway declined checkout for booking {}", booking.id);
            return Ok(None);
        }
        Err(err) => {
            tracing::warn!(
                "Payment gateway call failed for booking {}: {err:#}",
                booking.id
            );
            return Ok(None);
        }
    };
    let Some(payment_url) = session.payment_url else {
        tracing::warn!(
            "Payment gateway returned no payment URL for booking {}",
            booking.id
        );
        return Ok(None);
    };

    let expires_at = Utc::now() + Duration::hours(settings.payment_expiry_hours as i64);
    let transaction: PaymentTransactionEntity = diesel::insert_into(payment_transactions::table)
        .values(CreatePaymentTransactionEntity {
            venue_id,
            reference_type: "table_booking".into(),
            reference_id: booking.id,
            amount,
            currency: event.currency.clone(),
            invoice_number: invoice_number.clone(),
            payment_url: Some(payment_url.clone()),
            status: "pending".into(),
            expires_at: Some(expires_at),
        })
        .returning(PaymentTransactionEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create payment transaction")?;

    diesel::update(table_bookings::table.find(booking.id))
        .set((
            table_bookings::payment_transaction_id.eq(transaction.id),
            table_bookings::payment_status.eq("pending"),
            table_bookings::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .context("Failed to link payment transaction to booking")?;

    Ok(Some(PaymentInfo {
        payment_url,
        invoice_number,
        amount,
        currency: event.currency.clone(),
        expires_at,
    }))
}

fn invoice_number(booking_id: Uuid) -> String {
    let simple = booking_id.simple().to_string();
    format!("TB-{}", simple[..12].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_is_stable_and_short() {
        let id = Uuid::parse_str("a1b2c3d4-e5f6-4788-9a0b-c1d2e3f4a5b6").unwrap();
        let invoice = invoice_number(id);
        assert_eq!(invoice, "TB-A1B2C3D4E5F6");
        assert_eq!(invoice, invoice_number(id));
    }
}
