//! Effective table availability for an event.
//!
//! Venue tables carry venue-wide defaults; an event may layer a
//! per-(event, table) override on top. An override field only wins when it
//! is explicitly set.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{EventTableAvailabilityEntity, VenueTableEntity};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EffectiveAvailability {
    pub capacity: i32,
    pub minimum_spend: f32,
    pub deposit: f32,
    pub is_available: bool,
    /// Guests do not choose their party size; the table dictates it.
    pub party_size: i32,
}

pub fn resolve(
    table: &VenueTableEntity,
    override_row: Option<&EventTableAvailabilityEntity>,
) -> EffectiveAvailability {
    let capacity = override_row
        .and_then(|row| row.capacity)
        .unwrap_or(table.capacity);
    let minimum_spend = override_row
        .and_then(|row| row.minimum_spend)
        .unwrap_or(table.minimum_spend);
    let deposit = override_row
        .and_then(|row| row.deposit_amount)
        .unwrap_or(table.deposit_amount);
    // Only an explicit `is_available = false` blocks the table.
    let is_available = override_row.and_then(|row| row.is_available) != Some(false);

    EffectiveAvailability {
        capacity,
        minimum_spend,
        deposit,
        is_available,
        party_size: capacity,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn table(capacity: i32, minimum_spend: f32, deposit: f32) -> VenueTableEntity {
        VenueTableEntity {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            zone: Some("VIP".into()),
            name: "Table 1".into(),
            capacity,
            minimum_spend,
            deposit_amount: deposit,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn override_row(
        is_available: Option<bool>,
        minimum_spend: Option<f32>,
        deposit: Option<f32>,
        capacity: Option<i32>,
    ) -> EventTableAvailabilityEntity {
        EventTableAvailabilityEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            table_id: Uuid::new_v4(),
            is_available,
            minimum_spend,
            deposit_amount: deposit,
            capacity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn no_override_uses_table_defaults() {
        let resolved = resolve(&table(8, 500.0, 50.0), None);
        assert_eq!(resolved.capacity, 8);
        assert_eq!(resolved.minimum_spend, 500.0);
        assert_eq!(resolved.deposit, 50.0);
        assert!(resolved.is_available);
        assert_eq!(resolved.party_size, 8);
    }

    #[test]
    fn explicit_override_wins_per_field() {
        let row = override_row(None, Some(750.0), None, Some(10));
        let resolved = resolve(&table(8, 500.0, 50.0), Some(&row));
        assert_eq!(resolved.minimum_spend, 750.0);
        assert_eq!(resolved.capacity, 10);
        // Unset fields fall back to the table.
        assert_eq!(resolved.deposit, 50.0);
        assert_eq!(resolved.party_size, 10);
    }

    #[test]
    fn override_row_without_flag_is_still_available() {
        let row = override_row(None, None, None, None);
        assert!(resolve(&table(8, 500.0, 50.0), Some(&row)).is_available);
    }

    #[test]
    fn only_explicit_false_blocks_the_table() {
        let blocked = override_row(Some(false), None, None, None);
        assert!(!resolve(&table(8, 500.0, 50.0), Some(&blocked)).is_available);

        let open = override_row(Some(true), None, None, None);
        assert!(resolve(&table(8, 500.0, 50.0), Some(&open)).is_available);
    }
}
