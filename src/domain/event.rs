//! Reservable events and their denormalized attendee count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EventId;

/// How an event charges attendees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    /// No fee.
    Free,
    /// Fee collected online at reservation time.
    Online,
    /// Fee collected at the door.
    Door,
}

impl PricingType {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Online => "online",
            Self::Door => "door",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "free" => Some(Self::Free),
            "online" => Some(Self::Online),
            "door" => Some(Self::Door),
            _ => None,
        }
    }

    /// Returns `true` if a payment context must accompany a reservation.
    #[must_use]
    pub const fn requires_payment(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// An event hosted on the marketplace.
///
/// `attendee_count` is a cache of the summed `attendee_count` of all active
/// reservations. It is maintained by read-modify-write and can drift; see
/// [`crate::service::ReservationService::recount_attendees`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Host user identifier.
    pub host_id: String,
    /// Host display name, exposed on tickets.
    pub host_name: String,
    /// Event title.
    pub title: String,
    /// Scheduled start.
    pub starts_at: DateTime<Utc>,
    /// Maximum number of attendees, if limited.
    pub capacity: Option<u32>,
    /// Denormalized attendee count.
    pub attendee_count: i64,
    /// Pricing model.
    pub pricing_type: PricingType,
    /// Fee per attendee in the smallest currency unit.
    pub fee_amount: Option<i64>,
    /// ISO-4217 currency code for `fee_amount`.
    pub currency: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Seats still available according to the cached count, or `None` if
    /// the event has no capacity limit.
    #[must_use]
    pub fn remaining_capacity(&self) -> Option<i64> {
        self.capacity
            .map(|cap| (i64::from(cap) - self.attendee_count).max(0))
    }

    /// Total fee for `attendees` seats, if the event charges one.
    #[must_use]
    pub fn total_fee(&self, attendees: u32) -> Option<i64> {
        match self.pricing_type {
            PricingType::Free => None,
            PricingType::Online | PricingType::Door => self
                .fee_amount
                .map(|fee| fee.saturating_mul(i64::from(attendees))),
        }
    }
}
