//! Reservation documents: one user's claim on one event's capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, ReservationId, UserId};

/// Lifecycle state of a reservation. No other states exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// The reservation holds capacity.
    Reserved,
    /// The reservation was cancelled by its owner.
    Cancelled,
}

impl ReservationStatus {
    /// Returns the storage representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the storage representation of the status.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "reserved" => Some(Self::Reserved),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Payment details recorded for fee-bearing events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Payment method label (e.g. `"card"`).
    pub payment_method: Option<String>,
    /// Provider payment intent the charge was made against.
    pub payment_intent_id: Option<String>,
    /// Total charged, in the smallest currency unit.
    pub total_amount: Option<i64>,
    /// Provider subscription, when the reservation is part of one.
    pub subscription_id: Option<String>,
}

impl PaymentDetails {
    /// Returns `true` if no payment field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payment_method.is_none()
            && self.payment_intent_id.is_none()
            && self.total_amount.is_none()
            && self.subscription_id.is_none()
    }
}

/// A reservation as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Store-assigned identifier.
    pub id: ReservationId,
    /// Owner of the reservation.
    pub user_id: UserId,
    /// Event the reservation is held against.
    pub event_id: EventId,
    /// Current status.
    pub status: ReservationStatus,
    /// Creation timestamp.
    pub reserved_at: DateTime<Utc>,
    /// Set when the reservation transitions to `cancelled`.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Number of seats claimed. Always at least 1.
    pub attendee_count: u32,
    /// Payment fields, present only for paid events.
    pub payment: Option<PaymentDetails>,
    /// SHA-256 hex digest of the guest ticket token.
    #[serde(skip_serializing, default)]
    pub ticket_token_hash: String,
}

impl Reservation {
    /// Returns `true` if this reservation currently holds capacity.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Reserved
    }

    /// Returns `true` if this is an active reservation for `event_id`.
    #[must_use]
    pub fn is_active_for(&self, event_id: EventId) -> bool {
        self.event_id == event_id && self.is_active()
    }
}

/// Input for the reservation creation write. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewReservation {
    /// Owner of the reservation.
    pub user_id: UserId,
    /// Event to reserve against.
    pub event_id: EventId,
    /// Seats claimed.
    pub attendee_count: u32,
    /// Payment fields for paid events.
    pub payment: Option<PaymentDetails>,
    /// SHA-256 hex digest of the ticket token.
    pub ticket_token_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(status: ReservationStatus) -> Reservation {
        Reservation {
            id: ReservationId::new(),
            user_id: UserId::new("u1"),
            event_id: EventId::new(),
            status,
            reserved_at: Utc::now(),
            cancelled_at: None,
            attendee_count: 1,
            payment: None,
            ticket_token_hash: String::new(),
        }
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [ReservationStatus::Reserved, ReservationStatus::Cancelled] {
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReservationStatus::parse("pending"), None);
    }

    #[test]
    fn only_reserved_matching_event_is_active_for() {
        let active = reservation(ReservationStatus::Reserved);
        assert!(active.is_active_for(active.event_id));
        assert!(!active.is_active_for(EventId::new()));

        let cancelled = reservation(ReservationStatus::Cancelled);
        assert!(!cancelled.is_active_for(cancelled.event_id));
    }

    #[test]
    fn ticket_hash_is_never_serialized() {
        let mut r = reservation(ReservationStatus::Reserved);
        r.ticket_token_hash = "deadbeef".to_string();
        let json = serde_json::to_string(&r).unwrap_or_default();
        assert!(!json.contains("deadbeef"));
        assert!(json.contains("\"status\":\"reserved\""));
    }
}
