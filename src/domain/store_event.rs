//! Changefeed events emitted once a write is visible to list queries.
//!
//! Stores publish a [`StoreEvent`] through the [`super::EventBus`] at the
//! moment a write becomes observable through `list_reservations_for_user`.
//! The confirmation poller uses these to cut its waits short and
//! WebSocket clients receive them as push notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EventId, ReservationId, UserId};

/// Change notification for reservation and event documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A reservation became visible with status `reserved`.
    ReservationCreated {
        /// Reservation identifier.
        reservation_id: ReservationId,
        /// Owner.
        user_id: UserId,
        /// Reserved event.
        event_id: EventId,
        /// Seats claimed.
        attendee_count: u32,
        /// Visibility timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A reservation became visible with status `cancelled`.
    ReservationCancelled {
        /// Reservation identifier.
        reservation_id: ReservationId,
        /// Owner.
        user_id: UserId,
        /// Event the reservation was held against.
        event_id: EventId,
        /// Visibility timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The cached attendee count of an event changed.
    AttendeeCountChanged {
        /// Event identifier.
        event_id: EventId,
        /// New cached count.
        attendee_count: i64,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl StoreEvent {
    /// Returns the event this notification concerns.
    #[must_use]
    pub fn event_id(&self) -> EventId {
        match self {
            Self::ReservationCreated { event_id, .. }
            | Self::ReservationCancelled { event_id, .. }
            | Self::AttendeeCountChanged { event_id, .. } => *event_id,
        }
    }

    /// Returns the user this notification concerns, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::ReservationCreated { user_id, .. }
            | Self::ReservationCancelled { user_id, .. } => Some(user_id),
            Self::AttendeeCountChanged { .. } => None,
        }
    }

    /// Returns `true` if this notification concerns the (`user_id`, `event_id`) pair.
    #[must_use]
    pub fn concerns(&self, user_id: &UserId, event_id: EventId) -> bool {
        self.event_id() == event_id && self.user_id() == Some(user_id)
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ReservationCreated { .. } => "reservation_created",
            Self::ReservationCancelled { .. } => "reservation_cancelled",
            Self::AttendeeCountChanged { .. } => "attendee_count_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concerns_matches_user_and_event() {
        let user = UserId::new("u1");
        let event_id = EventId::new();
        let event = StoreEvent::ReservationCreated {
            reservation_id: ReservationId::new(),
            user_id: user.clone(),
            event_id,
            attendee_count: 1,
            timestamp: Utc::now(),
        };
        assert!(event.concerns(&user, event_id));
        assert!(!event.concerns(&UserId::new("u2"), event_id));
        assert!(!event.concerns(&user, EventId::new()));
    }

    #[test]
    fn count_change_concerns_no_user() {
        let event = StoreEvent::AttendeeCountChanged {
            event_id: EventId::new(),
            attendee_count: 3,
            timestamp: Utc::now(),
        };
        assert!(event.user_id().is_none());
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("attendee_count_changed"));
    }
}
