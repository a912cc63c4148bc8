//! Per-connection subscription manager.
//!
//! Tracks which users and events a WebSocket client follows and provides
//! server-side changefeed filtering.

use std::collections::HashSet;

use crate::domain::{EventId, StoreEvent, UserId};

/// Manages the subscription filter for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    user_ids: HashSet<UserId>,
    event_ids: HashSet<EventId>,
    /// Wildcard `"*"`; the id sets are ignored while set.
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows the given users and events. `wildcard` follows everything.
    pub fn subscribe(&mut self, user_ids: &[UserId], event_ids: &[EventId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.user_ids.extend(user_ids.iter().cloned());
        self.event_ids.extend(event_ids.iter().copied());
    }

    /// Stops following the given users and events. `wildcard` clears the
    /// wildcard flag.
    pub fn unsubscribe(&mut self, user_ids: &[UserId], event_ids: &[EventId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in user_ids {
            self.user_ids.remove(id);
        }
        for id in event_ids {
            self.event_ids.remove(id);
        }
    }

    /// Returns `true` if `event` passes the filter: its event is followed,
    /// its user is followed, or the wildcard is on.
    #[must_use]
    pub fn matches(&self, event: &StoreEvent) -> bool {
        self.subscribe_all
            || self.event_ids.contains(&event.event_id())
            || event.user_id().is_some_and(|u| self.user_ids.contains(u))
    }

    /// Number of explicitly followed users and events.
    #[must_use]
    pub fn count(&self) -> usize {
        self.user_ids.len() + self.event_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::ReservationId;

    fn created(user: &str, event_id: EventId) -> StoreEvent {
        StoreEvent::ReservationCreated {
            reservation_id: ReservationId::new(),
            user_id: UserId::new(user),
            event_id,
            attendee_count: 1,
            timestamp: Utc::now(),
        }
    }

    fn count_changed(event_id: EventId) -> StoreEvent {
        StoreEvent::AttendeeCountChanged {
            event_id,
            attendee_count: 3,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&created("u1", EventId::new())));
    }

    #[test]
    fn event_subscription_sees_every_user_and_count_changes() {
        let mut mgr = SubscriptionManager::new();
        let event_id = EventId::new();
        mgr.subscribe(&[], &[event_id], false);
        assert!(mgr.matches(&created("u1", event_id)));
        assert!(mgr.matches(&created("u2", event_id)));
        assert!(mgr.matches(&count_changed(event_id)));
        assert!(!mgr.matches(&count_changed(EventId::new())));
    }

    #[test]
    fn user_subscription_ignores_count_changes() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[UserId::new("u1")], &[], false);
        assert!(mgr.matches(&created("u1", EventId::new())));
        assert!(!mgr.matches(&created("u2", EventId::new())));
        assert!(!mgr.matches(&count_changed(EventId::new())));
    }

    #[test]
    fn wildcard_matches_everything_until_cleared() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], &[], true);
        assert!(mgr.matches(&count_changed(EventId::new())));
        mgr.unsubscribe(&[], &[], true);
        assert!(!mgr.matches(&count_changed(EventId::new())));
    }

    #[test]
    fn unsubscribe_removes_ids() {
        let mut mgr = SubscriptionManager::new();
        let event_id = EventId::new();
        mgr.subscribe(&[UserId::new("u1")], &[event_id], false);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[UserId::new("u1")], &[event_id], false);
        assert_eq!(mgr.count(), 0);
        assert!(!mgr.matches(&created("u1", event_id)));
    }
}
