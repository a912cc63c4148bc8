//! Store changefeed.
//!
//! Stores push a [`StoreEvent`] once a write is visible to
//! `list_reservations_for_user`. Delivery is best effort: a receiver that
//! falls more than `capacity` events behind loses the oldest ones and is
//! told so with [`Signal::Gap`], after which it must re-read the store.

use std::time::Duration;

use tokio::sync::broadcast;

use super::{EventId, StoreEvent, UserId};

/// Fan-out of [`StoreEvent`]s to the confirmation poller and WebSocket
/// clients.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Creates a changefeed retaining up to `capacity` undelivered events
    /// per receiver. A zero capacity is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes `event` now and returns how many receivers it reached.
    pub fn publish(&self, event: StoreEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Publishes `event` once `delay` has elapsed, for stores whose list
    /// index trails their writes.
    pub fn publish_after(&self, event: StoreEvent, delay: Duration) {
        if delay.is_zero() {
            self.publish(event);
            return;
        }
        let feed = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            feed.publish(event);
        });
    }

    /// Receives every future event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Follows the reservation changes of one user on one event.
    #[must_use]
    pub fn watch(&self, user_id: UserId, event_id: EventId) -> PairWatch {
        PairWatch {
            rx: self.sender.subscribe(),
            user_id,
            event_id,
        }
    }

    /// Number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Next thing a [`PairWatch`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A change to the watched pair.
    Change(StoreEvent),
    /// This many events were dropped before they could be read.
    Gap(u64),
    /// The feed has shut down.
    Closed,
}

/// Changefeed filtered to one (user, event) pair.
#[derive(Debug)]
pub struct PairWatch {
    rx: broadcast::Receiver<StoreEvent>,
    user_id: UserId,
    event_id: EventId,
}

impl PairWatch {
    /// Waits for the next change to the pair. Cancel safe.
    pub async fn next(&mut self) -> Signal {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.concerns(&self.user_id, self.event_id) => {
                    return Signal::Change(event);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => return Signal::Gap(skipped),
                Err(broadcast::error::RecvError::Closed) => return Signal::Closed,
            }
        }
    }
}
