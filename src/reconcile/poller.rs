//! Confirmation poller: bounded re-query until a write is visible.
//!
//! After a reservation write succeeds, the per-user list index may not
//! reflect it yet. [`ConfirmationPoller`] waits, queries the list, and
//! scans for the expected row, up to `max_attempts` times. The store
//! changefeed is used as a wake-up hint: a matching notification cuts the
//! current wait short, but the list query stays the source of truth and
//! the query budget is unchanged.

use std::sync::Arc;
use std::time::Duration;

use super::ConfirmationPolicy;
use crate::domain::{
    EventId, PairWatch, Reservation, ReservationStore, Signal, StoreEvent, UserId,
};
use crate::error::GatewayError;

/// What the poller waits to observe in the list index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// An active reservation for the event is listed (after a create).
    Present,
    /// No active reservation for the event is listed (after a cancel).
    Absent,
}

impl Expectation {
    fn is_met_by(self, active: Option<&Reservation>) -> bool {
        match self {
            Self::Present => active.is_some(),
            Self::Absent => active.is_none(),
        }
    }

    fn is_signalled_by(self, event: &StoreEvent) -> bool {
        matches!(
            (self, event),
            (Self::Present, StoreEvent::ReservationCreated { .. })
                | (Self::Absent, StoreEvent::ReservationCancelled { .. })
        )
    }
}

/// Result of a confirmation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The write is visible. Carries the listed reservation when the
    /// expectation was [`Expectation::Present`].
    Confirmed {
        /// Listed active reservation, if any.
        reservation: Option<Reservation>,
        /// Queries performed, including the successful one.
        attempts: u32,
    },
    /// Every attempt was used without observing the write.
    TimedOut {
        /// Queries performed.
        attempts: u32,
    },
}

impl ConfirmationOutcome {
    /// Returns `true` for [`ConfirmationOutcome::Confirmed`].
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    /// Number of list queries performed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Confirmed { attempts, .. } | Self::TimedOut { attempts } => *attempts,
        }
    }

    /// Converts a timeout into [`GatewayError::ConfirmationTimeout`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConfirmationTimeout`] for
    /// [`ConfirmationOutcome::TimedOut`].
    pub fn into_result(self) -> Result<Option<Reservation>, GatewayError> {
        match self {
            Self::Confirmed { reservation, .. } => Ok(reservation),
            Self::TimedOut { attempts } => Err(GatewayError::ConfirmationTimeout { attempts }),
        }
    }
}

/// Polls the reservation list index until a write becomes visible.
#[derive(Debug, Clone)]
pub struct ConfirmationPoller {
    store: Arc<dyn ReservationStore>,
    policy: ConfirmationPolicy,
}

impl ConfirmationPoller {
    /// Creates a poller over `store` using `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, policy: ConfirmationPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    /// Waits for an active reservation of (`user_id`, `event_id`) to be listed.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if a list query fails. Exhausting the
    /// attempts is not an error; it yields [`ConfirmationOutcome::TimedOut`].
    pub async fn confirm_reserved(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> Result<ConfirmationOutcome, GatewayError> {
        self.confirm(user_id, event_id, Expectation::Present).await
    }

    /// Waits for the active reservation of (`user_id`, `event_id`) to drop
    /// out of the list.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if a list query fails.
    pub async fn confirm_cancelled(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> Result<ConfirmationOutcome, GatewayError> {
        self.confirm(user_id, event_id, Expectation::Absent).await
    }

    /// Runs the bounded confirmation loop for `expectation`.
    ///
    /// Stops at the first query that satisfies the expectation; no further
    /// queries are issued after that.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if a list query fails.
    pub async fn confirm(
        &self,
        user_id: &UserId,
        event_id: EventId,
        expectation: Expectation,
    ) -> Result<ConfirmationOutcome, GatewayError> {
        let mut watch = self.store.changefeed().watch(user_id.clone(), event_id);

        for attempt in 0..self.policy.max_attempts {
            let wait = self.policy.wait_for_attempt(attempt);
            wait_or_signal(wait, &mut watch, expectation).await;

            let rows = self.store.list_reservations_for_user(user_id).await?;
            let active = rows.into_iter().find(|r| r.is_active_for(event_id));
            let queries = attempt + 1;

            if expectation.is_met_by(active.as_ref()) {
                tracing::debug!(%user_id, %event_id, attempts = queries, "write confirmed");
                return Ok(ConfirmationOutcome::Confirmed {
                    reservation: active,
                    attempts: queries,
                });
            }
            tracing::debug!(%user_id, %event_id, attempt = queries, "write not visible yet");
        }

        tracing::warn!(
            %user_id,
            %event_id,
            attempts = self.policy.max_attempts,
            ?expectation,
            "confirmation attempts exhausted"
        );
        Ok(ConfirmationOutcome::TimedOut {
            attempts: self.policy.max_attempts,
        })
    }
}

/// Sleeps for `wait`, returning early if the changefeed reports a
/// matching write or if notifications were lost.
async fn wait_or_signal(wait: Duration, watch: &mut PairWatch, expectation: Expectation) {
    let sleep = tokio::time::sleep(wait);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return,
            signal = watch.next() => match signal {
                Signal::Change(event) if expectation.is_signalled_by(&event) => return,
                Signal::Change(_) => {}
                Signal::Gap(skipped) => {
                    tracing::debug!(skipped, "changefeed lagged; polling now");
                    return;
                }
                Signal::Closed => {
                    (&mut sleep).await;
                    return;
                }
            },
        }
    }
}
