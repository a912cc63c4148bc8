//! Client reservation flow for one (user, event) pair.
//!
//! [`ReservationSession`] drives the write, the confirmation poll and the
//! projected control state together. The local attendee count is updated
//! optimistically as soon as a write succeeds. What happens to it when
//! confirmation times out is decided by [`OptimisticRevert`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::poller::{ConfirmationOutcome, ConfirmationPoller};
use super::projector::{ConfirmationPhase, ConfirmationTracker, ReserveControl, project};
use crate::domain::{EventId, PaymentDetails, Reservation, ReservationId, UserId};
use crate::error::GatewayError;
use crate::service::{CreatedReservation, ReservationRequest, ReservationService};

/// Inline notice shown when a write could not be confirmed in time.
pub const UNCONFIRMED_NOTICE: &str =
    "We couldn't confirm your reservation yet. Refresh to check again.";

/// What to do with the optimistic attendee count when confirmation times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptimisticRevert {
    /// Keep the optimistic count. The write did succeed; only its
    /// visibility in the list index is unconfirmed.
    #[default]
    Keep,
    /// Roll the optimistic count back.
    Revert,
}

impl OptimisticRevert {
    /// Maps a boolean "revert on timeout" setting.
    #[must_use]
    pub const fn from_flag(revert: bool) -> Self {
        if revert { Self::Revert } else { Self::Keep }
    }
}

/// Result of [`ReservationSession::reserve`].
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    /// The reservation is visible in the user's list.
    Confirmed {
        /// The write result, including the one-time ticket token.
        created: CreatedReservation,
        /// List queries performed.
        attempts: u32,
    },
    /// The write succeeded but was not observed within the polling budget.
    Unconfirmed {
        /// The write result, including the one-time ticket token.
        created: CreatedReservation,
        /// List queries performed.
        attempts: u32,
    },
}

impl ReserveOutcome {
    /// The write result.
    #[must_use]
    pub const fn created(&self) -> &CreatedReservation {
        match self {
            Self::Confirmed { created, .. } | Self::Unconfirmed { created, .. } => created,
        }
    }

    /// Returns `true` for [`ReserveOutcome::Confirmed`].
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionView {
    /// Projected control.
    pub control: ReserveControl,
    /// Control label.
    pub label: String,
    /// Whether pressing the control starts a reservation.
    pub actionable: bool,
    /// Whether the cancel affordance is shown.
    pub shows_cancel: bool,
    /// Phase of the latest confirmation attempt.
    pub phase: ConfirmationPhase,
    /// Locally tracked attendee count of the event.
    pub attendee_count: i64,
    /// Inline notice, if any.
    pub notice: Option<String>,
}

/// Reservation state for one user on one event.
#[derive(Debug)]
pub struct ReservationSession {
    user_id: UserId,
    event_id: EventId,
    writer: Arc<ReservationService>,
    poller: ConfirmationPoller,
    revert: OptimisticRevert,
    tracker: ConfirmationTracker,
    has_active: Option<bool>,
    cached_ids: HashSet<ReservationId>,
    attendee_count: i64,
    notice: Option<String>,
}

impl ReservationSession {
    /// Creates a session that has not consulted the store yet.
    #[must_use]
    pub fn new(
        user_id: UserId,
        event_id: EventId,
        writer: Arc<ReservationService>,
        poller: ConfirmationPoller,
        revert: OptimisticRevert,
    ) -> Self {
        Self {
            user_id,
            event_id,
            writer,
            poller,
            revert,
            tracker: ConfirmationTracker::new(),
            has_active: None,
            cached_ids: HashSet::new(),
            attendee_count: 0,
            notice: None,
        }
    }

    /// Reads the event count and the user's list from the store. Until
    /// this has run, the session never projects `Reserved`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the event does not exist, or
    /// the store's error.
    pub async fn load(&mut self) -> Result<ReserveControl, GatewayError> {
        let event = self.writer.require_event(self.event_id).await?;
        let listed = self.writer.list_for_user(&self.user_id).await?;
        let active = listed.iter().find(|r| r.is_active_for(self.event_id));
        if let Some(reservation) = active {
            self.cached_ids.insert(reservation.id);
        }
        self.has_active = Some(active.is_some());
        self.attendee_count = event.attendee_count;
        self.notice = None;
        Ok(self.control())
    }

    /// Records a reservation id known from a previous visit. Cached ids are
    /// hints only and never change the projected control.
    pub fn remember(&mut self, id: ReservationId) {
        self.cached_ids.insert(id);
    }

    /// Reservation ids this session knows about.
    #[must_use]
    pub const fn cached_ids(&self) -> &HashSet<ReservationId> {
        &self.cached_ids
    }

    /// Projected control state.
    #[must_use]
    pub const fn control(&self) -> ReserveControl {
        project(self.tracker.is_confirming(), self.has_active)
    }

    /// Locally tracked attendee count.
    #[must_use]
    pub const fn attendee_count(&self) -> i64 {
        self.attendee_count
    }

    /// Current inline notice.
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Snapshot for serialization.
    #[must_use]
    pub fn view(&self) -> SessionView {
        let control = self.control();
        SessionView {
            control,
            label: control.label().to_string(),
            actionable: control.is_actionable(),
            shows_cancel: control.shows_cancel(),
            phase: self.tracker.phase(),
            attendee_count: self.attendee_count,
            notice: self.notice.clone(),
        }
    }

    /// Writes a reservation and waits for it to be listed. The control
    /// shows `Confirming` only once the write has succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] while a previous attempt is
    /// still confirming, or the writer's error if the write fails. Once the
    /// write has succeeded the result is always `Ok`: a confirmation
    /// timeout or a failed confirmation query yields
    /// [`ReserveOutcome::Unconfirmed`], which still carries the ticket token.
    pub async fn reserve(
        &mut self,
        attendee_count: u32,
        payment: Option<PaymentDetails>,
    ) -> Result<ReserveOutcome, GatewayError> {
        self.tracker.ensure_idle()?;
        self.notice = None;

        let request = ReservationRequest {
            user_id: self.user_id.clone(),
            event_id: self.event_id,
            attendee_count,
            payment,
        };
        let created = self.writer.reserve(request).await?;
        let attempt = self.tracker.begin()?;
        let delta = i64::from(created.reservation.attendee_count);
        self.attendee_count = self.attendee_count.saturating_add(delta);
        self.cached_ids.insert(created.reservation.id);

        match self
            .poller
            .confirm_reserved(&self.user_id, self.event_id)
            .await
        {
            Ok(ConfirmationOutcome::Confirmed { attempts, .. }) => {
                self.tracker.finish(attempt, ConfirmationPhase::Confirmed);
                self.has_active = Some(true);
                Ok(ReserveOutcome::Confirmed { created, attempts })
            }
            Ok(ConfirmationOutcome::TimedOut { attempts }) => {
                self.tracker.finish(attempt, ConfirmationPhase::Failed);
                self.on_timeout(-delta);
                Ok(ReserveOutcome::Unconfirmed { created, attempts })
            }
            Err(err) => {
                tracing::warn!(
                    reservation_id = %created.reservation.id,
                    error = %err,
                    "confirmation query failed after a successful write"
                );
                self.tracker.finish(attempt, ConfirmationPhase::Failed);
                self.on_timeout(-delta);
                Ok(ReserveOutcome::Unconfirmed {
                    created,
                    attempts: 0,
                })
            }
        }
    }

    /// Cancels the active reservation and waits for it to drop out of the
    /// list. An unconfirmed cancel still returns the cancelled reservation
    /// and leaves the notice set.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] while another attempt is
    /// confirming, [`GatewayError::NotFound`] if nothing is active, or the
    /// writer's error.
    pub async fn cancel(&mut self) -> Result<Reservation, GatewayError> {
        self.tracker.ensure_idle()?;
        self.notice = None;

        let cancelled = self.writer.cancel(&self.user_id, self.event_id).await?;
        let attempt = self.tracker.begin()?;
        let delta = i64::from(cancelled.attendee_count);
        self.attendee_count = self.attendee_count.saturating_sub(delta).max(0);

        let outcome = self
            .poller
            .confirm_cancelled(&self.user_id, self.event_id)
            .await;
        match outcome {
            Ok(ConfirmationOutcome::Confirmed { .. }) => {
                self.tracker.finish(attempt, ConfirmationPhase::Confirmed);
                self.has_active = Some(false);
            }
            Ok(ConfirmationOutcome::TimedOut { .. }) | Err(_) => {
                if let Err(err) = &outcome {
                    tracing::warn!(
                        reservation_id = %cancelled.id,
                        error = %err,
                        "confirmation query failed after a successful cancel"
                    );
                }
                self.tracker.finish(attempt, ConfirmationPhase::Failed);
                self.has_active = None;
                self.on_timeout(delta);
            }
        }
        Ok(cancelled)
    }

    fn on_timeout(&mut self, undo: i64) {
        if self.revert == OptimisticRevert::Revert {
            self.attendee_count = self.attendee_count.saturating_add(undo).max(0);
        }
        self.notice = Some(UNCONFIRMED_NOTICE.to_string());
        tracing::info!(
            user_id = %self.user_id,
            event_id = %self.event_id,
            revert = ?self.revert,
            "write not confirmed; showing notice"
        );
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::domain::{
        Event, EventBus, MemoryStore, NewReservation, PricingType, ReservationStore,
    };
    use crate::reconcile::ConfirmationPolicy;
    use crate::service::NewEvent;

    /// Memory store whose list index fails once its query allowance is spent.
    #[derive(Debug)]
    struct FlakyIndex {
        inner: MemoryStore,
        allowance: AtomicI64,
    }

    impl FlakyIndex {
        fn fail_after(&self, queries: i64) {
            self.allowance.store(queries, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ReservationStore for FlakyIndex {
        async fn create_reservation(
            &self,
            new: NewReservation,
        ) -> Result<Reservation, GatewayError> {
            self.inner.create_reservation(new).await
        }

        async fn cancel_active_reservation(
            &self,
            user_id: &UserId,
            event_id: EventId,
        ) -> Result<Option<Reservation>, GatewayError> {
            self.inner.cancel_active_reservation(user_id, event_id).await
        }

        async fn get_reservation(
            &self,
            id: ReservationId,
        ) -> Result<Option<Reservation>, GatewayError> {
            self.inner.get_reservation(id).await
        }

        async fn list_reservations_for_user(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<Reservation>, GatewayError> {
            if self.allowance.fetch_sub(1, Ordering::SeqCst) <= 0 {
                return Err(GatewayError::PersistenceError("index offline".to_string()));
            }
            self.inner.list_reservations_for_user(user_id).await
        }

        async fn list_reservations_for_event(
            &self,
            event_id: EventId,
        ) -> Result<Vec<Reservation>, GatewayError> {
            self.inner.list_reservations_for_event(event_id).await
        }

        async fn find_by_ticket_hash(
            &self,
            hash: &str,
        ) -> Result<Option<Reservation>, GatewayError> {
            self.inner.find_by_ticket_hash(hash).await
        }

        async fn get_event(&self, id: EventId) -> Result<Option<Event>, GatewayError> {
            self.inner.get_event(id).await
        }

        async fn put_event(&self, event: Event) -> Result<(), GatewayError> {
            self.inner.put_event(event).await
        }

        fn changefeed(&self) -> &EventBus {
            self.inner.changefeed()
        }
    }

    async fn setup(lag_ms: u64, revert: OptimisticRevert) -> ReservationSession {
        let store: Arc<dyn ReservationStore> = Arc::new(MemoryStore::new(
            Duration::from_millis(lag_ms),
            EventBus::new(64),
        ));
        session_over(store, revert).await
    }

    async fn session_over(
        store: Arc<dyn ReservationStore>,
        revert: OptimisticRevert,
    ) -> ReservationSession {
        let writer = Arc::new(ReservationService::new(Arc::clone(&store)));
        let Ok(event) = writer
            .create_event(NewEvent {
                host_id: "host-1".to_string(),
                host_name: "Maya".to_string(),
                title: "Board game night".to_string(),
                starts_at: Utc::now(),
                capacity: Some(20),
                pricing_type: PricingType::Free,
                fee_amount: None,
                currency: None,
            })
            .await
        else {
            panic!("event creation failed");
        };
        let poller = ConfirmationPoller::new(store, ConfirmationPolicy::default());
        ReservationSession::new(UserId::new("guest-1"), event.id, writer, poller, revert)
    }

    #[tokio::test(start_paused = true)]
    async fn free_event_reserve_ends_reserved() {
        let mut session = setup(700, OptimisticRevert::Keep).await;
        let Ok(control) = session.load().await else {
            panic!("load failed");
        };
        assert_eq!(control, ReserveControl::Reserve);

        let Ok(outcome) = session.reserve(1, None).await else {
            panic!("reserve failed");
        };
        assert!(outcome.is_confirmed());
        assert_eq!(session.control(), ReserveControl::Reserved);
        assert_eq!(session.control().label(), "Reserved ✓");
        assert_eq!(session.attendee_count(), 1);
        assert_eq!(session.notice(), None);
        assert!(session.cached_ids().contains(&outcome.created().reservation.id));
    }

    #[tokio::test(start_paused = true)]
    async fn lag_beyond_budget_shows_notice_and_keeps_count() {
        let mut session = setup(2_000, OptimisticRevert::Keep).await;
        let _ = session.load().await;

        let Ok(outcome) = session.reserve(2, None).await else {
            panic!("reserve failed");
        };
        let ReserveOutcome::Unconfirmed { attempts, .. } = outcome else {
            panic!("expected an unconfirmed outcome");
        };
        assert_eq!(attempts, 5);
        assert_eq!(session.control(), ReserveControl::Reserve);
        assert_eq!(session.notice(), Some(UNCONFIRMED_NOTICE));
        assert_eq!(session.attendee_count(), 2);
        assert_eq!(session.view().phase, ConfirmationPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn revert_policy_rolls_back_optimistic_count() {
        let mut session = setup(2_000, OptimisticRevert::Revert).await;
        let _ = session.load().await;

        let Ok(outcome) = session.reserve(2, None).await else {
            panic!("reserve failed");
        };
        assert!(!outcome.is_confirmed());
        assert_eq!(session.attendee_count(), 0);
        assert_eq!(session.control(), ReserveControl::Reserve);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_ids_never_project_reserved_before_load() {
        let mut session = setup(0, OptimisticRevert::Keep).await;
        session.remember(ReservationId::new());
        assert_eq!(session.control(), ReserveControl::Reserve);
        assert_eq!(session.view().label, "Reserve");
    }

    #[tokio::test(start_paused = true)]
    async fn load_sees_existing_reservation_once_indexed() {
        let mut first = setup(300, OptimisticRevert::Keep).await;
        let _ = first.load().await;
        assert!(first.reserve(1, None).await.is_ok());

        tokio::time::advance(Duration::from_millis(300)).await;
        let Ok(control) = first.load().await else {
            panic!("reload failed");
        };
        assert_eq!(control, ReserveControl::Reserved);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_returns_control_to_reserve() {
        let mut session = setup(300, OptimisticRevert::Keep).await;
        let _ = session.load().await;
        assert!(session.reserve(3, None).await.is_ok());

        let Ok(cancelled) = session.cancel().await else {
            panic!("cancel failed");
        };
        assert_eq!(cancelled.attendee_count, 3);
        assert_eq!(session.control(), ReserveControl::Reserve);
        assert_eq!(session.attendee_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_leaves_session_idle() {
        let mut session = setup(0, OptimisticRevert::Keep).await;
        assert!(matches!(
            session.reserve(0, None).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert_eq!(session.view().phase, ConfirmationPhase::Idle);
        assert_eq!(session.control(), ReserveControl::Reserve);
    }

    fn flaky_index() -> Arc<FlakyIndex> {
        Arc::new(FlakyIndex {
            inner: MemoryStore::new(Duration::from_millis(700), EventBus::new(64)),
            allowance: AtomicI64::new(i64::MAX),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn index_failure_after_write_keeps_the_ticket_token() {
        let store = flaky_index();
        let mut session =
            session_over(Arc::clone(&store) as Arc<dyn ReservationStore>, OptimisticRevert::Keep)
                .await;
        let _ = session.load().await;
        // The duplicate check still reads the index; confirmation does not.
        store.fail_after(1);

        let Ok(outcome) = session.reserve(1, None).await else {
            panic!("a written reservation must not surface as an error");
        };
        let ReserveOutcome::Unconfirmed { created, .. } = outcome else {
            panic!("expected an unconfirmed outcome");
        };
        assert!(!created.ticket_token.is_empty());
        assert_eq!(session.notice(), Some(UNCONFIRMED_NOTICE));
        assert_eq!(session.view().phase, ConfirmationPhase::Failed);

        let Ok(stored) = store.list_reservations_for_event(created.reservation.event_id).await
        else {
            panic!("event list failed");
        };
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn index_failure_after_cancel_still_reports_the_cancel() {
        let store = flaky_index();
        let mut session =
            session_over(Arc::clone(&store) as Arc<dyn ReservationStore>, OptimisticRevert::Keep)
                .await;
        let _ = session.load().await;
        assert!(session.reserve(2, None).await.is_ok());
        store.fail_after(0);

        let Ok(cancelled) = session.cancel().await else {
            panic!("a written cancel must not surface as an error");
        };
        assert_eq!(cancelled.status, crate::domain::ReservationStatus::Cancelled);
        assert_eq!(session.notice(), Some(UNCONFIRMED_NOTICE));
        assert_eq!(session.control(), ReserveControl::Reserve);
    }

    #[tokio::test(start_paused = true)]
    async fn control_stays_idle_until_the_write_lands() {
        let mut session = setup(0, OptimisticRevert::Keep).await;
        let _ = session.load().await;
        assert!(matches!(
            session.reserve(0, None).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert_eq!(session.view().phase, ConfirmationPhase::Idle);
        assert!(matches!(session.cancel().await, Err(GatewayError::NotFound(_))));
        assert_eq!(session.view().phase, ConfirmationPhase::Idle);
    }
}
