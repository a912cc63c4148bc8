//! Reservation writer and event bookkeeping.
//!
//! [`ReservationService`] issues create/cancel writes and maintains the
//! denormalized attendee count on the event. Neither the capacity check
//! nor the duplicate check is transactional: two concurrent writers can
//! both pass them, so overbooking and duplicate active reservations stay
//! possible under load. [`ReservationService::recount_attendees`] repairs
//! count drift after the fact.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::ticket_token::{generate_ticket_token, hash_ticket_token};
use crate::domain::{
    Event, EventId, NewReservation, PaymentDetails, PricingType, Reservation, ReservationStore,
    StoreEvent, UserId,
};
use crate::error::GatewayError;

/// Input for a reservation write.
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    /// Reserving user.
    pub user_id: UserId,
    /// Event to reserve.
    pub event_id: EventId,
    /// Seats claimed; must be at least 1.
    pub attendee_count: u32,
    /// Payment context, required for online-paid events.
    pub payment: Option<PaymentDetails>,
}

/// Result of a successful reservation write.
#[derive(Debug, Clone)]
pub struct CreatedReservation {
    /// The stored reservation.
    pub reservation: Reservation,
    /// Plain ticket token. Returned exactly once, never stored.
    pub ticket_token: String,
    /// Cached attendee count after the adjustment.
    pub attendee_count: i64,
}

/// Input for event creation.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Host user identifier.
    pub host_id: String,
    /// Host display name.
    pub host_name: String,
    /// Event title.
    pub title: String,
    /// Scheduled start.
    pub starts_at: DateTime<Utc>,
    /// Attendee limit.
    pub capacity: Option<u32>,
    /// Pricing model.
    pub pricing_type: PricingType,
    /// Fee per attendee in the smallest currency unit.
    pub fee_amount: Option<i64>,
    /// ISO-4217 currency code.
    pub currency: Option<String>,
}

/// Outcome of an attendee recount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendeeRecount {
    /// Event that was recounted.
    pub event_id: EventId,
    /// Cached count before the recount.
    pub previous: i64,
    /// Sum of attendees over active reservations.
    pub recomputed: i64,
}

impl AttendeeRecount {
    /// Difference between the cached and the recomputed count.
    #[must_use]
    pub const fn drift(&self) -> i64 {
        self.previous - self.recomputed
    }
}

/// Issues reservation writes against the injected store.
#[derive(Debug, Clone)]
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
}

impl ReservationService {
    /// Creates a new `ReservationService`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    /// Creates a reservation and bumps the event's cached attendee count.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for a blank user, zero attendees,
    ///   a missing payment context on an online-paid event, or a full event.
    /// - [`GatewayError::NotFound`] if the event does not exist.
    /// - [`GatewayError::Conflict`] if the user already holds an active
    ///   reservation according to the list index.
    /// - [`GatewayError::PersistenceError`] if the write fails.
    pub async fn reserve(
        &self,
        request: ReservationRequest,
    ) -> Result<CreatedReservation, GatewayError> {
        if request.user_id.is_blank() {
            return Err(GatewayError::InvalidRequest("missing user_id".to_string()));
        }
        if request.attendee_count == 0 {
            return Err(GatewayError::InvalidRequest(
                "attendee_count must be at least 1".to_string(),
            ));
        }

        let event = self.require_event(request.event_id).await?;
        let payment = payment_for(&event, request.attendee_count, request.payment)?;

        if let Some(remaining) = event.remaining_capacity()
            && remaining < i64::from(request.attendee_count)
        {
            return Err(GatewayError::InvalidRequest(format!(
                "event {} has {remaining} seats left",
                event.id
            )));
        }

        let listed = self
            .store
            .list_reservations_for_user(&request.user_id)
            .await?;
        if listed.iter().any(|r| r.is_active_for(event.id)) {
            return Err(GatewayError::Conflict(format!(
                "user {} already holds a reservation for event {}",
                request.user_id, event.id
            )));
        }

        let ticket_token = generate_ticket_token();
        let reservation = self
            .store
            .create_reservation(NewReservation {
                user_id: request.user_id,
                event_id: event.id,
                attendee_count: request.attendee_count,
                payment,
                ticket_token_hash: hash_ticket_token(&ticket_token),
            })
            .await?;

        let attendee_count = self
            .adjust_attendee_count(event.id, i64::from(reservation.attendee_count))
            .await?;

        tracing::info!(
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            event_id = %reservation.event_id,
            attendees = reservation.attendee_count,
            "reservation created"
        );
        Ok(CreatedReservation {
            reservation,
            ticket_token,
            attendee_count,
        })
    }

    /// Cancels the user's active reservation for the event and decrements
    /// the cached attendee count.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if there is no active
    /// reservation, or [`GatewayError::PersistenceError`] if a write fails.
    pub async fn cancel(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> Result<Reservation, GatewayError> {
        if user_id.is_blank() {
            return Err(GatewayError::InvalidRequest("missing user_id".to_string()));
        }
        let cancelled = self
            .store
            .cancel_active_reservation(user_id, event_id)
            .await?
            .ok_or_else(|| {
                GatewayError::NotFound(format!(
                    "active reservation of user {user_id} for event {event_id}"
                ))
            })?;

        self.adjust_attendee_count(event_id, -i64::from(cancelled.attendee_count))
            .await?;

        tracing::info!(
            reservation_id = %cancelled.id,
            %user_id,
            %event_id,
            "reservation cancelled"
        );
        Ok(cancelled)
    }

    /// Lists a user's reservations through the eventually consistent index.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Reservation>, GatewayError> {
        self.store.list_reservations_for_user(user_id).await
    }

    /// Creates an event with an attendee count of zero.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank title or host,
    /// a paid event without a positive fee, or
    /// [`GatewayError::PersistenceError`] if the write fails.
    pub async fn create_event(&self, input: NewEvent) -> Result<Event, GatewayError> {
        if input.title.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("missing title".to_string()));
        }
        if input.host_id.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("missing host_id".to_string()));
        }
        if input.pricing_type != PricingType::Free && input.fee_amount.is_none_or(|fee| fee <= 0) {
            return Err(GatewayError::InvalidRequest(
                "paid events need a positive fee_amount".to_string(),
            ));
        }

        let now = Utc::now();
        let event = Event {
            id: EventId::new(),
            host_id: input.host_id,
            host_name: input.host_name,
            title: input.title,
            starts_at: input.starts_at,
            capacity: input.capacity,
            attendee_count: 0,
            pricing_type: input.pricing_type,
            fee_amount: input.fee_amount,
            currency: input.currency,
            created_at: now,
            updated_at: now,
        };
        self.store.put_event(event.clone()).await?;
        tracing::info!(event_id = %event.id, title = %event.title, "event created");
        Ok(event)
    }

    /// Point read of an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the event does not exist.
    pub async fn require_event(&self, event_id: EventId) -> Result<Event, GatewayError> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("event {event_id}")))
    }

    /// Recomputes the cached attendee count from active reservations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the event does not exist, or
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn recount_attendees(
        &self,
        event_id: EventId,
    ) -> Result<AttendeeRecount, GatewayError> {
        let mut event = self.require_event(event_id).await?;
        let recomputed: i64 = self
            .store
            .list_reservations_for_event(event_id)
            .await?
            .iter()
            .filter(|r| r.is_active())
            .map(|r| i64::from(r.attendee_count))
            .sum();

        let recount = AttendeeRecount {
            event_id,
            previous: event.attendee_count,
            recomputed,
        };
        if recount.drift() != 0 {
            tracing::warn!(%event_id, drift = recount.drift(), "attendee count drifted");
            event.attendee_count = recomputed;
            event.updated_at = Utc::now();
            self.store.put_event(event).await?;
            self.announce_count(event_id, recomputed);
        }
        Ok(recount)
    }

    /// Read-modify-write of the cached attendee count. Not atomic.
    async fn adjust_attendee_count(
        &self,
        event_id: EventId,
        delta: i64,
    ) -> Result<i64, GatewayError> {
        let mut event = self.require_event(event_id).await?;
        event.attendee_count = event.attendee_count.saturating_add(delta).max(0);
        event.updated_at = Utc::now();
        let count = event.attendee_count;
        self.store.put_event(event).await?;
        self.announce_count(event_id, count);
        Ok(count)
    }

    fn announce_count(&self, event_id: EventId, attendee_count: i64) {
        self.store
            .changefeed()
            .publish(StoreEvent::AttendeeCountChanged {
                event_id,
                attendee_count,
                timestamp: Utc::now(),
            });
    }
}

/// Validates and completes the payment context for `event`.
fn payment_for(
    event: &Event,
    attendees: u32,
    payment: Option<PaymentDetails>,
) -> Result<Option<PaymentDetails>, GatewayError> {
    if !event.pricing_type.requires_payment() {
        return Ok(None);
    }
    let mut payment = payment
        .filter(|p| p.payment_intent_id.as_deref().is_some_and(|id| !id.trim().is_empty()))
        .ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "event {} requires a payment_intent_id",
                event.id
            ))
        })?;
    if payment.total_amount.is_none() {
        payment.total_amount = event.total_fee(attendees);
    }
    Ok(Some(payment))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MemoryStore, ReservationStatus};

    fn make_service() -> (Arc<MemoryStore>, ReservationService) {
        let store = Arc::new(MemoryStore::consistent());
        let service = ReservationService::new(Arc::clone(&store) as Arc<dyn ReservationStore>);
        (store, service)
    }

    fn new_event(pricing_type: PricingType, capacity: Option<u32>) -> NewEvent {
        NewEvent {
            host_id: "host-1".to_string(),
            host_name: "Maya".to_string(),
            title: "Rooftop salsa".to_string(),
            starts_at: Utc::now(),
            capacity,
            pricing_type,
            fee_amount: (pricing_type != PricingType::Free).then_some(2_000),
            currency: Some("CAD".to_string()),
        }
    }

    fn request(user: &str, event_id: EventId, attendees: u32) -> ReservationRequest {
        ReservationRequest {
            user_id: UserId::new(user),
            event_id,
            attendee_count: attendees,
            payment: None,
        }
    }

    #[tokio::test]
    async fn reserve_returns_id_token_and_bumps_count() {
        let (store, service) = make_service();
        let Ok(event) = service.create_event(new_event(PricingType::Free, None)).await else {
            panic!("event creation failed");
        };

        let Ok(created) = service.reserve(request("u1", event.id, 2)).await else {
            panic!("reserve failed");
        };
        assert_eq!(created.reservation.status, ReservationStatus::Reserved);
        assert_eq!(created.attendee_count, 2);
        assert_eq!(
            created.reservation.ticket_token_hash,
            hash_ticket_token(&created.ticket_token)
        );

        let Ok(Some(stored)) = store.get_event(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(stored.attendee_count, 2);
    }

    #[tokio::test]
    async fn duplicate_active_reservation_is_rejected() {
        let (_, service) = make_service();
        let Ok(event) = service.create_event(new_event(PricingType::Free, None)).await else {
            panic!("event creation failed");
        };
        assert!(service.reserve(request("u1", event.id, 1)).await.is_ok());
        assert!(matches!(
            service.reserve(request("u1", event.id, 1)).await,
            Err(GatewayError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn online_event_requires_payment_intent() {
        let (_, service) = make_service();
        let Ok(event) = service
            .create_event(new_event(PricingType::Online, None))
            .await
        else {
            panic!("event creation failed");
        };
        assert!(matches!(
            service.reserve(request("u1", event.id, 1)).await,
            Err(GatewayError::InvalidRequest(_))
        ));

        let mut paid = request("u1", event.id, 3);
        paid.payment = Some(PaymentDetails {
            payment_method: Some("card".to_string()),
            payment_intent_id: Some("pi_123".to_string()),
            ..PaymentDetails::default()
        });
        let Ok(created) = service.reserve(paid).await else {
            panic!("paid reserve failed");
        };
        let Some(payment) = created.reservation.payment else {
            panic!("payment missing");
        };
        assert_eq!(payment.total_amount, Some(6_000));
    }

    #[tokio::test]
    async fn full_event_is_rejected() {
        let (_, service) = make_service();
        let Ok(event) = service
            .create_event(new_event(PricingType::Free, Some(2)))
            .await
        else {
            panic!("event creation failed");
        };
        assert!(service.reserve(request("u1", event.id, 2)).await.is_ok());
        assert!(matches!(
            service.reserve(request("u2", event.id, 1)).await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn zero_attendees_and_unknown_event_are_rejected() {
        let (_, service) = make_service();
        assert!(matches!(
            service.reserve(request("u1", EventId::new(), 0)).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.reserve(request("u1", EventId::new(), 1)).await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_decrements_and_missing_cancel_is_not_found() {
        let (store, service) = make_service();
        let Ok(event) = service.create_event(new_event(PricingType::Free, None)).await else {
            panic!("event creation failed");
        };
        let user = UserId::new("u1");
        let _ = service.reserve(request("u1", event.id, 3)).await;

        let Ok(cancelled) = service.cancel(&user, event.id).await else {
            panic!("cancel failed");
        };
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        let Ok(Some(stored)) = store.get_event(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(stored.attendee_count, 0);

        assert!(matches!(
            service.cancel(&user, event.id).await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_cancels_release_seats_once() {
        let (store, service) = make_service();
        let Ok(event) = service.create_event(new_event(PricingType::Free, None)).await else {
            panic!("event creation failed");
        };
        let user = UserId::new("u1");
        let _ = service.reserve(request("u1", event.id, 2)).await;

        let (first, second) = tokio::join!(
            service.cancel(&user, event.id),
            service.cancel(&user, event.id)
        );
        assert_eq!(
            usize::from(first.is_ok()) + usize::from(second.is_ok()),
            1,
            "exactly one cancel wins"
        );
        let Ok(Some(stored)) = store.get_event(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(stored.attendee_count, 0);
    }

    #[tokio::test]
    async fn recount_repairs_drift() {
        let (store, service) = make_service();
        let Ok(event) = service.create_event(new_event(PricingType::Free, None)).await else {
            panic!("event creation failed");
        };
        let _ = service.reserve(request("u1", event.id, 2)).await;
        let _ = service.reserve(request("u2", event.id, 1)).await;

        let Ok(Some(mut drifted)) = store.get_event(event.id).await else {
            panic!("event missing");
        };
        drifted.attendee_count = 10;
        let _ = store.put_event(drifted).await;

        let Ok(recount) = service.recount_attendees(event.id).await else {
            panic!("recount failed");
        };
        assert_eq!(recount.previous, 10);
        assert_eq!(recount.recomputed, 3);
        assert_eq!(recount.drift(), 7);

        let Ok(again) = service.recount_attendees(event.id).await else {
            panic!("recount failed");
        };
        assert_eq!(again.drift(), 0);
    }
}
