//! Public ticket lookup by guest token.
//!
//! Lookups are rate limited three ways: per client address, per resolved
//! reservation, and per client failure count. Unknown tokens count as
//! failures so that guessing is throttled before the address limit kicks
//! in.

use std::sync::Arc;
use std::time::Duration;

use super::rate_limiter::{DEFAULT_WINDOW, LimitRule, RateLimiter};
use super::ticket_token::{hash_ticket_token, is_well_formed};
use crate::domain::{Event, Reservation, ReservationStore};
use crate::error::GatewayError;

/// Thresholds for the ticket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketLimits {
    /// Lookups per client address per window.
    pub per_ip: u32,
    /// Lookups per reservation per window.
    pub per_reservation: u32,
    /// Failed lookups per client address per window.
    pub failures: u32,
    /// Window length shared by all three counters.
    pub window: Duration,
}

impl Default for TicketLimits {
    fn default() -> Self {
        Self {
            per_ip: 30,
            per_reservation: 20,
            failures: 10,
            window: DEFAULT_WINDOW,
        }
    }
}

impl TicketLimits {
    fn ip_rule(&self) -> LimitRule {
        LimitRule::new("ticket:ip", self.per_ip).with_window(self.window)
    }

    fn reservation_rule(&self) -> LimitRule {
        LimitRule::new("ticket:reservation", self.per_reservation).with_window(self.window)
    }

    fn failure_rule(&self) -> LimitRule {
        LimitRule::new("ticket:failures", self.failures).with_window(self.window)
    }
}

/// A resolved ticket.
#[derive(Debug, Clone)]
pub struct Ticket {
    /// The reservation the token was issued for.
    pub reservation: Reservation,
    /// The reserved event, including host name.
    pub event: Event,
}

/// Resolves ticket tokens to reservations.
#[derive(Debug, Clone)]
pub struct TicketService {
    store: Arc<dyn ReservationStore>,
    limiter: RateLimiter,
    limits: TicketLimits,
}

impl TicketService {
    /// Creates a new `TicketService`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, limiter: RateLimiter, limits: TicketLimits) -> Self {
        Self {
            store,
            limiter,
            limits,
        }
    }

    /// Active thresholds.
    #[must_use]
    pub const fn limits(&self) -> &TicketLimits {
        &self.limits
    }

    /// Looks up the ticket for `token` on behalf of `client`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] if the token is empty.
    /// - [`GatewayError::RateLimited`] if any of the three limits is hit.
    /// - [`GatewayError::Unauthorized`] if the token does not resolve.
    /// - [`GatewayError::NotFound`] if the reserved event no longer exists.
    pub async fn lookup(&self, token: &str, client: &str) -> Result<Ticket, GatewayError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GatewayError::InvalidRequest("missing token".to_string()));
        }

        self.limiter.hit(&self.limits.ip_rule(), client).await?;
        let failure_rule = self.limits.failure_rule();
        self.limiter.ensure_below(&failure_rule, client).await?;

        let found = if is_well_formed(token) {
            self.store
                .find_by_ticket_hash(&hash_ticket_token(token))
                .await?
        } else {
            None
        };
        let Some(reservation) = found else {
            self.limiter.record(&failure_rule, client).await;
            tracing::info!(%client, "ticket lookup with unknown token");
            return Err(GatewayError::Unauthorized("invalid ticket token".to_string()));
        };

        self.limiter
            .hit(&self.limits.reservation_rule(), &reservation.id.to_string())
            .await?;

        let event = self
            .store
            .get_event(reservation.event_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("event {}", reservation.event_id)))?;

        tracing::debug!(reservation_id = %reservation.id, %client, "ticket resolved");
        Ok(Ticket { reservation, event })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{EventId, MemoryStore, NewReservation, PricingType, UserId};
    use crate::service::ticket_token::generate_ticket_token;

    async fn setup(limits: TicketLimits) -> (TicketService, String) {
        let store = Arc::new(MemoryStore::consistent());
        let event = Event {
            id: EventId::new(),
            host_id: "host-1".to_string(),
            host_name: "Maya".to_string(),
            title: "Pottery night".to_string(),
            starts_at: Utc::now(),
            capacity: None,
            attendee_count: 1,
            pricing_type: PricingType::Free,
            fee_amount: None,
            currency: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let _ = store.put_event(event.clone()).await;
        let token = generate_ticket_token();
        let _ = store
            .create_reservation(NewReservation {
                user_id: UserId::new("guest"),
                event_id: event.id,
                attendee_count: 1,
                payment: None,
                ticket_token_hash: hash_ticket_token(&token),
            })
            .await;
        let limiter = RateLimiter::new(Arc::clone(&store) as Arc<dyn crate::domain::CounterStore>);
        let service = TicketService::new(store, limiter, limits);
        (service, token)
    }

    #[tokio::test(start_paused = true)]
    async fn valid_token_resolves_reservation_and_event() {
        let (service, token) = setup(TicketLimits::default()).await;
        let Ok(ticket) = service.lookup(&token, "10.0.0.1").await else {
            panic!("lookup failed");
        };
        assert_eq!(ticket.reservation.event_id, ticket.event.id);
        assert_eq!(ticket.event.host_name, "Maya");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_token_is_a_bad_request() {
        let (service, _) = setup(TicketLimits::default()).await;
        assert!(matches!(
            service.lookup("  ", "10.0.0.1").await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_tokens_are_forbidden_then_throttled() {
        let limits = TicketLimits {
            failures: 2,
            ..TicketLimits::default()
        };
        let (service, token) = setup(limits).await;
        let bogus = "0".repeat(64);
        for _ in 0..2 {
            assert!(matches!(
                service.lookup(&bogus, "10.0.0.9").await,
                Err(GatewayError::Unauthorized(_))
            ));
        }
        assert!(matches!(
            service.lookup(&token, "10.0.0.9").await,
            Err(GatewayError::RateLimited { .. })
        ));
        assert!(service.lookup(&token, "10.0.0.1").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn per_ip_and_per_reservation_limits_apply() {
        let limits = TicketLimits {
            per_ip: 2,
            per_reservation: 3,
            ..TicketLimits::default()
        };
        let (service, token) = setup(limits).await;
        assert!(service.lookup(&token, "a").await.is_ok());
        assert!(service.lookup(&token, "a").await.is_ok());
        assert!(matches!(
            service.lookup(&token, "a").await,
            Err(GatewayError::RateLimited { .. })
        ));

        assert!(service.lookup(&token, "b").await.is_ok());
        assert!(matches!(
            service.lookup(&token, "c").await,
            Err(GatewayError::RateLimited { .. })
        ));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(service.lookup(&token, "a").await.is_ok());
    }
}
