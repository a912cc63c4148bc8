//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::api::auth::AdminCredentials;
use crate::config::GatewayConfig;
use crate::content::{OutlineGenerator, Sanitizer};
use crate::domain::{BlogStore, CounterStore, EventBus, MemoryStore, ReservationStore};
use crate::error::GatewayError;
use crate::reconcile::{ConfirmationPoller, OptimisticRevert};
use crate::service::{BlogService, RateLimiter, ReservationService, TicketService};

/// Store handles the services are built on.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Reservations and events.
    pub reservations: Arc<dyn ReservationStore>,
    /// Blog drafts and posts.
    pub blog: Arc<dyn BlogStore>,
    /// Rate-limit counters.
    pub counters: Arc<dyn CounterStore>,
}

impl Stores {
    /// One [`MemoryStore`] behind all three handles.
    #[must_use]
    pub fn memory(read_lag: Duration, changefeed: EventBus) -> Self {
        let store = Arc::new(MemoryStore::new(read_lag, changefeed));
        Self {
            reservations: Arc::clone(&store) as Arc<dyn ReservationStore>,
            blog: Arc::clone(&store) as Arc<dyn BlogStore>,
            counters: store,
        }
    }
}

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Reservation writes and event bookkeeping.
    pub reservation_service: Arc<ReservationService>,
    /// Read-after-write confirmation.
    pub confirmation_poller: ConfirmationPoller,
    /// Optimistic count handling on confirmation timeout.
    pub optimistic_revert: OptimisticRevert,
    /// Rate-limited ticket lookup.
    pub ticket_service: Arc<TicketService>,
    /// Blog drafts and posts.
    pub blog_service: Arc<BlogService>,
    /// Store changefeed for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Admin bearer token check.
    pub admin: AdminCredentials,
}

impl AppState {
    /// Wires services over `stores` according to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the sanitizer fails to build.
    pub fn new(stores: Stores, config: &GatewayConfig) -> Result<Self, GatewayError> {
        let event_bus = stores.reservations.changefeed().clone();
        let reservation_service =
            Arc::new(ReservationService::new(Arc::clone(&stores.reservations)));
        let confirmation_poller =
            ConfirmationPoller::new(Arc::clone(&stores.reservations), config.confirmation.clone());
        let ticket_service = Arc::new(TicketService::new(
            stores.reservations,
            RateLimiter::new(stores.counters),
            config.ticket_limits,
        ));
        let blog_service = Arc::new(BlogService::new(
            stores.blog,
            Arc::new(OutlineGenerator),
            Sanitizer::new()?,
        ));

        Ok(Self {
            reservation_service,
            confirmation_poller,
            optimistic_revert: config.optimistic_revert,
            ticket_service,
            blog_service,
            event_bus,
            admin: AdminCredentials::new(config.admin_token.as_deref()),
        })
    }
}
