//! # popera-gateway
//!
//! REST API and WebSocket gateway for Popera event reservations, guest
//! ticket lookup and blog publishing.
//!
//! The reservation list index is eventually consistent: a write can be
//! invisible to `list_reservations_for_user` for a short while after it
//! commits. The [`reconcile`] layer turns that into a bounded, explicit
//! confirmation step instead of a UI that silently shows stale state.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ReservationSession, ConfirmationPoller (reconcile/)
//!     ├── Reservation, Ticket, Blog services (service/)
//!     ├── Sanitizer, slugs, draft generator (content/)
//!     │
//!     ├── Store traits, EventBus changefeed (domain/)
//!     │
//!     ├── MemoryStore (domain/)
//!     └── PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod content;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod reconcile;
pub mod service;
pub mod ws;
