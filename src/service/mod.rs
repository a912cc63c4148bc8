//! Service layer: business logic orchestration.
//!
//! [`ReservationService`] issues reservation writes and keeps event counts,
//! [`TicketService`] resolves guest tickets behind the [`RateLimiter`], and
//! [`BlogService`] manages drafts and posts. Services receive their stores
//! as trait objects.

pub mod blog_service;
pub mod rate_limiter;
pub mod reservation_service;
pub mod ticket_service;
pub mod ticket_token;

pub use blog_service::{BlogService, DraftInput, PostRef, UnpublishMode, Unpublished};
pub use rate_limiter::{LimitRule, RateLimiter, spawn_counter_sweeper};
pub use reservation_service::{
    AttendeeRecount, CreatedReservation, NewEvent, ReservationRequest, ReservationService,
};
pub use ticket_service::{Ticket, TicketLimits, TicketService};
