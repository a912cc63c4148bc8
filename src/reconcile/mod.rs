//! Read-after-write reconciliation.
//!
//! Writes land in the store immediately, but the per-user list index the
//! client reads from may not show them yet. This module closes that gap:
//!
//! - [`ConfirmationPolicy`] bounds how long and how often to look.
//! - [`ConfirmationPoller`] re-queries the list until the write shows up,
//!   woken early by the store changefeed.
//! - [`project`] and [`ConfirmationTracker`] derive the single control
//!   state shown to the user.
//! - [`ReservationSession`] ties the writer, the poller and the projection
//!   together with an optimistic attendee count.

pub mod policy;
pub mod poller;
pub mod projector;
pub mod session;

pub use policy::{ConfirmationPolicy, ConfirmationPolicyBuilder};
pub use poller::{ConfirmationOutcome, ConfirmationPoller, Expectation};
pub use projector::{AttemptId, ConfirmationPhase, ConfirmationTracker, ReserveControl, project};
pub use session::{
    OptimisticRevert, ReservationSession, ReserveOutcome, SessionView, UNCONFIRMED_NOTICE,
};
