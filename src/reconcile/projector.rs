//! Three-state projection of the reserve control.
//!
//! [`project`] maps (is-confirming, has-active-reservation) onto exactly one
//! [`ReserveControl`]. `has_active` is `None` until the authoritative store
//! has been consulted in the current session, which keeps stale locally
//! cached ids from flashing a false "Reserved".
//!
//! [`ConfirmationTracker`] owns the is-confirming flag for successive
//! attempts and refuses transitions that would break exclusivity: a
//! terminal attempt never goes back to confirming, and a stale attempt id
//! cannot finish a newer attempt.

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Display state of the reserve control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReserveControl {
    /// Actionable "Reserve" button. Initial state and poll-failure fallback.
    Reserve,
    /// Disabled "Confirming…" button.
    Confirming,
    /// "Reserved" badge with a cancel affordance.
    Reserved,
}

impl ReserveControl {
    /// User-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reserve => "Reserve",
            Self::Confirming => "Confirming…",
            Self::Reserved => "Reserved ✓",
        }
    }

    /// Returns `true` if pressing the control starts a reservation.
    #[must_use]
    pub const fn is_actionable(self) -> bool {
        matches!(self, Self::Reserve)
    }

    /// Returns `true` if the cancel affordance is shown.
    #[must_use]
    pub const fn shows_cancel(self) -> bool {
        matches!(self, Self::Reserved)
    }
}

/// Projects the control state. Confirming always wins.
#[must_use]
pub const fn project(is_confirming: bool, has_active: Option<bool>) -> ReserveControl {
    match (is_confirming, has_active) {
        (true, _) => ReserveControl::Confirming,
        (false, Some(true)) => ReserveControl::Reserved,
        (false, Some(false) | None) => ReserveControl::Reserve,
    }
}

/// Phase of the current confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationPhase {
    /// No attempt started yet.
    Idle,
    /// Waiting for the write to become visible.
    Confirming,
    /// The write was observed.
    Confirmed,
    /// Attempts were exhausted, the write may or may not have landed.
    Failed,
}

impl ConfirmationPhase {
    /// Returns `true` for the confirmed and failed phases.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// Identifier of one confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttemptId(u64);

/// Tracks the phase of successive confirmation attempts.
#[derive(Debug, Clone)]
pub struct ConfirmationTracker {
    current: u64,
    phase: ConfirmationPhase,
}

impl Default for ConfirmationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: 0,
            phase: ConfirmationPhase::Idle,
        }
    }

    /// Phase of the latest attempt.
    #[must_use]
    pub const fn phase(&self) -> ConfirmationPhase {
        self.phase
    }

    /// Returns `true` while the latest attempt is confirming.
    #[must_use]
    pub const fn is_confirming(&self) -> bool {
        matches!(self.phase, ConfirmationPhase::Confirming)
    }

    /// Rejects a new write while an attempt is confirming; the control is
    /// disabled in that state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] while confirming.
    pub fn ensure_idle(&self) -> Result<(), GatewayError> {
        if self.is_confirming() {
            return Err(GatewayError::InvalidRequest(
                "a confirmation is already in progress".to_string(),
            ));
        }
        Ok(())
    }

    /// Starts confirming a write that has succeeded.
    ///
    /// # Errors
    ///
    /// Same as [`ConfirmationTracker::ensure_idle`].
    pub fn begin(&mut self) -> Result<AttemptId, GatewayError> {
        self.ensure_idle()?;
        self.current = self.current.saturating_add(1);
        self.phase = ConfirmationPhase::Confirming;
        Ok(AttemptId(self.current))
    }

    /// Moves `attempt` to a terminal phase. Returns `false` and changes
    /// nothing if `attempt` is not the latest one, is already terminal, or
    /// `phase` is not terminal.
    pub fn finish(&mut self, attempt: AttemptId, phase: ConfirmationPhase) -> bool {
        if attempt.0 != self.current || !self.is_confirming() || !phase.is_terminal() {
            return false;
        }
        self.phase = phase;
        true
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn projection_table() {
        assert_eq!(project(false, None), ReserveControl::Reserve);
        assert_eq!(project(false, Some(false)), ReserveControl::Reserve);
        assert_eq!(project(false, Some(true)), ReserveControl::Reserved);
        assert_eq!(project(true, None), ReserveControl::Confirming);
        assert_eq!(project(true, Some(false)), ReserveControl::Confirming);
        assert_eq!(project(true, Some(true)), ReserveControl::Confirming);
    }

    #[test]
    fn never_reserved_while_confirming() {
        for has_active in [None, Some(false), Some(true)] {
            assert_ne!(project(true, has_active), ReserveControl::Reserved);
        }
    }

    #[test]
    fn labels_and_affordances() {
        assert_eq!(ReserveControl::Confirming.label(), "Confirming…");
        assert_eq!(ReserveControl::Reserved.label(), "Reserved ✓");
        assert!(ReserveControl::Reserve.is_actionable());
        assert!(!ReserveControl::Confirming.is_actionable());
        assert!(ReserveControl::Reserved.shows_cancel());
    }

    #[test]
    fn terminal_attempt_never_returns_to_confirming() {
        let mut tracker = ConfirmationTracker::new();
        let Ok(attempt) = tracker.begin() else {
            panic!("begin failed");
        };
        assert!(tracker.finish(attempt, ConfirmationPhase::Confirmed));
        assert!(!tracker.finish(attempt, ConfirmationPhase::Failed));
        assert_eq!(tracker.phase(), ConfirmationPhase::Confirmed);
        assert!(!tracker.is_confirming());
    }

    #[test]
    fn concurrent_begin_is_rejected() {
        let mut tracker = ConfirmationTracker::new();
        assert!(tracker.ensure_idle().is_ok());
        assert!(tracker.begin().is_ok());
        assert!(tracker.ensure_idle().is_err());
        assert!(matches!(
            tracker.begin(),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn stale_attempt_cannot_finish_newer_one() {
        let mut tracker = ConfirmationTracker::new();
        let Ok(first) = tracker.begin() else {
            panic!("begin failed");
        };
        assert!(tracker.finish(first, ConfirmationPhase::Failed));
        let Ok(second) = tracker.begin() else {
            panic!("begin failed");
        };
        assert!(!tracker.finish(first, ConfirmationPhase::Confirmed));
        assert!(tracker.is_confirming());
        assert!(tracker.finish(second, ConfirmationPhase::Confirmed));
    }

    #[test]
    fn non_terminal_phase_is_refused() {
        let mut tracker = ConfirmationTracker::new();
        let Ok(attempt) = tracker.begin() else {
            panic!("begin failed");
        };
        assert!(!tracker.finish(attempt, ConfirmationPhase::Idle));
        assert!(tracker.is_confirming());
    }
}
