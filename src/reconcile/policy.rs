//! Confirmation polling policy.
//!
//! The defaults reproduce the production tuning: five attempts with a fixed
//! 300 ms wait before each, roughly 1.5 s worst case. A multiplier above
//! 1.0 turns the fixed delay into exponential backoff capped at
//! `max_delay`, and `jitter` spreads each wait uniformly over
//! `[delay / 2, delay]`.
//!
//! ```rust
//! use popera_gateway::reconcile::ConfirmationPolicy;
//! use std::time::Duration;
//!
//! let policy = ConfirmationPolicy::builder()
//!     .max_attempts(4)
//!     .initial_delay(Duration::from_millis(100))
//!     .multiplier(2.0)
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
//! ```

use std::time::Duration;

use rand::Rng;

/// Bounded polling schedule for read-after-write confirmation.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `initial_delay`: 300 ms
/// - `multiplier`: 1.0 (fixed delay)
/// - `max_delay`: 5 s
/// - `jitter`: off
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationPolicy {
    /// Maximum number of list queries before giving up.
    pub max_attempts: u32,
    /// Wait before the first query.
    pub initial_delay: Duration,
    /// Growth factor applied to the wait of each subsequent attempt.
    pub multiplier: f64,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Randomize each wait over `[delay / 2, delay]`.
    pub jitter: bool,
}

/// Default number of confirmation queries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default wait before each confirmation query.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_DELAY,
            multiplier: 1.0,
            max_delay: Duration::from_secs(5),
            jitter: false,
        }
    }
}

impl ConfirmationPolicy {
    /// Creates a new policy builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> ConfirmationPolicyBuilder {
        ConfirmationPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// Wait before the zero-based `attempt`, without jitter.
    ///
    /// `initial_delay * multiplier ^ attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.initial_delay.as_nanos() as f64 * factor;
        #[allow(clippy::cast_precision_loss)]
        let cap = self.max_delay.as_nanos() as f64;
        if !scaled.is_finite() || scaled >= cap {
            return self.max_delay;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = scaled as u64;
        Duration::from_nanos(nanos)
    }

    /// Wait to actually sleep before `attempt`, with jitter applied.
    #[must_use]
    pub fn wait_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let half = base / 2;
        rand::thread_rng().gen_range(half..=base)
    }

    /// Sum of all waits without jitter: the longest a caller can be kept
    /// in the confirming state, not counting query latency.
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

/// Builder for [`ConfirmationPolicy`].
#[derive(Debug, Clone)]
pub struct ConfirmationPolicyBuilder {
    policy: ConfirmationPolicy,
}

impl ConfirmationPolicyBuilder {
    /// Set the maximum number of queries. Clamped to at least 1.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the wait before the first query.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the backoff multiplier. Values below 1.0 mean a fixed delay.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Set the cap for a single wait.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.policy.jitter = jitter;
        self
    }

    /// Build the [`ConfirmationPolicy`].
    #[must_use]
    pub fn build(self) -> ConfirmationPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_five_fixed_waits_of_300ms() {
        let policy = ConfirmationPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        for attempt in 0..5 {
            assert_eq!(policy.delay_for_attempt(attempt), Duration::from_millis(300));
        }
        assert_eq!(policy.worst_case_wait(), Duration::from_millis(1_500));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = ConfirmationPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_millis(500))
            .build();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_half_to_full_delay() {
        let policy = ConfirmationPolicy::builder().jitter(true).build();
        for attempt in 0..50 {
            let wait = policy.wait_for_attempt(attempt % 5);
            assert!(wait >= Duration::from_millis(150));
            assert!(wait <= Duration::from_millis(300));
        }
    }

    #[test]
    fn zero_attempts_are_clamped_to_one() {
        let policy = ConfirmationPolicy::builder().max_attempts(0).build();
        assert_eq!(policy.max_attempts, 1);
    }
}
