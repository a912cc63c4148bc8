//! Fixed-window rate limiting over a [`CounterStore`].
//!
//! Each [`LimitRule`] names a scope, a threshold and a window. The counter
//! for `scope:subject` counts hits in the current window; the hit that
//! takes the count past `max_requests` is rejected, and the first hit after
//! the window has elapsed starts a fresh count of 1.
//!
//! Counter backend failures fail open: the request proceeds and a warning
//! is logged, so a counter outage never takes the guarded endpoint down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::{CounterStore, WindowCount};
use crate::error::GatewayError;

/// Default length of a rate-limit window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// One threshold applied to one kind of subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitRule {
    /// Key prefix, e.g. `"ticket:ip"`.
    pub scope: &'static str,
    /// Hits allowed per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl LimitRule {
    /// Creates a rule with the default 60 s window.
    #[must_use]
    pub const fn new(scope: &'static str, max_requests: u32) -> Self {
        Self {
            scope,
            max_requests,
            window: DEFAULT_WINDOW,
        }
    }

    /// Overrides the window length.
    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn key(&self, subject: &str) -> String {
        format!("{}:{subject}", self.scope)
    }
}

/// Applies [`LimitRule`]s against shared counters.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Creates a limiter over `counters`.
    #[must_use]
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters }
    }

    /// Records a hit for `subject` and rejects it if the window's count
    /// now exceeds the rule's threshold.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] when over the threshold.
    pub async fn hit(&self, rule: &LimitRule, subject: &str) -> Result<(), GatewayError> {
        let key = rule.key(subject);
        match self.counters.increment(&key, rule.window).await {
            Ok(window) if window.count > rule.max_requests => Err(limited(&key, window)),
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(%key, error = %err, "rate-limit counter unavailable; allowing");
                Ok(())
            }
        }
    }

    /// Rejects `subject` if its current count has already reached the
    /// threshold, without recording a hit. Used for failure counters that
    /// only grow on failed attempts.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] when the threshold is reached.
    pub async fn ensure_below(&self, rule: &LimitRule, subject: &str) -> Result<(), GatewayError> {
        let key = rule.key(subject);
        match self.counters.current(&key).await {
            Ok(window) if window.count >= rule.max_requests => Err(limited(&key, window)),
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(%key, error = %err, "rate-limit counter unavailable; allowing");
                Ok(())
            }
        }
    }

    /// Records a hit for `subject` without checking the threshold.
    pub async fn record(&self, rule: &LimitRule, subject: &str) {
        let key = rule.key(subject);
        if let Err(err) = self.counters.increment(&key, rule.window).await {
            tracing::warn!(%key, error = %err, "failed to record rate-limit hit");
        }
    }
}

fn limited(key: &str, window: WindowCount) -> GatewayError {
    let retry_after_ms = u64::try_from(window.resets_in.as_millis()).unwrap_or(u64::MAX);
    tracing::info!(%key, count = window.count, retry_after_ms, "rate limit exceeded");
    GatewayError::RateLimited { retry_after_ms }
}

/// Spawns a task that drops elapsed counter windows every `every`.
pub fn spawn_counter_sweeper(counters: Arc<dyn CounterStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match counters.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "purged expired rate-limit windows"),
                Err(err) => tracing::warn!(error = %err, "rate-limit counter purge failed"),
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::MemoryStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::consistent()))
    }

    #[tokio::test(start_paused = true)]
    async fn request_past_threshold_is_rejected() {
        let limiter = limiter();
        let rule = LimitRule::new("ticket:ip", 3);
        for _ in 0..3 {
            assert!(limiter.hit(&rule, "10.0.0.1").await.is_ok());
        }
        assert!(matches!(
            limiter.hit(&rule, "10.0.0.1").await,
            Err(GatewayError::RateLimited { retry_after_ms }) if retry_after_ms <= 60_000
        ));
        assert!(limiter.hit(&rule, "10.0.0.2").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_window_starts_a_fresh_count() {
        let limiter = limiter();
        let rule = LimitRule::new("ticket:ip", 1).with_window(Duration::from_secs(60));
        assert!(limiter.hit(&rule, "a").await.is_ok());
        assert!(limiter.hit(&rule, "a").await.is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.hit(&rule, "a").await.is_ok());
        assert!(limiter.hit(&rule, "a").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_counter_blocks_only_after_threshold() {
        let limiter = limiter();
        let rule = LimitRule::new("ticket:fail", 2);
        assert!(limiter.ensure_below(&rule, "a").await.is_ok());
        limiter.record(&rule, "a").await;
        assert!(limiter.ensure_below(&rule, "a").await.is_ok());
        limiter.record(&rule, "a").await;
        assert!(matches!(
            limiter.ensure_below(&rule, "a").await,
            Err(GatewayError::RateLimited { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn scopes_are_independent() {
        let limiter = limiter();
        let by_ip = LimitRule::new("ticket:ip", 1);
        let by_reservation = LimitRule::new("ticket:reservation", 1);
        assert!(limiter.hit(&by_ip, "x").await.is_ok());
        assert!(limiter.hit(&by_reservation, "x").await.is_ok());
    }

    #[derive(Debug)]
    struct BrokenCounters;

    #[async_trait]
    impl CounterStore for BrokenCounters {
        async fn increment(&self, _: &str, _: Duration) -> Result<WindowCount, GatewayError> {
            Err(GatewayError::PersistenceError("down".to_string()))
        }

        async fn current(&self, _: &str) -> Result<WindowCount, GatewayError> {
            Err(GatewayError::PersistenceError("down".to_string()))
        }

        async fn purge_expired(&self) -> Result<u64, GatewayError> {
            Err(GatewayError::PersistenceError("down".to_string()))
        }
    }

    #[tokio::test]
    async fn counter_outage_fails_open() {
        let limiter = RateLimiter::new(Arc::new(BrokenCounters));
        let rule = LimitRule::new("ticket:ip", 0);
        assert!(limiter.hit(&rule, "a").await.is_ok());
        assert!(limiter.ensure_below(&rule, "a").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_drops_elapsed_windows() {
        let counters = Arc::new(MemoryStore::consistent());
        for ip in ["a", "b", "c"] {
            let Ok(_) = counters.increment(ip, Duration::from_secs(1)).await else {
                panic!("increment failed");
            };
        }
        let sweeper = spawn_counter_sweeper(
            Arc::clone(&counters) as Arc<dyn CounterStore>,
            Duration::from_secs(10),
        );
        tokio::time::sleep(Duration::from_secs(11)).await;

        let Ok(left_over) = counters.purge_expired().await else {
            panic!("purge failed");
        };
        assert_eq!(left_over, 0);
        sweeper.abort();
    }
}
