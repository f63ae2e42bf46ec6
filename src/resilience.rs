//! Resilience patterns for fault-tolerant calls to the external translator.
//!
//! Implements a lock-free circuit breaker and a reservation-based rate
//! limiter. Both block the calling OS thread directly (`std::thread::sleep`)
//! rather than yielding to an async executor, matching the
//! thread-per-connection request model.

use crate::config::ResilienceConfig;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through.
    Closed,
    /// Circuit open - requests fail immediately.
    Open,
    /// Testing if the external translator recovered - allowing a single request.
    HalfOpen,
}

/// Thread-safe circuit breaker for external-translator failure protection.
///
/// Prevents cascading failures by failing fast when the translator is
/// unavailable. Uses atomic operations for lock-free thread safety.
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
    /// Timestamp when circuit was opened (0 = closed).
    opened_at: AtomicU64,
    reset_timeout_secs: u64,
    total_failures: AtomicU32,
    recoveries: AtomicU32,
}

impl CircuitBreaker {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold: config.circuit_breaker_threshold,
            opened_at: AtomicU64::new(0),
            reset_timeout_secs: config.circuit_breaker_reset_secs,
            total_failures: AtomicU32::new(0),
            recoveries: AtomicU32::new(0),
        }
    }

    /// Create with explicit parameters (for testing).
    pub fn with_params(threshold: u32, reset_timeout_secs: u64) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold,
            opened_at: AtomicU64::new(0),
            reset_timeout_secs,
            total_failures: AtomicU32::new(0),
            recoveries: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> CircuitState {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        if opened_at == 0 {
            return CircuitState::Closed;
        }

        let now = current_timestamp_secs();
        let elapsed = now.saturating_sub(opened_at);

        if elapsed >= self.reset_timeout_secs {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Check if a request should be allowed through.
    ///
    /// In `HalfOpen` state, verifies `opened_at` is still non-zero before the
    /// CAS: if another thread already closed the circuit via
    /// `record_success`, the request should be allowed rather than racing to
    /// reopen it.
    pub fn allow_request(&self) -> bool {
        loop {
            let opened_at = self.opened_at.load(Ordering::Acquire);

            if opened_at == 0 {
                return true;
            }

            let now = current_timestamp_secs();
            let elapsed = now.saturating_sub(opened_at);

            if elapsed < self.reset_timeout_secs {
                return false;
            }

            // Half-open: try to claim the test slot.
            match self.opened_at.compare_exchange_weak(
                opened_at,
                now,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Record a successful call - resets failure count and closes the circuit.
    pub fn record_success(&self) {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        if opened_at != 0
            && self
                .opened_at
                .compare_exchange(opened_at, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.recoveries.fetch_add(1, Ordering::Relaxed);
        }
        self.failure_count.store(0, Ordering::Release);
    }

    /// Record a failed call - may open the circuit.
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;

        if failures >= self.threshold {
            self.opened_at
                .compare_exchange(
                    0,
                    current_timestamp_secs(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .ok();
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Acquire),
            threshold: self.threshold,
            total_failures: self.total_failures.load(Ordering::Acquire),
            recoveries: self.recoveries.load(Ordering::Acquire),
        }
    }

    pub fn reset(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.opened_at.store(0, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,
    pub total_failures: u32,
    pub recoveries: u32,
}

impl std::fmt::Display for CircuitBreakerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Circuit: {:?} ({}/{} failures, {} total, {} recoveries)",
            self.state, self.failure_count, self.threshold, self.total_failures, self.recoveries
        )
    }
}

/// Rate limiter with backpressure for 429 responses.
///
/// Tracks a `next_allowed` reservation timestamp rather than a last-request
/// timestamp, so concurrent threads each claim a distinct slot instead of all
/// sleeping and waking together (thundering herd).
pub struct RateLimiter {
    min_delay_ms: AtomicU64,
    next_allowed_ms: AtomicU64,
    backoff_multiplier: f64,
    max_delay_ms: u64,
    rate_limit_hits: AtomicU32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            min_delay_ms: AtomicU64::new(0),
            next_allowed_ms: AtomicU64::new(0),
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            rate_limit_hits: AtomicU32::new(0),
        }
    }

    /// Block the calling thread if backpressure is currently in effect.
    pub fn wait_if_needed(&self) {
        let min_delay = self.min_delay_ms.load(Ordering::Acquire);
        if min_delay == 0 {
            return;
        }

        let now = current_timestamp_ms();

        let my_slot = loop {
            let current_next = self.next_allowed_ms.load(Ordering::Acquire);
            let effective_next = current_next.max(now);
            let new_next = effective_next + min_delay;

            match self.next_allowed_ms.compare_exchange_weak(
                current_next,
                new_next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break effective_next,
                Err(_) => continue,
            }
        };

        let wait_time = my_slot.saturating_sub(now);
        if wait_time > 0 {
            std::thread::sleep(Duration::from_millis(wait_time));
        }
    }

    /// Record a successful request - gradually reduce delay.
    pub fn record_success(&self) {
        loop {
            let current = self.min_delay_ms.load(Ordering::Acquire);
            if current == 0 {
                return;
            }
            let new_delay = (current as f64 * 0.75) as u64;
            match self.min_delay_ms.compare_exchange_weak(
                current,
                new_delay,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    /// Handle a rate-limit (429) response.
    pub fn record_rate_limit(&self, retry_after_secs: Option<u64>) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);

        let new_delay = if let Some(secs) = retry_after_secs {
            (secs * 1000).min(self.max_delay_ms)
        } else {
            let current = self.min_delay_ms.load(Ordering::Acquire).max(100);
            ((current as f64 * self.backoff_multiplier) as u64).min(self.max_delay_ms)
        };

        self.min_delay_ms.store(new_delay, Ordering::Release);
    }

    pub fn current_delay_ms(&self) -> u64 {
        self.min_delay_ms.load(Ordering::Acquire)
    }

    pub fn rate_limit_hits(&self) -> u32 {
        self.rate_limit_hits.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.min_delay_ms.store(0, Ordering::Release);
        self.next_allowed_ms.store(0, Ordering::Release);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn current_timestamp_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_breaker_starts_closed() {
        let cb = CircuitBreaker::with_params(3, 60);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn circuit_breaker_opens_on_threshold() {
        let cb = CircuitBreaker::with_params(3, 60);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn circuit_breaker_success_resets() {
        let cb = CircuitBreaker::with_params(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn circuit_breaker_stats() {
        let cb = CircuitBreaker::with_params(5, 60);
        cb.record_failure();
        cb.record_failure();
        let stats = cb.stats();
        assert_eq!(stats.failure_count, 2);
        assert_eq!(stats.threshold, 5);
        assert_eq!(stats.total_failures, 2);
        assert_eq!(stats.state, CircuitState::Closed);
    }

    #[test]
    fn circuit_breaker_reset() {
        let cb = CircuitBreaker::with_params(2, 60);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn rate_limiter_starts_with_no_delay() {
        let rl = RateLimiter::new();
        assert_eq!(rl.current_delay_ms(), 0);
    }

    #[test]
    fn rate_limiter_backoff() {
        let rl = RateLimiter::new();
        rl.record_rate_limit(None);
        assert!(rl.current_delay_ms() >= 100);
        let first_delay = rl.current_delay_ms();
        rl.record_rate_limit(None);
        assert!(rl.current_delay_ms() > first_delay);
    }

    #[test]
    fn rate_limiter_retry_after() {
        let rl = RateLimiter::new();
        rl.record_rate_limit(Some(5));
        assert_eq!(rl.current_delay_ms(), 5000);
    }

    #[test]
    fn rate_limiter_success_reduces_delay() {
        let rl = RateLimiter::new();
        rl.record_rate_limit(Some(10));
        assert_eq!(rl.current_delay_ms(), 10000);
        rl.record_success();
        assert!(rl.current_delay_ms() < 10000);
    }

    #[test]
    fn rate_limiter_max_delay() {
        let rl = RateLimiter::new();
        rl.record_rate_limit(Some(60));
        assert!(rl.current_delay_ms() <= 30000);
    }
}
