//! Randomised election timeout, heartbeat tick, and webhook retry backoff
//! schedule. Kept as an injected capability rather than ambient
//! `std::time`/`rand::thread_rng()` calls so consensus timing is mockable
//! in tests.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default election timeout base `T`.
pub const DEFAULT_ELECTION_TIMEOUT_BASE: Duration = Duration::from_millis(150);

/// Webhook retry backoff cap.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch. Used to stamp `Delivery::scheduled_at_millis`.
    fn now_millis(&self) -> u64;

    /// Uniformly random in `[T, 2T]`.
    fn election_timeout(&self) -> Duration;

    /// `floor(T / 3)`.
    fn heartbeat_interval(&self) -> Duration;

    /// `min(300s, 2^attempt * 1s)` with +/-10% jitter.
    fn retry_delay(&self, attempt: u32) -> Duration;
}

/// Real-time clock backed by `SystemTime` and a thread-local RNG, used in
/// production.
pub struct SystemClock {
    election_timeout_base: Duration,
    rng: Mutex<StdRng>,
}

impl SystemClock {
    pub fn new(election_timeout_base: Duration) -> Self {
        SystemClock {
            election_timeout_base,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(DEFAULT_ELECTION_TIMEOUT_BASE)
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis() as u64
    }

    fn election_timeout(&self) -> Duration {
        let t = self.election_timeout_base;
        let mut rng = self.rng.lock();
        let extra_millis = rng.gen_range(0..=t.as_millis() as u64);
        t + Duration::from_millis(extra_millis)
    }

    fn heartbeat_interval(&self) -> Duration {
        self.election_timeout_base / 3
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = exponential_backoff(attempt);
        let mut rng = self.rng.lock();
        jitter(base, &mut rng)
    }
}

/// Deterministic clock for tests: fixed election timeout, a seeded RNG for
/// jitter, and a manually-advanced virtual `now`.
pub struct SimClock {
    election_timeout_base: Duration,
    now_millis: Mutex<u64>,
    rng: Mutex<StdRng>,
}

impl SimClock {
    pub fn new(election_timeout_base: Duration, seed: u64) -> Self {
        SimClock {
            election_timeout_base,
            now_millis: Mutex::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now_millis.lock() += by.as_millis() as u64;
    }
}

impl Clock for SimClock {
    fn now_millis(&self) -> u64 {
        *self.now_millis.lock()
    }

    fn election_timeout(&self) -> Duration {
        let t = self.election_timeout_base;
        let mut rng = self.rng.lock();
        let extra_millis = rng.gen_range(0..=t.as_millis() as u64);
        t + Duration::from_millis(extra_millis)
    }

    fn heartbeat_interval(&self) -> Duration {
        self.election_timeout_base / 3
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = exponential_backoff(attempt);
        let mut rng = self.rng.lock();
        jitter(base, &mut rng)
    }
}

fn exponential_backoff(attempt: u32) -> Duration {
    let millis = 1_000u64.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    Duration::from_millis(millis).min(MAX_RETRY_DELAY)
}

fn jitter(base: Duration, rng: &mut StdRng) -> Duration {
    let factor = rng.gen_range(0.9..=1.1);
    Duration::from_secs_f64((base.as_secs_f64() * factor).min(MAX_RETRY_DELAY.as_secs_f64() * 1.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_timeout_is_in_range() {
        let clock = SimClock::new(Duration::from_millis(150), 42);
        for _ in 0..100 {
            let t = clock.election_timeout();
            assert!(t >= Duration::from_millis(150));
            assert!(t <= Duration::from_millis(300));
        }
    }

    #[test]
    fn heartbeat_is_third_of_election_timeout_base() {
        let clock = SimClock::new(Duration::from_millis(150), 1);
        assert_eq!(clock.heartbeat_interval(), Duration::from_millis(50));
    }

    #[test]
    fn backoff_caps_at_300s_from_attempt_nine() {
        let clock = SimClock::new(Duration::from_millis(150), 7);
        for attempt in 9..20 {
            let d = clock.retry_delay(attempt);
            // capped base is 300s; jitter is +/-10%, so allow up to 330s.
            assert!(d <= Duration::from_secs(330));
            assert!(d >= Duration::from_secs(270));
        }
    }

    #[test]
    fn backoff_grows_exponentially_before_cap() {
        assert_eq!(exponential_backoff(1), Duration::from_secs(2));
        assert_eq!(exponential_backoff(2), Duration::from_secs(4));
        assert_eq!(exponential_backoff(8), Duration::from_secs(256));
        assert_eq!(exponential_backoff(9), Duration::from_secs(300));
    }
}
