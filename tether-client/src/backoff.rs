//! Reconnect delay policy
//!
//! When the connection drops, the policy decides whether to retry and how
//! long to wait first. The computation is a pure function of three
//! inputs: the attempt count, the recent rapid-disconnect history, and
//! the category assigned to the close. Keeping it pure makes the whole
//! retry schedule testable without sockets or timers.
//!
//! # Delay composition
//!
//! 1. `Normal` closes never reconnect; `AuthError` closes get the fixed
//!    elevated auth-retry delay (the one-retry cap is enforced by the
//!    connection manager, which tracks whether the retry was spent)
//! 2. At or past the attempt ceiling, give up
//! 3. Base delay doubles per attempt, capped at the configured maximum
//! 4. Category floors raise the delay for server errors and dirty closes
//! 5. Each consecutive rapid disconnect adds a flat penalty; once the
//!    storm limit is hit a severe floor takes over, growing with each
//!    further rapid disconnect
//! 6. A minimum spacing applies regardless, so two attempts can never
//!    land closer together than twice the base probe interval
//!
//! # Examples
//!
//! ```rust
//! use tether_client::{BackoffConfig, BackoffPolicy};
//! use tether_core::CloseCategory;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new(BackoffConfig::default());
//!
//! // Clean close: stay down
//! assert_eq!(policy.next_delay(0, 0, CloseCategory::Normal), None);
//!
//! // Server mid-recovery: wait at least 15s
//! let delay = policy.next_delay(0, 0, CloseCategory::ServerError).unwrap();
//! assert!(delay >= Duration::from_secs(15));
//! ```

use crate::config::BackoffConfig;
use std::time::Duration;
use tether_core::CloseCategory;

/// Pure reconnect delay policy
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Compute the delay before reconnect attempt `attempt`
    ///
    /// Returns `None` when no reconnect should happen: clean closes, or
    /// the attempt ceiling reached (the caller surfaces that as a
    /// terminal failure).
    pub fn next_delay(
        &self,
        attempt: u32,
        consecutive_rapid_disconnects: u32,
        category: CloseCategory,
    ) -> Option<Duration> {
        match category {
            CloseCategory::Normal => return None,
            CloseCategory::AuthError => return Some(self.config.auth_retry_delay),
            _ => {}
        }

        if attempt >= self.config.max_attempts {
            return None;
        }

        // Exponential base, capped. The shift is clamped so large attempt
        // counts cannot overflow the multiplier.
        let multiplier = 2u32.saturating_pow(attempt.min(16));
        let base = self
            .config
            .base_delay
            .saturating_mul(multiplier)
            .min(self.config.max_delay);

        let floor = match category {
            CloseCategory::ServerError => self.config.server_error_floor,
            CloseCategory::AbnormalClose => self.config.abnormal_close_floor,
            _ => Duration::ZERO,
        };

        let mut delay = base.max(floor)
            + self
                .config
                .rapid_penalty
                .saturating_mul(consecutive_rapid_disconnects);

        if consecutive_rapid_disconnects >= self.config.rapid_storm_limit {
            let excess = consecutive_rapid_disconnects - self.config.rapid_storm_limit;
            let storm = self.config.storm_floor + self.config.rapid_penalty.saturating_mul(excess);
            delay = delay.max(storm);
        }

        delay = delay.max(self.config.min_spacing);

        if self.config.jitter {
            delay += jitter_for(delay);
        }

        Some(delay)
    }
}

/// Random 0..=25% of the delay, added on top
fn jitter_for(delay: Duration) -> Duration {
    use rand::Rng;
    let quarter = (delay.as_millis() as u64) / 4;
    if quarter == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=quarter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(BackoffConfig::default())
    }

    #[test]
    fn test_normal_close_never_reconnects() {
        let p = policy();
        for attempt in 0..5 {
            assert_eq!(p.next_delay(attempt, 0, CloseCategory::Normal), None);
        }
    }

    #[test]
    fn test_exponential_growth_with_cap() {
        let p = policy();
        // Attempts 0..2 sit below the 4s minimum spacing
        assert_eq!(
            p.next_delay(0, 0, CloseCategory::Unknown),
            Some(Duration::from_secs(4))
        );
        assert_eq!(
            p.next_delay(2, 0, CloseCategory::Unknown),
            Some(Duration::from_secs(4))
        );
        assert_eq!(
            p.next_delay(3, 0, CloseCategory::Unknown),
            Some(Duration::from_secs(8))
        );
        assert_eq!(
            p.next_delay(4, 0, CloseCategory::Unknown),
            Some(Duration::from_secs(16))
        );
        // Capped at 30s from attempt 5 on
        assert_eq!(
            p.next_delay(5, 0, CloseCategory::Unknown),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            p.next_delay(9, 0, CloseCategory::Unknown),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_server_error_floor() {
        let p = policy();
        let delay = p.next_delay(0, 0, CloseCategory::ServerError).unwrap();
        assert!(delay >= Duration::from_secs(15));
    }

    #[test]
    fn test_abnormal_close_floor() {
        let p = policy();
        let delay = p.next_delay(0, 0, CloseCategory::AbnormalClose).unwrap();
        assert!(delay >= Duration::from_secs(5));
        // Floor only lifts, never lowers: a late attempt keeps its 30s base
        let late = p.next_delay(7, 0, CloseCategory::AbnormalClose).unwrap();
        assert_eq!(late, Duration::from_secs(30));
    }

    #[test]
    fn test_rapid_disconnect_penalty_grows() {
        let p = policy();
        let first = p.next_delay(0, 1, CloseCategory::Unknown).unwrap();
        let second = p.next_delay(1, 2, CloseCategory::Unknown).unwrap();
        assert!(second >= first + Duration::from_secs(5));
    }

    #[test]
    fn test_storm_floor_after_three_rapid_disconnects() {
        let p = policy();
        let delay = p.next_delay(0, 3, CloseCategory::Unknown).unwrap();
        assert!(delay >= Duration::from_secs(30));

        // Each further rapid disconnect raises the severe floor
        let worse = p.next_delay(0, 5, CloseCategory::Unknown).unwrap();
        assert!(worse >= Duration::from_secs(40));
    }

    #[test]
    fn test_minimum_spacing() {
        let mut config = BackoffConfig::default();
        config.base_delay = Duration::from_millis(10);
        let p = BackoffPolicy::new(config);
        let delay = p.next_delay(0, 0, CloseCategory::Unknown).unwrap();
        assert!(delay >= Duration::from_secs(4));
    }

    #[test]
    fn test_attempt_ceiling() {
        let p = policy();
        assert!(p.next_delay(9, 0, CloseCategory::Unknown).is_some());
        assert_eq!(p.next_delay(10, 0, CloseCategory::Unknown), None);
        assert_eq!(p.next_delay(11, 0, CloseCategory::Unknown), None);
    }

    #[test]
    fn test_auth_error_uses_fixed_elevated_delay() {
        let p = policy();
        // The fixed delay ignores attempt count and rapid history; the
        // single-retry cap lives in the connection manager
        assert_eq!(
            p.next_delay(0, 0, CloseCategory::AuthError),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            p.next_delay(7, 4, CloseCategory::AuthError),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_policy_violation_behaves_like_unknown() {
        let p = policy();
        assert_eq!(
            p.next_delay(3, 0, CloseCategory::PolicyViolation),
            p.next_delay(3, 0, CloseCategory::Unknown)
        );
    }

    #[test]
    fn test_jitter_only_adds() {
        let mut config = BackoffConfig::default();
        config.jitter = true;
        let p = BackoffPolicy::new(config);
        for _ in 0..20 {
            let delay = p.next_delay(3, 0, CloseCategory::Unknown).unwrap();
            assert!(delay >= Duration::from_secs(8));
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_no_overflow_on_huge_attempt() {
        let mut config = BackoffConfig::default();
        config.max_attempts = u32::MAX;
        let p = BackoffPolicy::new(config);
        let delay = p.next_delay(1000, 0, CloseCategory::Unknown).unwrap();
        assert_eq!(delay, Duration::from_secs(30));
    }
}
