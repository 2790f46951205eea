//! # Backoff between failure-driven listener restarts.
//!
//! The delay before session `n + 1` after `n` consecutive failures is
//! `first × factor^(n-1)`, clamped to `max`, then jittered. The base is derived
//! from the failure count only, so jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use replyvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(50),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::ZERO);
//! assert_eq!(backoff.next(1), Duration::from_millis(50));
//! assert_eq!(backoff.next(3), Duration::from_millis(200));
//! assert_eq!(backoff.next(20), Duration::from_secs(2));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth per additional consecutive failure.
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 10s`, equal jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// A policy that restarts immediately after every failure.
    pub const fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay to wait after `failures` consecutive failed sessions.
    ///
    /// `0` failures means no wait.
    pub fn next(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exp = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn no_failures_means_no_wait() {
        assert_eq!(BackoffPolicy::default().next(0), Duration::ZERO);
    }

    #[test]
    fn grows_exponentially_until_max() {
        let policy = plain(100, 1_000, 2.0);
        assert_eq!(policy.next(1), Duration::from_millis(100));
        assert_eq!(policy.next(2), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(400));
        assert_eq!(policy.next(4), Duration::from_millis(800));
        assert_eq!(policy.next(5), Duration::from_millis(1_000));
    }

    #[test]
    fn first_above_max_is_clamped() {
        assert_eq!(plain(5_000, 1_000, 1.0).next(1), Duration::from_millis(1_000));
    }

    #[test]
    fn huge_failure_counts_clamp_to_max() {
        let policy = plain(100, 10_000, 2.0);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn immediate_never_waits() {
        let policy = BackoffPolicy::immediate();
        for failures in 0..10 {
            assert_eq!(policy.next(failures), Duration::ZERO);
        }
    }

    #[test]
    fn equal_jitter_stays_in_upper_half() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..plain(1_000, 30_000, 1.0)
        };
        for _ in 0..50 {
            let delay = policy.next(1);
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay <= Duration::from_millis(1_000), "{delay:?}");
        }
    }
}
