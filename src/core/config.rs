//! # Global runtime configuration.
//!
//! Provides [`Config`], the static settings of one [`Replier`](crate::Replier).
//! Validated once by [`ReplierBuilder::build`](crate::ReplierBuilder::build).
//!
//! ## Sentinel values
//! - `grace = 0s` → abort the listener immediately on stop
//! - `default_queue = None` (or `Some("")`) → no process-wide queue group

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::BackoffPolicy;

/// Default bus address.
pub const DEFAULT_SERVER: &str = "nats://127.0.0.1:4222";

/// Global configuration for the replier runtime.
///
/// ## Field semantics
/// - `servers`: bus addresses handed to [`Transport::connect`](crate::Transport::connect)
/// - `default_queue`: process-wide queue group, lowest rank in the resolution chain
/// - `grace`: how long `stop()` waits for the listener before aborting it
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `backoff`: delay before a restart caused by a dispatch failure
#[derive(Clone, Debug)]
pub struct Config {
    /// Bus server addresses; must be non-empty, entries non-blank.
    pub servers: Vec<String>,

    /// Queue group used when nothing closer to a registration names one.
    pub default_queue: Option<String>,

    /// Maximum time to wait for the listener to exit before aborting it.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,

    /// Backoff between restarts driven by dispatch failures.
    ///
    /// Consecutive failures drive the exponent; a resubscription resets it.
    pub backoff: BackoffPolicy,
}

impl Config {
    /// Checks the configuration for values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if let Some(index) = self.servers.iter().position(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptyServer { index });
        }
        Ok(())
    }

    /// Returns the process-wide default queue, treating `""` as none.
    #[inline]
    pub fn default_queue(&self) -> Option<&str> {
        self.default_queue.as_deref().filter(|q| !q.is_empty())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `servers = ["nats://127.0.0.1:4222"]`
    /// - `default_queue = None`
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    /// - `backoff = BackoffPolicy::default()`
    fn default() -> Self {
        Self {
            servers: vec![DEFAULT_SERVER.to_string()],
            default_queue: None,
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.servers, vec![DEFAULT_SERVER.to_string()]);
        assert_eq!(cfg.default_queue(), None);
    }

    #[test]
    fn rejects_missing_and_blank_servers() {
        let mut cfg = Config {
            servers: Vec::new(),
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoServers));

        cfg.servers = vec!["nats://a:4222".into(), "  ".into()];
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyServer { index: 1 }));
    }

    #[test]
    fn blank_default_queue_is_none() {
        let cfg = Config {
            default_queue: Some(String::new()),
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.default_queue(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
