//! # Lifecycle events emitted by the replier and its listener.
//!
//! The [`EventKind`] enum classifies events across three categories:
//! - **Transition events**: controller state changes (start ignored, stopped, cleared)
//! - **Session events**: one listener session (starting, connected, subscribed, ready)
//! - **Recovery events**: why a session ended and what happens next
//!
//! The [`Event`] struct carries optional metadata such as subject, queue group,
//! reason, attempt and restart delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use replyvisor::{Event, EventKind, RestartCause};
//!
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_attempt(2)
//!     .with_cause(RestartCause::Failure)
//!     .with_delay(Duration::from_millis(250))
//!     .with_reason("handler for 'math.div' failed: division by zero");
//!
//! assert_eq!(ev.kind, EventKind::RestartScheduled);
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
///
/// Serializes as a snake_case string (`"restart_scheduled"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // === Controller transitions ===
    /// `start()` was called while the listener was already running.
    StartIgnored,

    /// The listener was stopped (`stop`, `restart`, `reset`).
    ListenerStopped,

    /// The listener did not exit within the grace period and was aborted.
    ///
    /// Sets:
    /// - `delay_ms`: configured grace
    GraceExceeded,

    /// All registrations were removed by `reset()`.
    RegistryCleared,

    /// OS shutdown signal observed by `Replier::run`.
    ShutdownRequested,

    // === Session lifecycle ===
    /// A listener session is starting.
    ///
    /// Sets:
    /// - `attempt`: session number within this listener run (1-based)
    ListenerStarting,

    /// The session connected to the bus.
    ///
    /// Sets:
    /// - `attempt`: session number
    Connected,

    /// One subscription was opened.
    ///
    /// Sets:
    /// - `subject`: subscribed subject pattern
    /// - `queue`: queue group, if any
    Subscribed,

    /// Every registration of the snapshot is subscribed; requests are being served.
    ///
    /// Sets:
    /// - `attempt`: session number
    /// - `subscriptions`: number of subscriptions opened
    ListenerReady,

    // === Recovery ===
    /// Connecting or subscribing failed, or the bus ended a subscription.
    /// The listener exits and the state becomes `Stopped`.
    ///
    /// Sets:
    /// - `reason`: transport error
    TransportFailed,

    /// The registry changed while the session was running.
    ResubscribeRequested,

    /// Serving a request failed (handler error or panic, encoding, publishing).
    ///
    /// Sets:
    /// - `subject`: subject of the failed request, when known
    /// - `reason`: error message
    DispatchFailed,

    /// The session ended and a new one will start.
    ///
    /// Sets:
    /// - `attempt`: number of the session that ended
    /// - `cause`: new subscriptions or failure
    /// - `delay_ms`: wait before the next session
    /// - `reason`: failure message (failure-driven restarts only)
    RestartScheduled,
}

/// Reason a listener session was restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartCause {
    /// New registrations must be subscribed.
    NewSubscriptions,
    /// The previous session failed while dispatching.
    Failure,
}

/// Lifecycle event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Subject the event refers to.
    pub subject: Option<Arc<str>>,
    /// Queue group the event refers to.
    pub queue: Option<Arc<str>>,
    /// Human-readable reason (errors, failure details).
    pub reason: Option<Arc<str>>,
    /// Session number (starting from 1).
    pub attempt: Option<u32>,
    /// Number of subscriptions opened by a session.
    pub subscriptions: Option<u32>,
    /// Delay in milliseconds (restart delay, grace).
    pub delay_ms: Option<u32>,
    /// Why a restart was scheduled.
    pub cause: Option<RestartCause>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subject: None,
            queue: None,
            reason: None,
            attempt: None,
            subscriptions: None,
            delay_ms: None,
            cause: None,
        }
    }

    /// Attaches a subject.
    #[inline]
    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches a queue group, if any.
    #[inline]
    pub fn with_queue(mut self, queue: Option<&str>) -> Self {
        self.queue = queue.map(Arc::from);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a session number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches the number of opened subscriptions.
    #[inline]
    pub fn with_subscriptions(mut self, n: usize) -> Self {
        self.subscriptions = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a restart cause.
    #[inline]
    pub fn with_cause(mut self, cause: RestartCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// True for events after which the listener is no longer serving.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TransportFailed | EventKind::ListenerStopped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::ListenerStarting);
        let b = Event::new(EventKind::Connected);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates_instead_of_wrapping() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX / 4));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn kinds_serialize_as_snake_case() {
        let kind = serde_json::to_value(EventKind::RestartScheduled).expect("encode");
        assert_eq!(kind, serde_json::json!("restart_scheduled"));
        let cause: RestartCause = serde_json::from_str("\"new_subscriptions\"").expect("decode");
        assert_eq!(cause, RestartCause::NewSubscriptions);
    }

    #[test]
    fn queue_none_leaves_field_empty() {
        let ev = Event::new(EventKind::Subscribed)
            .with_subject("math.add")
            .with_queue(None);
        assert_eq!(ev.subject.as_deref(), Some("math.add"));
        assert!(ev.queue.is_none());
        assert!(!ev.is_terminal());
    }
}
