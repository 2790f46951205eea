//! # LogWriter: lifecycle events as `tracing` records
//!
//! Maps each [`EventKind`] to a log level:
//!
//! | Level   | Events                                                                 |
//! |---------|------------------------------------------------------------------------|
//! | `debug` | `StartIgnored`, `Connected`, `Subscribed`                              |
//! | `info`  | `ListenerStarting`, `ListenerReady`, `ResubscribeRequested`, `RestartScheduled` (new subscriptions), `ListenerStopped`, `RegistryCleared`, `ShutdownRequested` |
//! | `warn`  | `GraceExceeded`, `RestartScheduled` (after failure)                    |
//! | `error` | `TransportFailed`, `DispatchFailed`                                    |
//!
//! Nothing is printed unless the application installs a `tracing` subscriber.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind, RestartCause};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let subject = e.subject.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::StartIgnored => {
                debug!("start requested but listener already running");
            }
            EventKind::Connected => {
                debug!(attempt = ?e.attempt, "connected to bus");
            }
            EventKind::Subscribed => {
                debug!(subject, queue = ?e.queue.as_deref(), "subscribed");
            }
            EventKind::ListenerStarting => {
                info!(attempt = ?e.attempt, "listener starting");
            }
            EventKind::ListenerReady => {
                info!(attempt = ?e.attempt, subscriptions = ?e.subscriptions, "listener ready");
            }
            EventKind::ResubscribeRequested => {
                info!("new subscriptions registered, restarting listener");
            }
            EventKind::RestartScheduled => match e.cause {
                Some(RestartCause::Failure) => {
                    warn!(attempt = ?e.attempt, delay_ms = ?e.delay_ms, reason, "listener restart scheduled");
                }
                _ => {
                    info!(attempt = ?e.attempt, delay_ms = ?e.delay_ms, "listener restart scheduled");
                }
            },
            EventKind::ListenerStopped => {
                info!("listener stopped");
            }
            EventKind::RegistryCleared => {
                info!("reply registry cleared");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::GraceExceeded => {
                warn!(grace_ms = ?e.delay_ms, "listener did not stop in time, aborted");
            }
            EventKind::TransportFailed => {
                error!(reason, "bus unavailable, listener exiting");
            }
            EventKind::DispatchFailed => {
                error!(subject, reason, "request dispatch failed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
